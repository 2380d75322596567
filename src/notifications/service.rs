// Notification storage, fan-out and the reminder sweep

use crate::auth::user_store::UserStore;
use crate::compliance::{RegulationRegistry, ReviewDue};
use crate::core::errors::QhseError;
use crate::core::models::Role;
use crate::equipment::{EquipmentRegister, InspectionDue};
use crate::notifications::channels::{NotificationChannel, OutgoingMessage, Recipient, TracingChannel};
use crate::notifications::rules::{NotificationRule, CHANNELS};
use crate::training::TrainingManager;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Roles notified about every incident alert
pub const ALERT_ROLES: [Role; 3] = [Role::Admin, Role::Manager, Role::QhseManager];

/// Days ahead the sweep looks for expiring certifications
pub const EXPIRY_WARNING_DAYS: i64 = 30;
/// Days ahead the sweep looks for regulation reviews
pub const REVIEW_WARNING_DAYS: i64 = 30;
/// Days ahead the sweep looks for equipment inspections
pub const INSPECTION_WARNING_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub priority: String,
    pub status: String,
    #[sqlx(json)]
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChannelConfig {
    pub channel: String,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelUpdate {
    pub channel: String,
    pub enabled: bool,
}

/// Notifications sent by one sweep, per rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub training_expiry: usize,
    pub regulatory_deadline: usize,
    pub equipment_inspection: usize,
}

impl SweepSummary {
    pub fn total(&self) -> usize {
        self.training_expiry + self.regulatory_deadline + self.equipment_inspection
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub notification_type: &'static str,
    pub recipients: usize,
    pub notification_ids: Vec<i64>,
    pub channels: Vec<String>,
    pub failed_channels: Vec<String>,
}

/// Incident fields used by the alert templates
#[derive(Debug, Clone, Serialize)]
pub struct IncidentAlert {
    pub incident_id: i64,
    pub title: String,
    pub severity_level: String,
    pub risk_score: f64,
    pub location: Option<String>,
    pub incident_type_name: Option<String>,
    pub ai_recommendations: Option<String>,
    pub reported_by: Option<i64>,
}

fn critical_incident_message(alert: &IncidentAlert, at: DateTime<Utc>) -> (String, String) {
    let severity = alert.severity_level.to_uppercase();
    let title = format!("ALERTE QHSE CRITIQUE - {}", severity);
    let body = format!(
        "INCIDENT CRITIQUE SIGNALÉ\n\
         NIVEAU: {}\n\
         LOCALISATION: {}\n\
         TYPE: {}\n\
         HEURE: {}\n\n\
         ACTIONS IMMÉDIATES REQUISES:\n\
         1. Sécuriser la zone\n\
         2. Évacuer si nécessaire\n\
         3. Alerter les secours\n\
         4. Prévenir la direction",
        severity,
        alert.location.as_deref().unwrap_or("Non spécifié"),
        alert.incident_type_name.as_deref().unwrap_or("Inconnu"),
        at.format("%H:%M"),
    );
    (title, body)
}

fn high_risk_message(alert: &IncidentAlert) -> (String, String) {
    let title = format!("RISQUE ÉLEVÉ DÉTECTÉ - Score: {:.2}", alert.risk_score);
    let body = format!(
        "RISQUE ÉLEVÉ IDENTIFIÉ\n\
         Score de risque: {:.2}\n\
         Recommandations:\n{}\n\n\
         Actions recommandées:\n\
         - Formation immédiate de l'équipe\n\
         - Vérification des EPI\n\
         - Révision des procédures\n\
         - Surveillance renforcée",
        alert.risk_score,
        alert.ai_recommendations.as_deref().unwrap_or(""),
    );
    (title, body)
}

fn regulatory_deadline_message(review: &ReviewDue) -> (String, String) {
    let title = format!("RAPPEL RÉGLEMENTAIRE - {}", review.name);
    let body = format!(
        "DÉLAI RÉGLEMENTAIRE APPROCHANT\n\
         Réglementation: {} ({})\n\
         Échéance: {}\n\
         Jours restants: {}\n\n\
         Actions requises:\n\
         - Préparer la documentation\n\
         - Planifier l'audit si nécessaire\n\
         - Mettre à jour les procédures\n\
         - Former les équipes",
        review.name,
        review.code,
        review.due_date.format("%Y-%m-%d"),
        review.days_left,
    );
    (title, body)
}

fn equipment_inspection_message(due: &InspectionDue) -> (String, String) {
    let title = format!("INSPECTION ÉQUIPEMENT - {}", due.name);
    let body = format!(
        "INSPECTION D'ÉQUIPEMENT REQUISE\n\
         Équipement: {}\n\
         Catégorie: {}\n\
         Localisation: {}\n\
         Échéance: {}{}\n\n\
         Actions requises:\n\
         - Planifier l'inspection\n\
         - Préparer la documentation\n\
         - Mettre à jour les registres",
        due.name,
        due.category,
        due.location,
        due.next_inspection.format("%Y-%m-%d"),
        if due.overdue { " (EN RETARD)" } else { "" },
    );
    (title, body)
}

#[derive(Clone)]
pub struct NotificationService {
    db_pool: SqlitePool,
    users: UserStore,
    training: TrainingManager,
    regulations: RegulationRegistry,
    equipment: EquipmentRegister,
    channels: HashMap<String, Arc<dyn NotificationChannel>>,
}

impl NotificationService {
    pub fn new(db_pool: SqlitePool, channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self {
            users: UserStore::new(db_pool.clone()),
            training: TrainingManager::new(db_pool.clone()),
            regulations: RegulationRegistry::new(db_pool.clone()),
            equipment: EquipmentRegister::new(db_pool.clone()),
            channels: channels.into_iter().map(|c| (c.name().to_string(), c)).collect(),
            db_pool,
        }
    }

    /// Every known channel backed by [`TracingChannel`]
    pub fn with_tracing_channels(db_pool: SqlitePool) -> Self {
        let channels = CHANNELS
            .iter()
            .map(|name| Arc::new(TracingChannel::new(*name)) as Arc<dyn NotificationChannel>)
            .collect();
        Self::new(db_pool, channels)
    }

    /// Alert-role users plus `extra` when given, without duplicates
    async fn recipients(&self, extra: Option<i64>) -> Result<Vec<Recipient>, QhseError> {
        let mut users = self.users.users_with_roles(&ALERT_ROLES).await?;
        if let Some(user_id) = extra {
            if !users.iter().any(|u| u.id == user_id) {
                if let Some(user) = self.users.find_by_id(user_id).await? {
                    users.push(user);
                }
            }
        }
        Ok(users
            .into_iter()
            .map(|u| Recipient {
                user_id: u.id,
                username: u.username,
                email: u.email,
            })
            .collect())
    }

    /// Channels switched on; channels without a config row count as enabled
    async fn enabled_channels(&self, wanted: &[&str]) -> Result<Vec<String>, QhseError> {
        let disabled: Vec<String> = sqlx::query_scalar("SELECT channel FROM notification_channels WHERE enabled = 0")
            .fetch_all(&self.db_pool)
            .await?;
        Ok(wanted
            .iter()
            .filter(|c| !disabled.iter().any(|d| d.as_str() == **c))
            .map(|c| c.to_string())
            .collect())
    }

    /// Store one notification per recipient and hand it to the rule's channels
    pub async fn dispatch(
        &self,
        rule: NotificationRule,
        title: &str,
        body: &str,
        data: Value,
        recipients: &[Recipient],
    ) -> Result<DispatchOutcome, QhseError> {
        let now = Utc::now();
        let data_text = data.to_string();
        let mut notification_ids = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let id = sqlx::query(
                "INSERT INTO notifications (user_id, notification_type, title, message, priority, status, data, created_at)
                 VALUES (?, ?, ?, ?, ?, 'unread', ?, ?)",
            )
            .bind(recipient.user_id)
            .bind(rule.as_str())
            .bind(title)
            .bind(body)
            .bind(rule.priority())
            .bind(&data_text)
            .bind(now)
            .execute(&self.db_pool)
            .await?
            .last_insert_rowid();
            notification_ids.push(id);
        }

        let message = OutgoingMessage {
            notification_type: rule.as_str().to_string(),
            title: title.to_string(),
            body: body.to_string(),
            priority: rule.priority().to_string(),
        };
        let channels = self.enabled_channels(rule.channels()).await?;
        let mut failed_channels = Vec::new();
        for channel_name in &channels {
            let status = match self.channels.get(channel_name) {
                Some(channel) => match channel.deliver(recipients, &message).await {
                    Ok(()) => "sent",
                    Err(e) => {
                        warn!(channel = %channel_name, error = %e, "Notification delivery failed");
                        failed_channels.push(channel_name.clone());
                        "failed"
                    }
                },
                None => {
                    debug!(channel = %channel_name, "No transport registered for channel");
                    failed_channels.push(channel_name.clone());
                    "unavailable"
                }
            };
            for id in &notification_ids {
                sqlx::query(
                    "INSERT INTO notification_deliveries (notification_id, channel, status, created_at) VALUES (?, ?, ?, ?)",
                )
                .bind(id)
                .bind(channel_name)
                .bind(status)
                .bind(now)
                .execute(&self.db_pool)
                .await?;
            }
        }

        info!(
            notification_type = rule.as_str(),
            recipients = recipients.len(),
            channels = channels.len(),
            "Notification dispatched"
        );
        Ok(DispatchOutcome {
            notification_type: rule.as_str(),
            recipients: recipients.len(),
            notification_ids,
            channels,
            failed_channels,
        })
    }

    pub async fn critical_incident_alert(&self, alert: &IncidentAlert) -> Result<DispatchOutcome, QhseError> {
        let (title, body) = critical_incident_message(alert, Utc::now());
        let recipients = self.recipients(alert.reported_by).await?;
        self.dispatch(NotificationRule::CriticalIncident, &title, &body, json!(alert), &recipients)
            .await
    }

    pub async fn high_risk_alert(&self, alert: &IncidentAlert) -> Result<DispatchOutcome, QhseError> {
        let (title, body) = high_risk_message(alert);
        let recipients = self.recipients(alert.reported_by).await?;
        self.dispatch(NotificationRule::HighRisk, &title, &body, json!(alert), &recipients)
            .await
    }

    /// Critical severity takes precedence over a high risk score
    pub async fn incident_alert(&self, alert: &IncidentAlert) -> Result<Option<DispatchOutcome>, QhseError> {
        if alert.severity_level == "critical" {
            self.critical_incident_alert(alert).await.map(Some)
        } else if alert.risk_score > 3.0 {
            self.high_risk_alert(alert).await.map(Some)
        } else {
            Ok(None)
        }
    }

    /// Latest 50 notifications of a user
    pub async fn for_user(&self, user_id: i64) -> Result<Vec<Notification>, QhseError> {
        let rows = sqlx::query_as::<_, Notification>(
            "SELECT id, user_id, notification_type, title, message, priority, status, data, created_at, read_at
             FROM notifications WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT 50",
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows)
    }

    /// Returns false when the notification does not belong to the user
    pub async fn mark_read(&self, notification_id: i64, user_id: i64) -> Result<bool, QhseError> {
        let result = sqlx::query(
            "UPDATE notifications SET status = 'read', read_at = COALESCE(read_at, ?) WHERE id = ? AND user_id = ?",
        )
        .bind(Utc::now())
        .bind(notification_id)
        .bind(user_id)
        .execute(&self.db_pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn unread_count(&self, user_id: i64) -> Result<i64, QhseError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = ? AND status = 'unread'")
            .bind(user_id)
            .fetch_one(&self.db_pool)
            .await?;
        Ok(count)
    }

    pub async fn channel_config(&self) -> Result<Vec<ChannelConfig>, QhseError> {
        let rows = sqlx::query_as::<_, ChannelConfig>(
            "SELECT channel, enabled, updated_at FROM notification_channels ORDER BY channel",
        )
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows)
    }

    pub async fn update_channel_config(&self, updates: &[ChannelUpdate]) -> Result<Vec<ChannelConfig>, QhseError> {
        if let Some(unknown) = updates.iter().find(|u| !CHANNELS.contains(&u.channel.as_str())) {
            return Err(QhseError::Validation(format!("Unknown channel '{}'", unknown.channel)));
        }
        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;
        for update in updates {
            sqlx::query(
                "INSERT INTO notification_channels (channel, enabled, updated_at) VALUES (?, ?, ?)
                 ON CONFLICT(channel) DO UPDATE SET enabled = excluded.enabled, updated_at = excluded.updated_at",
            )
            .bind(&update.channel)
            .bind(update.enabled)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        info!(updated = updates.len(), "Notification channels updated");
        self.channel_config().await
    }

    /// Warn holders of certifications expiring soon; each certificate is warned about once
    pub async fn sweep_expiring_certifications(&self) -> Result<usize, QhseError> {
        let expiring = self.training.expiring(EXPIRY_WARNING_DAYS).await?;
        let mut sent = 0;
        for cert in expiring {
            let already: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM notifications
                 WHERE user_id = ? AND notification_type = ? AND json_extract(data, '$.participation_id') = ?",
            )
            .bind(cert.user_id)
            .bind(NotificationRule::TrainingExpiry.as_str())
            .bind(cert.participation_id)
            .fetch_one(&self.db_pool)
            .await?;
            if already > 0 {
                continue;
            }

            let title = "FORMATION QHSE - Expiration proche".to_string();
            let body = format!(
                "FORMATION QHSE À RENOUVELER\n\
                 Employé: {}\n\
                 Formation: {}\n\
                 Expiration: {}\n\n\
                 Actions requises:\n\
                 - Planifier la formation de recyclage\n\
                 - Mettre à jour les compétences",
                cert.username,
                cert.training_title,
                cert.expiry_date.format("%Y-%m-%d"),
            );
            let recipient = Recipient {
                user_id: cert.user_id,
                username: cert.username.clone(),
                email: cert.email.clone(),
            };
            self.dispatch(NotificationRule::TrainingExpiry, &title, &body, json!(cert), &[recipient])
                .await?;
            sent += 1;
        }
        Ok(sent)
    }
    /// True when a `rule` notification already carries `key`
    async fn already_notified(&self, rule: NotificationRule, key: &str) -> Result<bool, QhseError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE notification_type = ? AND json_extract(data, '$.reminder_key') = ?",
        )
        .bind(rule.as_str())
        .bind(key)
        .fetch_one(&self.db_pool)
        .await?;
        Ok(count > 0)
    }

    /// Remind alert-role users of regulation reviews due soon or late
    ///
    /// One reminder per review cycle: recording a review starts a new one.
    pub async fn sweep_regulatory_deadlines(&self) -> Result<usize, QhseError> {
        let due = self.regulations.reviews_due(REVIEW_WARNING_DAYS).await?;
        if due.is_empty() {
            return Ok(0);
        }
        let recipients = self.recipients(None).await?;
        if recipients.is_empty() {
            warn!("Reminders due but no alert recipients configured");
            return Ok(0);
        }
        let mut sent = 0;
        for review in due {
            let key = format!("{}:{}", review.code, review.last_review.timestamp());
            if self.already_notified(NotificationRule::RegulatoryDeadline, &key).await? {
                continue;
            }
            let (title, body) = regulatory_deadline_message(&review);
            let mut data = json!(review);
            data["reminder_key"] = json!(key);
            self.dispatch(NotificationRule::RegulatoryDeadline, &title, &body, data, &recipients)
                .await?;
            sent += 1;
        }
        Ok(sent)
    }

    /// Remind alert-role users of equipment inspections due soon or late
    ///
    /// One reminder per scheduled date: an inspection moves the date and re-arms it.
    pub async fn sweep_equipment_inspections(&self) -> Result<usize, QhseError> {
        let due = self.equipment.due_within(INSPECTION_WARNING_DAYS).await?;
        if due.is_empty() {
            return Ok(0);
        }
        let recipients = self.recipients(None).await?;
        if recipients.is_empty() {
            warn!("Reminders due but no alert recipients configured");
            return Ok(0);
        }
        let mut sent = 0;
        for item in due {
            let key = format!("{}:{}", item.equipment_id, item.next_inspection.timestamp());
            if self.already_notified(NotificationRule::EquipmentInspection, &key).await? {
                continue;
            }
            let (title, body) = equipment_inspection_message(&item);
            let mut data = json!(item);
            data["reminder_key"] = json!(key);
            self.dispatch(NotificationRule::EquipmentInspection, &title, &body, data, &recipients)
                .await?;
            sent += 1;
        }
        Ok(sent)
    }

    /// Every scheduled rule; a failing rule does not stop the others
    pub async fn sweep(&self) -> SweepSummary {
        let mut summary = SweepSummary::default();
        match self.sweep_expiring_certifications().await {
            Ok(count) => summary.training_expiry = count,
            Err(e) => error!(rule = "training_expiry", error = %e, "Notification sweep failed"),
        }
        match self.sweep_regulatory_deadlines().await {
            Ok(count) => summary.regulatory_deadline = count,
            Err(e) => error!(rule = "regulatory_deadline", error = %e, "Notification sweep failed"),
        }
        match self.sweep_equipment_inspections().await {
            Ok(count) => summary.equipment_inspection = count,
            Err(e) => error!(rule = "equipment_inspection", error = %e, "Notification sweep failed"),
        }
        summary
    }
}

/// Run the reminder sweep every `interval` until the task is aborted
pub fn spawn_sweep(service: Arc<NotificationService>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Notification sweep started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let summary = service.sweep().await;
            if summary.total() > 0 {
                info!(
                    training_expiry = summary.training_expiry,
                    regulatory_deadline = summary.regulatory_deadline,
                    equipment_inspection = summary.equipment_inspection,
                    "Scheduled reminders sent"
                );
            }
        }
    })
}
