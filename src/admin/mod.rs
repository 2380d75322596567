// Administration: system overview, users, compliance, equipment and logs

use crate::auth::audit_logger::{AuditLogEntry, AuditLogger};
use crate::auth::user_store::{UserStore, UserSummary};
use crate::compliance::{ComplianceStatus, RegulationRegistry, RegulationStatus, ReviewOutcome};
use crate::core::errors::QhseError;
use crate::core::models::Role;
use crate::equipment::{
    CategoryStats, Equipment, EquipmentRegister, InspectionDue, InspectionRecord, NewEquipment, NewInspection,
};
use chrono::{DateTime, Duration, Utc};
use secrecy::Secret;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Days ahead the admin views look for reviews and inspections
pub const UPCOMING_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct UserOverview {
    pub total: i64,
    pub by_role: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct IncidentOverview {
    pub total: i64,
    pub critical: i64,
    pub open: i64,
    pub last_week: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TrainingOverview {
    pub total_sessions: i64,
    pub trained_users: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WorkflowOverview {
    pub total: i64,
    pub completed: i64,
    pub escalated: i64,
    pub overdue: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemOverview {
    pub users: UserOverview,
    pub incidents: IncidentOverview,
    pub training: TrainingOverview,
    pub workflows: WorkflowOverview,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EquipmentOverview {
    pub equipment: Vec<Equipment>,
    pub upcoming_inspections: Vec<InspectionDue>,
    pub category_stats: Vec<CategoryStats>,
}

#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: Secret<String>,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Employee
}

#[derive(Clone)]
pub struct AdminService {
    db_pool: SqlitePool,
    users: UserStore,
    regulations: RegulationRegistry,
    equipment: EquipmentRegister,
    audit_log: Arc<AuditLogger>,
}

impl AdminService {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self {
            users: UserStore::new(db_pool.clone()),
            regulations: RegulationRegistry::new(db_pool.clone()),
            equipment: EquipmentRegister::new(db_pool.clone()),
            audit_log: Arc::new(AuditLogger::new(Some(db_pool.clone()))),
            db_pool,
        }
    }

    /// Users by role, all-time incidents, and the last 30 days of training and workflows
    pub async fn overview(&self) -> Result<SystemOverview, QhseError> {
        let now = Utc::now();
        let month_ago = now - Duration::days(30);

        let by_role: BTreeMap<String, i64> = self.users.count_by_role().await?.into_iter().collect();
        let users = UserOverview {
            total: by_role.values().sum(),
            by_role,
        };

        let incidents = sqlx::query_as::<_, IncidentOverview>(
            "SELECT COUNT(*) AS total,
                    COALESCE(SUM(CASE WHEN severity_level = 'critical' THEN 1 ELSE 0 END), 0) AS critical,
                    COALESCE(SUM(CASE WHEN status = 'open' THEN 1 ELSE 0 END), 0) AS open,
                    COALESCE(SUM(CASE WHEN created_at > ? THEN 1 ELSE 0 END), 0) AS last_week
             FROM incident_reports",
        )
        .bind(now - Duration::days(7))
        .fetch_one(&self.db_pool)
        .await?;

        let training = sqlx::query_as::<_, TrainingOverview>(
            "SELECT COUNT(DISTINCT s.id) AS total_sessions,
                    COUNT(DISTINCT p.user_id) AS trained_users,
                    COALESCE(SUM(CASE WHEN p.status = 'completed' THEN 1 ELSE 0 END), 0) AS completed
             FROM training_sessions s
             LEFT JOIN training_participations p ON p.session_id = s.id
             WHERE s.start_date > ?",
        )
        .bind(month_ago)
        .fetch_one(&self.db_pool)
        .await?;

        let workflows = sqlx::query_as::<_, WorkflowOverview>(
            "SELECT COUNT(*) AS total,
                    COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS completed,
                    COALESCE(SUM(CASE WHEN status = 'escalated' THEN 1 ELSE 0 END), 0) AS escalated,
                    COALESCE(SUM(CASE WHEN status != 'completed' AND EXISTS (
                        SELECT 1 FROM workflow_steps st
                        WHERE st.workflow_id = w.workflow_id AND st.status = 'pending' AND st.due_date < ?
                    ) THEN 1 ELSE 0 END), 0) AS overdue
             FROM workflows w WHERE created_at > ?",
        )
        .bind(now)
        .bind(month_ago)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(SystemOverview {
            users,
            incidents,
            training,
            workflows,
            generated_at: now,
        })
    }

    pub async fn users(&self) -> Result<Vec<UserSummary>, QhseError> {
        self.users.list_users().await
    }

    /// Conflict when the username or email is already taken
    pub async fn create_user(&self, user: &NewUser) -> Result<UserSummary, QhseError> {
        let record = self
            .users
            .create_user(user.username.trim(), user.email.trim(), &user.password, user.role)
            .await?;
        info!(user_id = record.id, role = %user.role, "User created by administrator");
        Ok(record.summary())
    }

    pub async fn update_role(&self, user_id: i64, role: Role) -> Result<UserSummary, QhseError> {
        if !self.users.update_role(user_id, role).await? {
            return Err(QhseError::NotFound(format!("User {}", user_id)));
        }
        info!(user_id, role = %role, "User role updated");
        self.users
            .find_by_id(user_id)
            .await?
            .map(|u| u.summary())
            .ok_or_else(|| QhseError::NotFound(format!("User {}", user_id)))
    }

    pub async fn compliance_status(&self) -> Result<ComplianceStatus, QhseError> {
        self.regulations.status(UPCOMING_WINDOW_DAYS).await
    }

    pub async fn record_regulation_review(
        &self,
        code: &str,
        outcome: &ReviewOutcome,
    ) -> Result<RegulationStatus, QhseError> {
        self.regulations.record_review(code, outcome).await
    }

    /// Persisted security events, newest first
    pub async fn system_logs(&self, limit: i64, event_type: Option<&str>) -> Result<Vec<AuditLogEntry>, QhseError> {
        self.audit_log.recent_events(limit, event_type).await
    }

    pub async fn equipment_overview(&self) -> Result<EquipmentOverview, QhseError> {
        Ok(EquipmentOverview {
            equipment: self.equipment.list().await?,
            upcoming_inspections: self.equipment.due_within(UPCOMING_WINDOW_DAYS).await?,
            category_stats: self.equipment.category_stats().await?,
        })
    }

    pub async fn register_equipment(&self, equipment: &NewEquipment) -> Result<Equipment, QhseError> {
        self.equipment.create(equipment).await
    }

    pub async fn record_inspection(
        &self,
        equipment_id: i64,
        inspector_id: i64,
        inspection: &NewInspection,
    ) -> Result<InspectionRecord, QhseError> {
        self.equipment.record_inspection(equipment_id, inspector_id, inspection).await
    }

    pub async fn inspections(&self, equipment_id: i64) -> Result<Vec<InspectionRecord>, QhseError> {
        self.equipment.inspections(equipment_id).await
    }

    pub async fn inspections_due(&self, days: i64) -> Result<Vec<InspectionDue>, QhseError> {
        self.equipment.due_within(days).await
    }

    pub async fn update_equipment_status(&self, equipment_id: i64, status: &str) -> Result<Equipment, QhseError> {
        self.equipment.update_status(equipment_id, status).await
    }
}
