// Trainings, sessions, participations and certificates

use crate::core::errors::QhseError;
use crate::core::models::round_to;
use crate::training::categories::{self, TrainingCategory, PASSING_SCORE, TRAINING_CATEGORIES};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Training {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub duration_hours: f64,
    pub validity_months: i64,
    pub is_mandatory: bool,
    pub max_participants: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTraining {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub duration_hours: f64,
    pub is_mandatory: Option<bool>,
    pub validity_months: Option<i64>,
    pub max_participants: Option<i64>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TrainingSession {
    pub id: i64,
    pub training_id: i64,
    pub trainer_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub location: String,
    pub max_participants: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSession {
    pub training_id: i64,
    pub trainer_id: Option<i64>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub location: Option<String>,
    pub max_participants: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutcome {
    pub participation_id: i64,
    pub passed: bool,
    pub score: f64,
    pub certificate_number: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Certification {
    pub participation_id: i64,
    pub training_id: i64,
    pub training_title: String,
    pub category: String,
    pub trainer_id: i64,
    pub score: Option<f64>,
    pub certificate_number: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ExpiringCertification {
    pub participation_id: i64,
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub training_title: String,
    pub category: String,
    pub certificate_number: Option<String>,
    pub expiry_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MandatoryStatus {
    pub category: String,
    pub name: String,
    pub completed: bool,
    pub valid: bool,
    pub completion_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub days_until_expiry: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanItem {
    pub category: String,
    pub name: String,
    pub description: String,
    pub priority: &'static str,
    pub validity_months: i64,
}

impl PlanItem {
    fn from_category(category: &TrainingCategory, priority: &'static str) -> Self {
        Self {
            category: category.key.to_string(),
            name: category.name.to_string(),
            description: category.description.to_string(),
            priority,
            validity_months: category.validity_months,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingPlan {
    pub user_id: i64,
    pub sector: String,
    pub mandatory_trainings: Vec<PlanItem>,
    pub optional_recommendations: Vec<PlanItem>,
    pub current_certifications: Vec<Certification>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryRate {
    pub total: i64,
    pub completed: i64,
    pub success_rate: f64,
    pub avg_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingStatistics {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_trainings: i64,
    pub total_sessions: i64,
    pub total_participants: i64,
    pub completed_trainings: i64,
    pub completion_rate: f64,
    pub category_breakdown: BTreeMap<String, i64>,
    pub success_rates: BTreeMap<String, CategoryRate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub report_type: &'static str,
    pub generated_at: DateTime<Utc>,
    pub statistics: TrainingStatistics,
    pub expiring_certifications: Vec<ExpiringCertification>,
    pub recommendations: Vec<String>,
}

/// Certificate number for a participation completed at `completed_at`
pub fn certificate_number(participation_id: i64, completed_at: DateTime<Utc>) -> String {
    format!("CERT-{:06}-{}", participation_id, completed_at.format("%Y%m%d"))
}

/// Validity months are counted as 30-day blocks
pub fn expiry_date(completed_at: DateTime<Utc>, validity_months: i64) -> DateTime<Utc> {
    completed_at + Duration::days(validity_months * 30)
}

pub fn report_recommendations(stats: &TrainingStatistics, expiring: usize) -> Vec<String> {
    let mut recommendations = Vec::new();
    if stats.completion_rate < 80.0 {
        recommendations
            .push("Le taux de complétion des formations est faible. Renforcer le suivi des participants.".to_string());
    }
    if expiring > 10 {
        recommendations.push(format!(
            "{} certifications expirent dans les 30 jours. Planifier les recyclages.",
            expiring
        ));
    }
    for (category, rate) in &stats.success_rates {
        if rate.success_rate < 70.0 {
            recommendations.push(format!(
                "Taux de réussite faible pour {} ({:.1}%). Réviser le contenu de formation.",
                category, rate.success_rate
            ));
        }
    }
    recommendations
}

const TRAINING_COLUMNS: &str =
    "id, title, description, category, duration_hours, validity_months, is_mandatory, max_participants, created_at";

#[derive(Clone)]
pub struct TrainingManager {
    db_pool: SqlitePool,
}

impl TrainingManager {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub fn categories(&self) -> &'static [TrainingCategory] {
        &TRAINING_CATEGORIES
    }

    pub async fn trainings(&self) -> Result<Vec<Training>, QhseError> {
        let rows = sqlx::query_as::<_, Training>(&format!("SELECT {} FROM trainings ORDER BY id", TRAINING_COLUMNS))
            .fetch_all(&self.db_pool)
            .await?;
        Ok(rows)
    }

    pub async fn training(&self, id: i64) -> Result<Option<Training>, QhseError> {
        let row = sqlx::query_as::<_, Training>(&format!("SELECT {} FROM trainings WHERE id = ?", TRAINING_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(row)
    }

    /// Validity and mandatory flag default to the category's
    pub async fn create_training(&self, training: &NewTraining) -> Result<Training, QhseError> {
        if training.title.trim().is_empty() {
            return Err(QhseError::Validation("title is required".to_string()));
        }
        if training.duration_hours <= 0.0 {
            return Err(QhseError::Validation("duration_hours must be positive".to_string()));
        }
        let category = categories::find(&training.category)
            .ok_or_else(|| QhseError::Validation(format!("Unknown training category '{}'", training.category)))?;

        let id = sqlx::query(
            "INSERT INTO trainings (title, description, category, duration_hours, validity_months, is_mandatory,
              max_participants, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&training.title)
        .bind(&training.description)
        .bind(category.key)
        .bind(training.duration_hours)
        .bind(training.validity_months.unwrap_or(category.validity_months))
        .bind(training.is_mandatory.unwrap_or(category.mandatory))
        .bind(training.max_participants.unwrap_or(20).max(1))
        .bind(Utc::now())
        .execute(&self.db_pool)
        .await?
        .last_insert_rowid();

        info!(training_id = id, category = category.key, "Training created");
        self.training(id)
            .await?
            .ok_or_else(|| QhseError::NotFound(format!("Training {}", id)))
    }

    pub async fn schedule_session(&self, session: &NewSession, trainer_id: i64) -> Result<TrainingSession, QhseError> {
        if session.end_date < session.start_date {
            return Err(QhseError::Validation("end_date must not precede start_date".to_string()));
        }
        let training = self
            .training(session.training_id)
            .await?
            .ok_or_else(|| QhseError::NotFound(format!("Training {}", session.training_id)))?;

        let id = sqlx::query(
            "INSERT INTO training_sessions (training_id, trainer_id, start_date, end_date, location, max_participants,
              status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, 'scheduled', ?)",
        )
        .bind(training.id)
        .bind(session.trainer_id.unwrap_or(trainer_id))
        .bind(session.start_date)
        .bind(session.end_date)
        .bind(session.location.as_deref().unwrap_or("À définir"))
        .bind(session.max_participants.unwrap_or(training.max_participants).max(1))
        .bind(Utc::now())
        .execute(&self.db_pool)
        .await?
        .last_insert_rowid();

        info!(session_id = id, training_id = training.id, "Training session scheduled");
        self.session(id)
            .await?
            .ok_or_else(|| QhseError::NotFound(format!("Session {}", id)))
    }

    pub async fn session(&self, id: i64) -> Result<Option<TrainingSession>, QhseError> {
        let row = sqlx::query_as::<_, TrainingSession>(
            "SELECT id, training_id, trainer_id, start_date, end_date, location, max_participants, status, created_at
             FROM training_sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?;
        Ok(row)
    }

    /// Enroll a user; a full session or a second enrollment is a conflict
    ///
    /// The capacity check and the insert are one statement, so concurrent
    /// enrollments cannot overfill a session.
    pub async fn enroll(&self, session_id: i64, user_id: i64) -> Result<i64, QhseError> {
        if self.session(session_id).await?.is_none() {
            return Err(QhseError::NotFound(format!("Session {}", session_id)));
        }

        let result = sqlx::query(
            "INSERT OR IGNORE INTO training_participations (session_id, user_id, status, enrolled_at)
             SELECT s.id, ?, 'enrolled', ? FROM training_sessions s
             WHERE s.id = ?
               AND (SELECT COUNT(*) FROM training_participations p WHERE p.session_id = s.id) < s.max_participants",
        )
        .bind(user_id)
        .bind(Utc::now())
        .bind(session_id)
        .execute(&self.db_pool)
        .await?;

        if result.rows_affected() == 0 {
            let already: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM training_participations WHERE session_id = ? AND user_id = ?",
            )
            .bind(session_id)
            .bind(user_id)
            .fetch_one(&self.db_pool)
            .await?;
            return Err(QhseError::Conflict(if already > 0 {
                format!("User {} is already enrolled in session {}", user_id, session_id)
            } else {
                format!("Session {} is full", session_id)
            }));
        }

        info!(session_id, user_id, "Participant enrolled");
        Ok(result.last_insert_rowid())
    }

    /// Score a participation; passing issues a certificate with an expiry
    pub async fn complete_training(&self, participation_id: i64, score: f64) -> Result<CompletionOutcome, QhseError> {
        if !(0.0..=100.0).contains(&score) {
            return Err(QhseError::Validation("score must be between 0 and 100".to_string()));
        }
        let row: Option<(String, i64)> = sqlx::query_as(
            "SELECT p.status, t.validity_months FROM training_participations p
             JOIN training_sessions s ON s.id = p.session_id
             JOIN trainings t ON t.id = s.training_id
             WHERE p.id = ?",
        )
        .bind(participation_id)
        .fetch_optional(&self.db_pool)
        .await?;
        let (status, validity_months) =
            row.ok_or_else(|| QhseError::NotFound(format!("Participation {}", participation_id)))?;
        if status == "completed" {
            return Err(QhseError::Conflict(format!("Participation {} is already completed", participation_id)));
        }

        let completed_at = Utc::now();
        let passed = score >= PASSING_SCORE;
        let (certificate, expiry) = if passed {
            (
                Some(certificate_number(participation_id, completed_at)),
                Some(expiry_date(completed_at, validity_months)),
            )
        } else {
            (None, None)
        };

        sqlx::query(
            "UPDATE training_participations SET status = ?, completed_at = ?, score = ?, certificate_number = ?,
              expiry_date = ?
             WHERE id = ?",
        )
        .bind(if passed { "completed" } else { "failed" })
        .bind(completed_at)
        .bind(score)
        .bind(&certificate)
        .bind(expiry)
        .bind(participation_id)
        .execute(&self.db_pool)
        .await?;

        info!(participation_id, score, passed, "Training completed");
        Ok(CompletionOutcome {
            participation_id,
            passed,
            score,
            certificate_number: certificate,
            expiry_date: expiry,
        })
    }

    pub async fn certifications(&self, user_id: i64) -> Result<Vec<Certification>, QhseError> {
        let rows = sqlx::query_as::<_, Certification>(
            "SELECT p.id AS participation_id, t.id AS training_id, t.title AS training_title, t.category,
                    s.trainer_id, p.score, p.certificate_number, p.completed_at, p.expiry_date
             FROM training_participations p
             JOIN training_sessions s ON s.id = p.session_id
             JOIN trainings t ON t.id = s.training_id
             WHERE p.user_id = ? AND p.status = 'completed'
             ORDER BY p.completed_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows)
    }

    /// Valid certifications expiring within `days`, soonest first
    pub async fn expiring(&self, days: i64) -> Result<Vec<ExpiringCertification>, QhseError> {
        let now = Utc::now();
        let rows = sqlx::query_as::<_, ExpiringCertification>(
            "SELECT p.id AS participation_id, p.user_id, u.username, u.email, t.title AS training_title, t.category,
                    p.certificate_number, p.expiry_date
             FROM training_participations p
             JOIN training_sessions s ON s.id = p.session_id
             JOIN trainings t ON t.id = s.training_id
             JOIN users u ON u.id = p.user_id
             WHERE p.status = 'completed' AND p.expiry_date > ? AND p.expiry_date <= ?
             ORDER BY p.expiry_date ASC",
        )
        .bind(now)
        .bind(now + Duration::days(days.max(0)))
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows)
    }

    pub async fn mandatory_status(&self, user_id: i64, sector: &str) -> Result<Vec<MandatoryStatus>, QhseError> {
        let now = Utc::now();
        let mut statuses = Vec::new();
        for category in categories::mandatory_for(sector) {
            let latest: Option<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> = sqlx::query_as(
                "SELECT p.completed_at, p.expiry_date FROM training_participations p
                 JOIN training_sessions s ON s.id = p.session_id
                 JOIN trainings t ON t.id = s.training_id
                 WHERE p.user_id = ? AND t.category = ? AND p.status = 'completed'
                 ORDER BY p.completed_at DESC LIMIT 1",
            )
            .bind(user_id)
            .bind(category.key)
            .fetch_optional(&self.db_pool)
            .await?;

            let status = match latest {
                Some((completion_date, expiry)) => {
                    let valid = expiry.map(|e| e > now).unwrap_or(false);
                    MandatoryStatus {
                        category: category.key.to_string(),
                        name: category.name.to_string(),
                        completed: true,
                        valid,
                        completion_date,
                        expiry_date: expiry,
                        days_until_expiry: expiry.filter(|_| valid).map(|e| (e - now).num_days()).unwrap_or(0),
                    }
                }
                None => MandatoryStatus {
                    category: category.key.to_string(),
                    name: category.name.to_string(),
                    completed: false,
                    valid: false,
                    completion_date: None,
                    expiry_date: None,
                    days_until_expiry: 0,
                },
            };
            statuses.push(status);
        }
        Ok(statuses)
    }

    /// Missing or expired mandatory trainings first, then optional ones the user lacks
    pub async fn training_plan(&self, user_id: i64, sector: &str) -> Result<TrainingPlan, QhseError> {
        let statuses = self.mandatory_status(user_id, sector).await?;
        let current_certifications = self.certifications(user_id).await?;

        let mandatory_trainings = statuses
            .iter()
            .filter(|s| !s.valid)
            .filter_map(|s| categories::find(&s.category))
            .map(|c| PlanItem::from_category(c, "high"))
            .collect();

        let optional_recommendations = TRAINING_CATEGORIES
            .iter()
            .filter(|c| !c.mandatory && c.applies_to(sector))
            .filter(|c| !current_certifications.iter().any(|cert| cert.category == c.key))
            .map(|c| PlanItem::from_category(c, "low"))
            .collect();

        Ok(TrainingPlan {
            user_id,
            sector: sector.to_string(),
            mandatory_trainings,
            optional_recommendations,
            current_certifications,
            generated_at: Utc::now(),
        })
    }

    /// Figures for sessions starting between `start` and `end`
    pub async fn statistics(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<TrainingStatistics, QhseError> {
        if end < start {
            return Err(QhseError::Validation("end must not precede start".to_string()));
        }
        let total_trainings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trainings")
            .fetch_one(&self.db_pool)
            .await?;
        let total_sessions: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM training_sessions WHERE start_date >= ? AND start_date <= ?")
                .bind(start)
                .bind(end)
                .fetch_one(&self.db_pool)
                .await?;

        let rows = sqlx::query_as::<_, (String, i64, i64, Option<f64>)>(
            "SELECT t.category, COUNT(*),
                    COALESCE(SUM(CASE WHEN p.status = 'completed' THEN 1 ELSE 0 END), 0),
                    AVG(p.score)
             FROM training_participations p
             JOIN training_sessions s ON s.id = p.session_id
             JOIN trainings t ON t.id = s.training_id
             WHERE s.start_date >= ? AND s.start_date <= ?
             GROUP BY t.category",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.db_pool)
        .await?;

        let total_participants: i64 = rows.iter().map(|r| r.1).sum();
        let completed_trainings: i64 = rows.iter().map(|r| r.2).sum();
        let category_breakdown = rows.iter().map(|r| (r.0.clone(), r.1)).collect();
        let success_rates = rows
            .into_iter()
            .map(|(category, total, completed, avg)| {
                let rate = CategoryRate {
                    total,
                    completed,
                    success_rate: if total > 0 {
                        round_to(completed as f64 / total as f64 * 100.0, 2)
                    } else {
                        0.0
                    },
                    avg_score: round_to(avg.unwrap_or(0.0), 2),
                };
                (category, rate)
            })
            .collect();

        Ok(TrainingStatistics {
            start,
            end,
            total_trainings,
            total_sessions,
            total_participants,
            completed_trainings,
            completion_rate: if total_participants > 0 {
                round_to(completed_trainings as f64 / total_participants as f64 * 100.0, 2)
            } else {
                0.0
            },
            category_breakdown,
            success_rates,
        })
    }

    pub async fn report(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<TrainingReport, QhseError> {
        let statistics = self.statistics(start, end).await?;
        let expiring_certifications = self.expiring(30).await?;
        let recommendations = report_recommendations(&statistics, expiring_certifications.len());
        Ok(TrainingReport {
            report_type: "training_report",
            generated_at: Utc::now(),
            statistics,
            expiring_certifications,
            recommendations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::user_store::UserStore;
    use crate::core::models::Role;
    use crate::db;
    use chrono::TimeZone;
    use secrecy::Secret;

    async fn setup() -> (TrainingManager, SqlitePool, i64) {
        let pool = db::connect_in_memory().await.unwrap();
        let users = UserStore::new(pool.clone());
        let user = users
            .create_user("marie", "marie@example.com", &Secret::new("motdepasse".to_string()), Role::Employee)
            .await
            .unwrap();
        (TrainingManager::new(pool.clone()), pool, user.id)
    }

    async fn session_for(manager: &TrainingManager, category: &str, capacity: i64) -> TrainingSession {
        let training = manager
            .create_training(&NewTraining {
                title: format!("Formation {}", category),
                description: String::new(),
                category: category.to_string(),
                duration_hours: 7.0,
                is_mandatory: None,
                validity_months: None,
                max_participants: Some(capacity),
            })
            .await
            .unwrap();
        manager
            .schedule_session(
                &NewSession {
                    training_id: training.id,
                    trainer_id: None,
                    start_date: Utc::now(),
                    end_date: Utc::now() + Duration::hours(7),
                    location: None,
                    max_participants: None,
                },
                1,
            )
            .await
            .unwrap()
    }

    #[test]
    fn test_certificate_number_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap();
        assert_eq!(certificate_number(42, at), "CERT-000042-20240309");
        assert_eq!(expiry_date(at, 12) - at, Duration::days(360));
    }

    #[tokio::test]
    async fn test_category_defaults() {
        let (manager, _pool, _) = setup().await;
        let session = session_for(&manager, "epi", 5).await;
        let training = manager.training(session.training_id).await.unwrap().unwrap();
        assert_eq!(training.validity_months, 12);
        assert!(training.is_mandatory);
        assert_eq!(session.max_participants, 5);
    }

    #[tokio::test]
    async fn test_unknown_category_rejected() {
        let (manager, _pool, _) = setup().await;
        let result = manager
            .create_training(&NewTraining {
                title: "X".to_string(),
                description: String::new(),
                category: "juggling".to_string(),
                duration_hours: 1.0,
                is_mandatory: None,
                validity_months: None,
                max_participants: None,
            })
            .await;
        assert!(matches!(result, Err(QhseError::Validation(_))));
    }

    #[tokio::test]
    async fn test_capacity_is_enforced() {
        let (manager, _pool, user_id) = setup().await;
        let session = session_for(&manager, "ergonomics", 1).await;
        manager.enroll(session.id, user_id).await.unwrap();
        assert!(matches!(manager.enroll(session.id, user_id + 1).await, Err(QhseError::Conflict(_))));
        assert!(matches!(manager.enroll(999, user_id).await, Err(QhseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_enrollments_respect_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = crate::config::Config::test_config();
        config.database_url = format!("sqlite://{}?mode=rwc", dir.path().join("training.db").display());
        config.database_max_connections = 5;
        let pool = db::connect(&config).await.unwrap();
        let manager = std::sync::Arc::new(TrainingManager::new(pool.clone()));
        let session_id = session_for(&manager, "ergonomics", 2).await.id;

        let attempts: Vec<_> = (1..=12)
            .map(|user_id| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.enroll(session_id, user_id).await })
            })
            .collect();

        let mut enrolled = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => enrolled += 1,
                Err(e) => assert!(matches!(e, QhseError::Conflict(_) | QhseError::Database(_)), "{:?}", e),
            }
        }
        assert!(enrolled <= 2);

        let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM training_participations WHERE session_id = ?")
            .bind(session_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, enrolled);
        assert!(rows <= 2);
    }

    #[tokio::test]
    async fn test_full_session_and_duplicate_are_distinguished() {
        let (manager, _pool, user_id) = setup().await;
        let session = session_for(&manager, "ergonomics", 1).await;
        manager.enroll(session.id, user_id).await.unwrap();

        match manager.enroll(session.id, user_id).await {
            Err(QhseError::Conflict(message)) => assert!(message.contains("already enrolled")),
            other => panic!("expected conflict, got {:?}", other),
        }
        match manager.enroll(session.id, user_id + 1).await {
            Err(QhseError::Conflict(message)) => assert!(message.ends_with("is full")),
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pass_and_fail() {
        let (manager, _pool, user_id) = setup().await;
        let fire = session_for(&manager, "fire_safety", 10).await;
        let general = session_for(&manager, "safety_general", 10).await;

        let passed_id = manager.enroll(fire.id, user_id).await.unwrap();
        let outcome = manager.complete_training(passed_id, 70.0).await.unwrap();
        assert!(outcome.passed);
        let number = outcome.certificate_number.unwrap();
        assert!(number.starts_with(&format!("CERT-{:06}-", passed_id)));
        assert!(outcome.expiry_date.is_some());
        assert!(matches!(manager.complete_training(passed_id, 90.0).await, Err(QhseError::Conflict(_))));

        let failed_id = manager.enroll(general.id, user_id).await.unwrap();
        let outcome = manager.complete_training(failed_id, 69.5).await.unwrap();
        assert!(!outcome.passed);
        assert!(outcome.certificate_number.is_none());

        let certs = manager.certifications(user_id).await.unwrap();
        assert_eq!(certs.len(), 1);
        assert_eq!(certs[0].category, "fire_safety");

        let plan = manager.training_plan(user_id, "Bureaux").await.unwrap();
        let missing: Vec<&str> = plan.mandatory_trainings.iter().map(|p| p.category.as_str()).collect();
        assert_eq!(missing, vec!["safety_general"]);
        assert!(plan.mandatory_trainings.iter().all(|p| p.priority == "high"));
        assert!(plan.optional_recommendations.iter().any(|p| p.category == "ergonomics"));
        assert!(plan.optional_recommendations.iter().all(|p| p.priority == "low"));

        let stats = manager
            .statistics(Utc::now() - Duration::days(1), Utc::now() + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(stats.total_participants, 2);
        assert_eq!(stats.completed_trainings, 1);
        assert_eq!(stats.completion_rate, 50.0);
    }

    #[tokio::test]
    async fn test_expiring_certifications() {
        let (manager, pool, user_id) = setup().await;
        let session = session_for(&manager, "epi", 10).await;
        let participation = manager.enroll(session.id, user_id).await.unwrap();
        manager.complete_training(participation, 88.0).await.unwrap();
        assert!(manager.expiring(30).await.unwrap().is_empty());

        sqlx::query("UPDATE training_participations SET expiry_date = ? WHERE id = ?")
            .bind(Utc::now() + Duration::days(10))
            .bind(participation)
            .execute(&pool)
            .await
            .unwrap();
        let expiring = manager.expiring(30).await.unwrap();
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].username, "marie");

        let report = manager
            .report(Utc::now() - Duration::days(30), Utc::now() + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(report.expiring_certifications.len(), 1);
        assert!(report.recommendations.is_empty());
    }
}
