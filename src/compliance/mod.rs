// Regulatory register and review tracking

use crate::core::errors::QhseError;
use crate::core::models::round_to;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tracing::info;

/// Each regulation is reviewed at least once a year
pub const REVIEW_INTERVAL_DAYS: i64 = 365;

pub const CONFORMING: &str = "conforme";
pub const STATUSES: [&str; 3] = [CONFORMING, "non_conforme", "en_cours"];

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RegulationStatus {
    pub code: String,
    pub name: String,
    pub compliance_rate: f64,
    pub status: String,
    pub last_review: DateTime<Utc>,
}

impl RegulationStatus {
    pub fn review_due(&self) -> DateTime<Utc> {
        self.last_review + Duration::days(REVIEW_INTERVAL_DAYS)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewDue {
    pub code: String,
    pub name: String,
    pub last_review: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    /// Negative once the review is late
    pub days_left: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceStatus {
    pub compliance_rate: f64,
    pub average_score: f64,
    pub total_regulations: i64,
    pub conforming_regulations: i64,
    pub regulations: Vec<RegulationStatus>,
    pub upcoming_reviews: Vec<ReviewDue>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewOutcome {
    pub compliance_rate: f64,
    pub status: String,
}

#[derive(Clone)]
pub struct RegulationRegistry {
    db_pool: SqlitePool,
}

impl RegulationRegistry {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn regulations(&self) -> Result<Vec<RegulationStatus>, QhseError> {
        let rows = sqlx::query_as::<_, RegulationStatus>(
            "SELECT code, name, compliance_rate, status, last_review FROM regulations ORDER BY code",
        )
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows)
    }

    /// Regulations whose yearly review falls within `within_days`, late ones included
    pub async fn reviews_due(&self, within_days: i64) -> Result<Vec<ReviewDue>, QhseError> {
        let now = Utc::now();
        let horizon = now + Duration::days(within_days);
        let mut due: Vec<ReviewDue> = self
            .regulations()
            .await?
            .into_iter()
            .filter(|r| r.review_due() <= horizon)
            .map(|r| {
                let due_date = r.review_due();
                ReviewDue {
                    days_left: (due_date - now).num_days(),
                    due_date,
                    last_review: r.last_review,
                    code: r.code,
                    name: r.name,
                }
            })
            .collect();
        due.sort_by_key(|r| r.due_date);
        Ok(due)
    }

    pub async fn status(&self, review_window_days: i64) -> Result<ComplianceStatus, QhseError> {
        let regulations = self.regulations().await?;
        let total = regulations.len() as i64;
        let conforming = regulations.iter().filter(|r| r.status == CONFORMING).count() as i64;
        let (compliance_rate, average_score) = if total > 0 {
            (
                round_to(conforming as f64 * 100.0 / total as f64, 2),
                round_to(regulations.iter().map(|r| r.compliance_rate).sum::<f64>() / total as f64, 2),
            )
        } else {
            (0.0, 0.0)
        };

        Ok(ComplianceStatus {
            compliance_rate,
            average_score,
            total_regulations: total,
            conforming_regulations: conforming,
            upcoming_reviews: self.reviews_due(review_window_days).await?,
            regulations,
            generated_at: Utc::now(),
        })
    }

    /// Store a review outcome and restart the review cycle
    pub async fn record_review(&self, code: &str, outcome: &ReviewOutcome) -> Result<RegulationStatus, QhseError> {
        if !(0.0..=100.0).contains(&outcome.compliance_rate) {
            return Err(QhseError::Validation("compliance_rate must be between 0 and 100".to_string()));
        }
        if !STATUSES.contains(&outcome.status.as_str()) {
            return Err(QhseError::Validation(format!("Unknown compliance status '{}'", outcome.status)));
        }

        let result = sqlx::query(
            "UPDATE regulations SET compliance_rate = ?, status = ?, last_review = ? WHERE code = ?",
        )
        .bind(outcome.compliance_rate)
        .bind(&outcome.status)
        .bind(Utc::now())
        .bind(code)
        .execute(&self.db_pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(QhseError::NotFound(format!("Regulation {}", code)));
        }
        info!(code, status = %outcome.status, rate = outcome.compliance_rate, "Regulation reviewed");

        self.regulations()
            .await?
            .into_iter()
            .find(|r| r.code == code)
            .ok_or_else(|| QhseError::NotFound(format!("Regulation {}", code)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use secrecy::Secret;

    async fn registry() -> RegulationRegistry {
        let pool = db::connect_in_memory().await.unwrap();
        db::seed::seed_reference_data(&pool, &Secret::new("admin123".to_string()))
            .await
            .unwrap();
        RegulationRegistry::new(pool)
    }

    async fn backdate(registry: &RegulationRegistry, code: &str, days: i64) {
        sqlx::query("UPDATE regulations SET last_review = ? WHERE code = ?")
            .bind(Utc::now() - Duration::days(days))
            .bind(code)
            .execute(&registry.db_pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_status_of_seeded_register() {
        let status = registry().await.status(30).await.unwrap();
        assert_eq!(status.total_regulations, 4);
        assert_eq!(status.conforming_regulations, 3);
        assert_eq!(status.compliance_rate, 75.0);
        assert_eq!(status.average_score, 87.5);
        assert!(status.upcoming_reviews.is_empty());
    }

    #[tokio::test]
    async fn test_reviews_due_include_late_ones() {
        let registry = registry().await;
        backdate(&registry, "REACH", 400).await;
        backdate(&registry, "RGPD", 350).await;

        let due = registry.reviews_due(30).await.unwrap();
        let codes: Vec<&str> = due.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["REACH", "RGPD"]);
        assert!(due[0].days_left < 0);
        assert!(due[1].days_left >= 14);

        let late_only = registry.reviews_due(0).await.unwrap();
        assert_eq!(late_only.len(), 1);
    }

    #[tokio::test]
    async fn test_record_review_restarts_cycle() {
        let registry = registry().await;
        backdate(&registry, "REACH", 400).await;

        let reviewed = registry
            .record_review(
                "REACH",
                &ReviewOutcome {
                    compliance_rate: 85.0,
                    status: CONFORMING.to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(reviewed.status, "conforme");
        assert!(registry.reviews_due(0).await.unwrap().is_empty());

        let bad_status = ReviewOutcome {
            compliance_rate: 50.0,
            status: "peut-être".to_string(),
        };
        assert!(matches!(registry.record_review("REACH", &bad_status).await, Err(QhseError::Validation(_))));
        let unknown = ReviewOutcome {
            compliance_rate: 50.0,
            status: CONFORMING.to_string(),
        };
        assert!(matches!(registry.record_review("ISO_9999", &unknown).await, Err(QhseError::NotFound(_))));
    }
}
