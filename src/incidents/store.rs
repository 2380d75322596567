// SQLite access for incidents, reference data and corrective actions

use crate::core::errors::QhseError;
use crate::core::models::{round_to, Severity};
use crate::incidents::INCIDENT_STATUSES;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Sector {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub risk_level: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct IncidentType {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub severity_weight: i64,
    pub description: String,
}

/// Incident row joined with its sector and type names
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct IncidentView {
    pub id: i64,
    pub sector_id: i64,
    pub sector_name: String,
    pub incident_type_id: i64,
    pub incident_type_name: String,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub date_incident: Option<String>,
    pub time_incident: Option<String>,
    pub severity_level: String,
    pub probability_score: f64,
    pub risk_score: f64,
    pub status: String,
    pub ai_recommendations: Option<String>,
    pub reported_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct IncidentFilter {
    pub sector: Option<String>,
    pub severity: Option<Severity>,
    pub status: Option<String>,
    pub limit: i64,
}

impl Default for IncidentFilter {
    fn default() -> Self {
        Self {
            sector: None,
            severity: None,
            status: None,
            limit: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIncident {
    pub sector_id: i64,
    pub incident_type_id: i64,
    pub title: String,
    pub description: String,
    pub severity_level: Severity,
    pub probability_score: f64,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub date_incident: Option<NaiveDate>,
    #[serde(default)]
    pub time_incident: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub ai_recommendations: Option<String>,
}

impl NewIncident {
    fn validate(&self) -> Result<(), QhseError> {
        if self.title.trim().is_empty() {
            return Err(QhseError::Validation("title is required".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(QhseError::Validation("description is required".to_string()));
        }
        if !(0.0..=1.0).contains(&self.probability_score) {
            return Err(QhseError::Validation(
                "probability_score must be between 0 and 1".to_string(),
            ));
        }
        if let Some(time) = &self.time_incident {
            NaiveTime::parse_from_str(time, "%H:%M")
                .map_err(|_| QhseError::Validation("time_incident must be HH:MM".to_string()))?;
        }
        if let Some(status) = &self.status {
            validate_status(status)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CorrectiveAction {
    pub id: i64,
    pub incident_id: i64,
    pub action_type: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCorrectiveAction {
    pub action_type: String,
    pub description: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

fn default_priority() -> String {
    "medium".to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub total_incidents: i64,
    pub severity_breakdown: BTreeMap<String, i64>,
    pub recent_incidents_7d: i64,
    pub resolution_rate: f64,
    pub recent_incidents: Vec<IncidentView>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NamedCount {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncidentStatistics {
    pub by_sector: Vec<NamedCount>,
    pub by_type: Vec<NamedCount>,
    pub monthly_trend: Vec<TrendPoint>,
}

const INCIDENT_VIEW_SELECT: &str = "SELECT i.id, i.sector_id, s.name AS sector_name, i.incident_type_id,
        t.name AS incident_type_name, i.title, i.description, i.location, i.date_incident,
        i.time_incident, i.severity_level, i.probability_score, i.risk_score, i.status,
        i.ai_recommendations, i.reported_by, i.created_at, i.updated_at
     FROM incident_reports i
     JOIN sectors s ON s.id = i.sector_id
     JOIN incident_types t ON t.id = i.incident_type_id";

pub fn validate_status(status: &str) -> Result<(), QhseError> {
    if INCIDENT_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(QhseError::Validation(format!(
            "status must be one of {}",
            INCIDENT_STATUSES.join(", ")
        )))
    }
}

/// Bucket timestamps into `windows` consecutive 30-day periods ending at `now`, oldest first
pub fn thirty_day_trend(timestamps: &[DateTime<Utc>], now: DateTime<Utc>, windows: i64) -> Vec<TrendPoint> {
    (0..windows)
        .rev()
        .map(|i| {
            let end = now - Duration::days(30 * i);
            let start = end - Duration::days(30);
            let count = timestamps.iter().filter(|ts| **ts > start && **ts <= end).count() as i64;
            TrendPoint {
                period_start: start.date_naive(),
                period_end: end.date_naive(),
                count,
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct IncidentStore {
    db_pool: SqlitePool,
}

impl IncidentStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn sectors(&self) -> Result<Vec<Sector>, QhseError> {
        let rows = sqlx::query_as::<_, Sector>("SELECT id, name, description, risk_level FROM sectors ORDER BY name")
            .fetch_all(&self.db_pool)
            .await?;
        Ok(rows)
    }

    pub async fn incident_types(&self) -> Result<Vec<IncidentType>, QhseError> {
        let rows = sqlx::query_as::<_, IncidentType>(
            "SELECT id, name, category, severity_weight, description FROM incident_types ORDER BY name",
        )
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows)
    }

    pub async fn list(&self, filter: &IncidentFilter) -> Result<Vec<IncidentView>, QhseError> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(INCIDENT_VIEW_SELECT);
        query.push(" WHERE 1 = 1");
        if let Some(sector) = &filter.sector {
            query.push(" AND s.name = ").push_bind(sector.clone());
        }
        if let Some(severity) = filter.severity {
            query.push(" AND i.severity_level = ").push_bind(severity.as_str());
        }
        if let Some(status) = &filter.status {
            query.push(" AND i.status = ").push_bind(status.clone());
        }
        query
            .push(" ORDER BY i.created_at DESC LIMIT ")
            .push_bind(filter.limit.max(1));

        let rows = query
            .build_query_as::<IncidentView>()
            .fetch_all(&self.db_pool)
            .await?;
        debug!(count = rows.len(), "Incidents listed");
        Ok(rows)
    }

    pub async fn get(&self, id: i64) -> Result<Option<IncidentView>, QhseError> {
        let row = sqlx::query_as::<_, IncidentView>(&format!("{} WHERE i.id = ?", INCIDENT_VIEW_SELECT))
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(row)
    }

    /// Insert an incident, returning its id and computed risk score
    ///
    /// The risk score is the probability scaled by the incident type's severity weight.
    pub async fn create(&self, incident: &NewIncident, reported_by: Option<i64>) -> Result<(i64, f64), QhseError> {
        incident.validate()?;

        let sector_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM sectors WHERE id = ?")
            .bind(incident.sector_id)
            .fetch_optional(&self.db_pool)
            .await?;
        if sector_exists.is_none() {
            return Err(QhseError::Validation(format!("Unknown sector {}", incident.sector_id)));
        }

        let weight: i64 = sqlx::query_scalar("SELECT severity_weight FROM incident_types WHERE id = ?")
            .bind(incident.incident_type_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| QhseError::Validation(format!("Unknown incident type {}", incident.incident_type_id)))?;

        let risk_score = round_to(incident.probability_score * weight as f64, 2);
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO incident_reports
             (sector_id, incident_type_id, title, description, location, date_incident, time_incident,
              severity_level, probability_score, risk_score, status, ai_recommendations, reported_by,
              created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(incident.sector_id)
        .bind(incident.incident_type_id)
        .bind(incident.title.trim())
        .bind(&incident.description)
        .bind(&incident.location)
        .bind(incident.date_incident)
        .bind(&incident.time_incident)
        .bind(incident.severity_level.as_str())
        .bind(incident.probability_score)
        .bind(risk_score)
        .bind(incident.status.as_deref().unwrap_or("open"))
        .bind(&incident.ai_recommendations)
        .bind(reported_by)
        .bind(now)
        .bind(now)
        .execute(&self.db_pool)
        .await?;

        let id = result.last_insert_rowid();
        info!(incident_id = id, severity = %incident.severity_level, risk_score, "Incident reported");
        Ok((id, risk_score))
    }

    pub async fn update_status(&self, id: i64, status: &str) -> Result<(), QhseError> {
        validate_status(status)?;
        let result = sqlx::query("UPDATE incident_reports SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db_pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(QhseError::NotFound(format!("Incident {}", id)));
        }
        info!(incident_id = id, status, "Incident status updated");
        Ok(())
    }

    pub async fn dashboard(&self) -> Result<DashboardSummary, QhseError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM incident_reports")
            .fetch_one(&self.db_pool)
            .await?;

        let mut severity_breakdown: BTreeMap<String, i64> = Severity::all()
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT severity_level, COUNT(*) FROM incident_reports GROUP BY severity_level",
        )
        .fetch_all(&self.db_pool)
        .await?;
        for (severity, count) in rows {
            severity_breakdown.insert(severity, count);
        }

        let recent_incidents_7d: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM incident_reports WHERE created_at >= ?")
            .bind(Utc::now() - Duration::days(7))
            .fetch_one(&self.db_pool)
            .await?;

        let resolved: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM incident_reports WHERE status IN ('resolved', 'closed')",
        )
        .fetch_one(&self.db_pool)
        .await?;

        let resolution_rate = if total > 0 {
            round_to(resolved as f64 / total as f64 * 100.0, 1)
        } else {
            0.0
        };

        let recent_incidents = self
            .list(&IncidentFilter {
                limit: 10,
                ..IncidentFilter::default()
            })
            .await?;

        Ok(DashboardSummary {
            total_incidents: total,
            severity_breakdown,
            recent_incidents_7d,
            resolution_rate,
            recent_incidents,
        })
    }

    pub async fn statistics(&self) -> Result<IncidentStatistics, QhseError> {
        let by_sector = sqlx::query_as::<_, NamedCount>(
            "SELECT s.name AS name, COUNT(i.id) AS count
             FROM sectors s LEFT JOIN incident_reports i ON i.sector_id = s.id
             GROUP BY s.id, s.name ORDER BY count DESC, s.name",
        )
        .fetch_all(&self.db_pool)
        .await?;

        let by_type = sqlx::query_as::<_, NamedCount>(
            "SELECT t.name AS name, COUNT(i.id) AS count
             FROM incident_types t LEFT JOIN incident_reports i ON i.incident_type_id = t.id
             GROUP BY t.id, t.name ORDER BY count DESC, t.name",
        )
        .fetch_all(&self.db_pool)
        .await?;

        let now = Utc::now();
        let timestamps: Vec<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT created_at FROM incident_reports WHERE created_at > ?",
        )
        .bind(now - Duration::days(180))
        .fetch_all(&self.db_pool)
        .await?;

        Ok(IncidentStatistics {
            by_sector,
            by_type,
            monthly_trend: thirty_day_trend(&timestamps, now, 6),
        })
    }

    pub async fn high_risk(&self) -> Result<Vec<IncidentView>, QhseError> {
        let rows = sqlx::query_as::<_, IncidentView>(&format!(
            "{} WHERE i.severity_level IN ('high', 'critical') ORDER BY i.risk_score DESC LIMIT 20",
            INCIDENT_VIEW_SELECT
        ))
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows)
    }

    pub async fn corrective_actions(&self, incident_id: i64) -> Result<Vec<CorrectiveAction>, QhseError> {
        let rows = sqlx::query_as::<_, CorrectiveAction>(
            "SELECT id, incident_id, action_type, description, priority, status, due_date, created_at
             FROM corrective_actions WHERE incident_id = ? ORDER BY created_at DESC",
        )
        .bind(incident_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows)
    }

    pub async fn add_corrective_action(
        &self,
        incident_id: i64,
        action: &NewCorrectiveAction,
    ) -> Result<i64, QhseError> {
        if action.action_type.trim().is_empty() || action.description.trim().is_empty() {
            return Err(QhseError::Validation(
                "action_type and description are required".to_string(),
            ));
        }
        if self.get(incident_id).await?.is_none() {
            return Err(QhseError::NotFound(format!("Incident {}", incident_id)));
        }

        let result = sqlx::query(
            "INSERT INTO corrective_actions (incident_id, action_type, description, priority, status, due_date, created_at)
             VALUES (?, ?, ?, ?, 'pending', ?, ?)",
        )
        .bind(incident_id)
        .bind(&action.action_type)
        .bind(&action.description)
        .bind(&action.priority)
        .bind(action.due_date)
        .bind(Utc::now())
        .execute(&self.db_pool)
        .await?;
        Ok(result.last_insert_rowid())
    }
}
