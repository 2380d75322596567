// Supplier registry, audits and incident-driven scoring

use crate::core::errors::QhseError;
use crate::core::models::round_to;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, SqlitePool};
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Supplier {
    pub supplier_id: String,
    pub name: String,
    pub contact_person: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub country: String,
    pub business_type: String,
    pub registration_number: Option<String>,
    pub status: String,
    pub risk_level: String,
    pub qhse_score: f64,
    pub last_audit_date: Option<DateTime<Utc>>,
    pub next_audit_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSupplier {
    pub name: String,
    pub contact_person: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub country: String,
    pub business_type: String,
    pub registration_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SupplierAudit {
    pub audit_id: String,
    pub supplier_id: String,
    pub auditor_id: i64,
    pub audit_type: String,
    pub scheduled_date: DateTime<Utc>,
    pub completed_date: Option<DateTime<Utc>>,
    pub status: String,
    pub score: Option<f64>,
    #[sqlx(json)]
    pub findings: Value,
    #[sqlx(json)]
    pub recommendations: Value,
    pub compliance_percentage: f64,
    #[sqlx(json)]
    pub risk_areas: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditSchedule {
    pub auditor_id: Option<i64>,
    pub audit_type: String,
    pub scheduled_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditResult {
    pub score: f64,
    #[serde(default)]
    pub findings: Vec<Value>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub compliance_percentage: f64,
    #[serde(default)]
    pub risk_areas: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupplierIncidentReport {
    pub incident_type: String,
    pub description: String,
    pub severity_level: i64,
    pub occurred_date: Option<DateTime<Utc>>,
    pub impact_assessment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncidentOutcome {
    pub incident_id: String,
    pub qhse_score: f64,
    pub risk_level: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskFactors {
    pub qhse_score: f64,
    pub incident_count: i64,
    pub severe_incidents: i64,
    pub audit_compliance: f64,
    pub risk_level: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub supplier_id: String,
    pub supplier_name: String,
    pub risk_score: f64,
    pub risk_level: String,
    pub risk_factors: RiskFactors,
    pub recommendations: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OverdueAudit {
    pub audit_id: String,
    pub supplier_id: String,
    pub supplier_name: String,
    pub scheduled_date: DateTime<Utc>,
    pub audit_type: String,
    #[sqlx(skip)]
    pub days_overdue: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupplierStatistics {
    pub total_suppliers: i64,
    pub status_distribution: BTreeMap<String, i64>,
    pub risk_distribution: BTreeMap<String, i64>,
    pub average_qhse_score: f64,
    pub recent_incidents: i64,
    pub overdue_audits: usize,
    pub high_risk_suppliers: i64,
}

pub const SUPPLIER_STATUSES: [&str; 5] = ["active", "suspended", "blacklisted", "pending", "under_review"];

pub const RISK_LEVELS: [&str; 4] = ["low", "medium", "high", "critical"];

/// Risk classification for a QHSE score
pub fn risk_level_for_score(score: f64) -> &'static str {
    if score >= 90.0 {
        "low"
    } else if score >= 70.0 {
        "medium"
    } else if score >= 50.0 {
        "high"
    } else {
        "critical"
    }
}

/// Score penalty for an incident of the given severity (1..=5)
pub fn incident_penalty(severity_level: i64) -> f64 {
    match severity_level {
        1 => 2.0,
        2 => 5.0,
        3 => 10.0,
        4 => 20.0,
        5 => 30.0,
        _ => 5.0,
    }
}

/// Weighted 0..=100 risk score, higher is riskier
pub fn risk_score(factors: &RiskFactors) -> f64 {
    let raw = (100.0 - factors.qhse_score) * 0.4
        + factors.incident_count as f64 * 5.0
        + factors.severe_incidents as f64 * 15.0
        + (100.0 - factors.audit_compliance) * 0.3;
    round_to(raw.clamp(0.0, 100.0), 2)
}

pub fn risk_recommendations(factors: &RiskFactors) -> Vec<String> {
    let mut recommendations = Vec::new();
    if factors.qhse_score < 70.0 {
        recommendations.push("Améliorer le score QHSE par des formations et audits".to_string());
    }
    if factors.incident_count > 3 {
        recommendations.push("Réduire le nombre d'incidents par des mesures préventives".to_string());
    }
    if factors.severe_incidents > 0 {
        recommendations.push("Mettre en place un plan d'action pour les incidents graves".to_string());
    }
    if factors.audit_compliance < 80.0 {
        recommendations.push("Améliorer la conformité aux exigences QHSE".to_string());
    }
    if matches!(factors.risk_level.as_str(), "high" | "critical") {
        recommendations.push("Surveillance renforcée et audits plus fréquents".to_string());
    }
    recommendations
}

fn json_text<T: Serialize>(value: &T) -> Result<String, QhseError> {
    serde_json::to_string(value).map_err(|e| QhseError::Validation(format!("Invalid JSON field: {}", e)))
}

const SUPPLIER_COLUMNS: &str = "supplier_id, name, contact_person, email, phone, address, country, business_type,
     registration_number, status, risk_level, qhse_score, last_audit_date, next_audit_date, created_at, updated_at";

const AUDIT_COLUMNS: &str = "audit_id, supplier_id, auditor_id, audit_type, scheduled_date, completed_date, status,
     score, findings, recommendations, compliance_percentage, risk_areas";

#[derive(Clone)]
pub struct SupplierManager {
    db_pool: SqlitePool,
}

impl SupplierManager {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn suppliers(&self) -> Result<Vec<Supplier>, QhseError> {
        let rows = sqlx::query_as::<_, Supplier>(&format!("SELECT {} FROM suppliers ORDER BY name", SUPPLIER_COLUMNS))
            .fetch_all(&self.db_pool)
            .await?;
        Ok(rows)
    }

    pub async fn supplier(&self, supplier_id: &str) -> Result<Option<Supplier>, QhseError> {
        let row = sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {} FROM suppliers WHERE supplier_id = ?",
            SUPPLIER_COLUMNS
        ))
        .bind(supplier_id)
        .fetch_optional(&self.db_pool)
        .await?;
        Ok(row)
    }

    async fn require_supplier(&self, supplier_id: &str) -> Result<Supplier, QhseError> {
        self.supplier(supplier_id)
            .await?
            .ok_or_else(|| QhseError::NotFound(format!("Supplier {}", supplier_id)))
    }

    /// Register a supplier as pending, medium risk, score 0
    pub async fn add_supplier(&self, supplier: &NewSupplier) -> Result<Supplier, QhseError> {
        if supplier.name.trim().is_empty() || supplier.email.trim().is_empty() {
            return Err(QhseError::Validation("name and email are required".to_string()));
        }

        let supplier_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO suppliers (supplier_id, name, contact_person, email, phone, address, country, business_type,
              registration_number, status, risk_level, qhse_score, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', 'medium', 0.0, ?, ?)",
        )
        .bind(&supplier_id)
        .bind(&supplier.name)
        .bind(&supplier.contact_person)
        .bind(&supplier.email)
        .bind(&supplier.phone)
        .bind(&supplier.address)
        .bind(&supplier.country)
        .bind(&supplier.business_type)
        .bind(&supplier.registration_number)
        .bind(now)
        .bind(now)
        .execute(&self.db_pool)
        .await?;

        info!(supplier_id = %supplier_id, name = %supplier.name, "Supplier added");
        self.require_supplier(&supplier_id).await
    }

    pub async fn update_status(&self, supplier_id: &str, status: &str) -> Result<Supplier, QhseError> {
        if !SUPPLIER_STATUSES.contains(&status) {
            return Err(QhseError::Validation(format!("Unknown supplier status '{}'", status)));
        }
        let result = sqlx::query("UPDATE suppliers SET status = ?, updated_at = ? WHERE supplier_id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(supplier_id)
            .execute(&self.db_pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(QhseError::NotFound(format!("Supplier {}", supplier_id)));
        }
        info!(supplier_id, status, "Supplier status updated");
        self.require_supplier(supplier_id).await
    }

    /// Suppliers currently classified at `risk_level`, best score first
    pub async fn by_risk_level(&self, risk_level: &str) -> Result<Vec<Supplier>, QhseError> {
        if !RISK_LEVELS.contains(&risk_level) {
            return Err(QhseError::Validation(format!("Unknown risk level '{}'", risk_level)));
        }
        let rows = sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {} FROM suppliers WHERE risk_level = ? ORDER BY qhse_score DESC, name",
            SUPPLIER_COLUMNS
        ))
        .bind(risk_level)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows)
    }

    pub async fn schedule_audit(&self, supplier_id: &str, auditor_id: i64, schedule: &AuditSchedule) -> Result<String, QhseError> {
        if schedule.audit_type.trim().is_empty() {
            return Err(QhseError::Validation("audit_type is required".to_string()));
        }
        self.require_supplier(supplier_id).await?;

        let audit_id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO supplier_audits (audit_id, supplier_id, auditor_id, audit_type, scheduled_date, status, created_at)
             VALUES (?, ?, ?, ?, ?, 'scheduled', ?)",
        )
        .bind(&audit_id)
        .bind(supplier_id)
        .bind(auditor_id)
        .bind(&schedule.audit_type)
        .bind(schedule.scheduled_date)
        .bind(Utc::now())
        .execute(&self.db_pool)
        .await?;

        sqlx::query("UPDATE suppliers SET next_audit_date = ?, updated_at = ? WHERE supplier_id = ?")
            .bind(schedule.scheduled_date)
            .bind(Utc::now())
            .bind(supplier_id)
            .execute(&self.db_pool)
            .await?;

        info!(audit_id = %audit_id, supplier_id, "Supplier audit scheduled");
        Ok(audit_id)
    }

    pub async fn audit(&self, audit_id: &str) -> Result<Option<SupplierAudit>, QhseError> {
        let row = sqlx::query_as::<_, SupplierAudit>(&format!(
            "SELECT {} FROM supplier_audits WHERE audit_id = ?",
            AUDIT_COLUMNS
        ))
        .bind(audit_id)
        .fetch_optional(&self.db_pool)
        .await?;
        Ok(row)
    }

    /// Record the audit result; the supplier takes the audit score and its risk is reclassified
    pub async fn complete_audit(&self, audit_id: &str, result: &AuditResult) -> Result<Supplier, QhseError> {
        if !(0.0..=100.0).contains(&result.score) || !(0.0..=100.0).contains(&result.compliance_percentage) {
            return Err(QhseError::Validation(
                "score and compliance_percentage must be between 0 and 100".to_string(),
            ));
        }
        let audit = self
            .audit(audit_id)
            .await?
            .ok_or_else(|| QhseError::NotFound(format!("Audit {}", audit_id)))?;
        if audit.status == "completed" {
            return Err(QhseError::Conflict(format!("Audit {} is already completed", audit_id)));
        }

        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;
        sqlx::query(
            "UPDATE supplier_audits SET completed_date = ?, status = 'completed', score = ?, findings = ?,
              recommendations = ?, compliance_percentage = ?, risk_areas = ?
             WHERE audit_id = ?",
        )
        .bind(now)
        .bind(result.score)
        .bind(json_text(&result.findings)?)
        .bind(json_text(&result.recommendations)?)
        .bind(result.compliance_percentage)
        .bind(json_text(&result.risk_areas)?)
        .bind(audit_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "UPDATE suppliers SET qhse_score = ?, risk_level = ?, last_audit_date = ?, updated_at = ?
             WHERE supplier_id = ?",
        )
        .bind(result.score)
        .bind(risk_level_for_score(result.score))
        .bind(now)
        .bind(now)
        .bind(&audit.supplier_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!(audit_id, supplier_id = %audit.supplier_id, score = result.score, "Supplier audit completed");
        self.require_supplier(&audit.supplier_id).await
    }

    /// Record an incident and subtract its severity penalty from the supplier score
    pub async fn report_incident(
        &self,
        supplier_id: &str,
        report: &SupplierIncidentReport,
    ) -> Result<IncidentOutcome, QhseError> {
        if !(1..=5).contains(&report.severity_level) {
            return Err(QhseError::Validation("severity_level must be between 1 and 5".to_string()));
        }
        if report.incident_type.trim().is_empty() {
            return Err(QhseError::Validation("incident_type is required".to_string()));
        }
        let supplier = self.require_supplier(supplier_id).await?;

        let now = Utc::now();
        let incident_id = Uuid::new_v4().to_string();
        let qhse_score = (supplier.qhse_score - incident_penalty(report.severity_level)).max(0.0);
        let risk_level = risk_level_for_score(qhse_score);

        let mut tx = self.db_pool.begin().await?;
        sqlx::query(
            "INSERT INTO supplier_incidents (incident_id, supplier_id, incident_type, description, severity_level,
              occurred_date, impact_assessment, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 'open', ?)",
        )
        .bind(&incident_id)
        .bind(supplier_id)
        .bind(&report.incident_type)
        .bind(&report.description)
        .bind(report.severity_level)
        .bind(report.occurred_date.unwrap_or(now))
        .bind(report.impact_assessment.as_deref().unwrap_or(""))
        .bind(now)
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE suppliers SET qhse_score = ?, risk_level = ?, updated_at = ? WHERE supplier_id = ?")
            .bind(qhse_score)
            .bind(risk_level)
            .bind(now)
            .bind(supplier_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(incident_id = %incident_id, supplier_id, severity = report.severity_level, qhse_score, "Supplier incident reported");
        Ok(IncidentOutcome {
            incident_id,
            qhse_score,
            risk_level: risk_level.to_string(),
        })
    }

    /// Risk over the last 365 days of incidents and completed audits
    pub async fn risk_assessment(&self, supplier_id: &str) -> Result<RiskAssessment, QhseError> {
        let supplier = self.require_supplier(supplier_id).await?;
        let since = Utc::now() - Duration::days(365);

        let (incident_count, severe_incidents): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN severity_level >= 4 THEN 1 ELSE 0 END), 0)
             FROM supplier_incidents WHERE supplier_id = ? AND occurred_date >= ?",
        )
        .bind(supplier_id)
        .bind(since)
        .fetch_one(&self.db_pool)
        .await?;

        let audit_compliance: Option<f64> = sqlx::query_scalar(
            "SELECT AVG(compliance_percentage) FROM supplier_audits
             WHERE supplier_id = ? AND completed_date IS NOT NULL AND completed_date >= ?",
        )
        .bind(supplier_id)
        .bind(since)
        .fetch_one(&self.db_pool)
        .await?;

        let factors = RiskFactors {
            qhse_score: supplier.qhse_score,
            incident_count,
            severe_incidents,
            audit_compliance: audit_compliance.unwrap_or(0.0),
            risk_level: supplier.risk_level.clone(),
        };

        Ok(RiskAssessment {
            risk_score: risk_score(&factors),
            recommendations: risk_recommendations(&factors),
            supplier_id: supplier.supplier_id,
            supplier_name: supplier.name,
            risk_level: supplier.risk_level,
            risk_factors: factors,
            last_updated: supplier.updated_at,
        })
    }

    /// Scheduled audits past their date, most overdue first
    pub async fn overdue_audits(&self) -> Result<Vec<OverdueAudit>, QhseError> {
        let now = Utc::now();
        let mut rows = sqlx::query_as::<_, OverdueAudit>(
            "SELECT a.audit_id, a.supplier_id, s.name AS supplier_name, a.scheduled_date, a.audit_type
             FROM supplier_audits a JOIN suppliers s ON s.supplier_id = a.supplier_id
             WHERE a.status = 'scheduled' AND a.scheduled_date < ?",
        )
        .bind(now)
        .fetch_all(&self.db_pool)
        .await?;

        for audit in rows.iter_mut() {
            audit.days_overdue = (now - audit.scheduled_date).num_days();
        }
        rows.sort_by(|a, b| b.days_overdue.cmp(&a.days_overdue));
        Ok(rows)
    }

    pub async fn audits_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<SupplierAudit>, QhseError> {
        let rows = sqlx::query_as::<_, SupplierAudit>(&format!(
            "SELECT {} FROM supplier_audits WHERE scheduled_date >= ? AND scheduled_date <= ? ORDER BY scheduled_date",
            AUDIT_COLUMNS
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows)
    }

    pub async fn statistics(&self) -> Result<SupplierStatistics, QhseError> {
        let status_distribution: BTreeMap<String, i64> =
            sqlx::query_as::<_, (String, i64)>("SELECT status, COUNT(*) FROM suppliers GROUP BY status")
                .fetch_all(&self.db_pool)
                .await?
                .into_iter()
                .collect();
        let risk_distribution: BTreeMap<String, i64> =
            sqlx::query_as::<_, (String, i64)>("SELECT risk_level, COUNT(*) FROM suppliers GROUP BY risk_level")
                .fetch_all(&self.db_pool)
                .await?
                .into_iter()
                .collect();
        let total_suppliers: i64 = status_distribution.values().sum();

        let average: Option<f64> = sqlx::query_scalar("SELECT AVG(qhse_score) FROM suppliers")
            .fetch_one(&self.db_pool)
            .await?;
        let recent_incidents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM supplier_incidents WHERE occurred_date >= ?")
            .bind(Utc::now() - Duration::days(30))
            .fetch_one(&self.db_pool)
            .await?;
        let high_risk_suppliers = ["high", "critical"]
            .iter()
            .map(|level| risk_distribution.get(*level).copied().unwrap_or(0))
            .sum();

        Ok(SupplierStatistics {
            total_suppliers,
            average_qhse_score: round_to(average.unwrap_or(0.0), 2),
            recent_incidents,
            overdue_audits: self.overdue_audits().await?.len(),
            high_risk_suppliers,
            status_distribution,
            risk_distribution,
        })
    }
}
