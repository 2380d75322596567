// Report assembly from aggregate queries

use crate::compliance::{RegulationRegistry, RegulationStatus, CONFORMING};
use crate::core::errors::QhseError;
use crate::core::models::round_to;
use crate::reports::catalog::ReportKind;
use crate::suppliers::{OverdueAudit, SupplierAudit, SupplierManager};
use crate::training::{TrainingManager, TrainingReport};
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use std::collections::{BTreeMap, HashMap};
use tracing::info;

/// Reporting window; defaults to the last 30 days
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ReportPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportPeriod {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<Self, QhseError> {
        let end = end.unwrap_or_else(Utc::now);
        let start = start.unwrap_or(end - Duration::days(30));
        if end < start {
            return Err(QhseError::Validation("end must not precede start".to_string()));
        }
        Ok(Self { start, end })
    }

    /// Window of the same length ending just before this one starts
    ///
    /// Both bounds are inclusive, so the windows must not share an instant.
    pub fn previous(&self) -> Self {
        let length = self.end - self.start;
        let end = self.start - Duration::microseconds(1);
        Self {
            start: end - length,
            end,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct IncidentRow {
    pub sector_name: String,
    pub incident_type_name: String,
    pub severity_level: String,
    pub status: String,
    pub risk_score: f64,
    pub ai_recommendations: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncidentTotals {
    pub total_incidents: i64,
    pub critical_incidents: i64,
    pub high_risk_incidents: i64,
    pub resolved_incidents: i64,
    pub average_risk_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectorRisk {
    pub sector: String,
    pub avg_risk_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationCount {
    pub recommendation: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncidentSummaryReport {
    pub report_type: &'static str,
    pub generated_at: DateTime<Utc>,
    pub period: ReportPeriod,
    pub statistics: IncidentTotals,
    pub sector_breakdown: BTreeMap<String, i64>,
    pub type_breakdown: BTreeMap<String, i64>,
    pub severity_breakdown: BTreeMap<String, i64>,
    /// Keyed by `YYYY-MM`
    pub monthly_trend: BTreeMap<String, i64>,
    pub top_risk_sectors: Vec<SectorRisk>,
    pub top_recommendations: Vec<RecommendationCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegulatoryComplianceReport {
    pub report_type: &'static str,
    pub generated_at: DateTime<Utc>,
    pub quarter: String,
    pub year: i32,
    pub compliance_rate: f64,
    pub average_score: f64,
    pub total_regulations: i64,
    pub conforming_regulations: i64,
    pub regulations: Vec<RegulationStatus>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SafetyKpis {
    pub total_incidents: i64,
    pub avg_risk_score: f64,
    pub critical_incidents: i64,
    pub resolved_incidents: i64,
    pub open_incidents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SafetyObjectives {
    pub target_incidents: f64,
    pub target_resolution_rate: f64,
    pub target_critical_rate: f64,
    pub target_risk_score: f64,
}

pub const SAFETY_OBJECTIVES: SafetyObjectives = SafetyObjectives {
    target_incidents: 10.0,
    target_resolution_rate: 90.0,
    target_critical_rate: 5.0,
    target_risk_score: 2.0,
};

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceIndicators {
    pub resolution_rate: f64,
    pub critical_rate: f64,
    pub incident_trend: f64,
    pub risk_trend: f64,
}

/// Each figure is a percentage of its objective
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceVsTargets {
    pub incidents_vs_target: f64,
    pub resolution_vs_target: f64,
    pub critical_vs_target: f64,
    pub risk_vs_target: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SafetyPerformanceReport {
    pub report_type: &'static str,
    pub generated_at: DateTime<Utc>,
    pub period: ReportPeriod,
    pub kpis: SafetyKpis,
    pub previous_kpis: SafetyKpis,
    pub performance_indicators: PerformanceIndicators,
    pub objectives: SafetyObjectives,
    pub performance_vs_targets: PerformanceVsTargets,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SectorRiskRow {
    pub sector: String,
    pub incident_count: i64,
    pub avg_risk_score: f64,
    pub max_risk_score: f64,
    pub critical_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskSummary {
    pub total_sectors: usize,
    pub high_risk_sectors: usize,
    pub average_risk_score: f64,
    pub highest_risk_sector: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessmentReport {
    pub report_type: &'static str,
    pub generated_at: DateTime<Utc>,
    pub period: ReportPeriod,
    pub risk_analysis: Vec<SectorRiskRow>,
    pub risk_classification: BTreeMap<&'static str, Vec<SectorRiskRow>>,
    pub recommendations: BTreeMap<&'static str, &'static [&'static str]>,
    pub summary: RiskSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub report_type: &'static str,
    pub generated_at: DateTime<Utc>,
    pub period: ReportPeriod,
    pub total_audits: usize,
    pub completed_audits: usize,
    pub average_score: f64,
    pub average_compliance: f64,
    pub by_type: BTreeMap<String, i64>,
    pub audits: Vec<SupplierAudit>,
    pub overdue_audits: Vec<OverdueAudit>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Report {
    IncidentSummary(IncidentSummaryReport),
    RegulatoryCompliance(RegulatoryComplianceReport),
    SafetyPerformance(SafetyPerformanceReport),
    TrainingCompliance(TrainingReport),
    RiskAssessment(RiskAssessmentReport),
    Audit(AuditReport),
}

const RISK_RECOMMENDATIONS: [(&str, &[&str]); 4] = [
    (
        "critical",
        &[
            "Arrêt immédiat des activités à risque",
            "Formation d'urgence de l'équipe",
            "Révision complète des procédures",
            "Audit approfondi du secteur",
        ],
    ),
    (
        "high",
        &[
            "Formation renforcée des équipes",
            "Vérification des EPI",
            "Mise à jour des procédures",
            "Surveillance accrue",
        ],
    ),
    (
        "medium",
        &["Formation préventive", "Contrôles périodiques", "Sensibilisation des équipes"],
    ),
    ("low", &["Maintien des procédures", "Surveillance de routine"]),
];

/// Sector class from its average risk score
pub fn risk_class(avg_risk_score: f64) -> &'static str {
    if avg_risk_score >= 4.0 {
        "critical"
    } else if avg_risk_score >= 3.0 {
        "high"
    } else if avg_risk_score >= 2.0 {
        "medium"
    } else {
        "low"
    }
}

fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        round_to(part / whole * 100.0, 2)
    } else {
        0.0
    }
}

pub fn summarize_incidents(rows: &[IncidentRow]) -> (IncidentTotals, BTreeMap<String, i64>, Vec<SectorRisk>) {
    let total = rows.len() as i64;
    let count_where = |pred: &dyn Fn(&IncidentRow) -> bool| rows.iter().filter(|r| pred(*r)).count() as i64;
    let totals = IncidentTotals {
        total_incidents: total,
        critical_incidents: count_where(&|r| r.severity_level == "critical"),
        high_risk_incidents: count_where(&|r| r.severity_level == "high"),
        resolved_incidents: count_where(&|r| r.status == "resolved" || r.status == "closed"),
        average_risk_score: if total > 0 {
            round_to(rows.iter().map(|r| r.risk_score).sum::<f64>() / total as f64, 2)
        } else {
            0.0
        },
    };

    let mut monthly_trend = BTreeMap::new();
    for row in rows {
        *monthly_trend.entry(row.created_at.format("%Y-%m").to_string()).or_insert(0) += 1;
    }

    let mut by_sector: HashMap<&str, (f64, i64)> = HashMap::new();
    for row in rows {
        let entry = by_sector.entry(row.sector_name.as_str()).or_insert((0.0, 0));
        entry.0 += row.risk_score;
        entry.1 += 1;
    }
    let mut top_risk_sectors: Vec<SectorRisk> = by_sector
        .into_iter()
        .map(|(sector, (sum, count))| SectorRisk {
            sector: sector.to_string(),
            avg_risk_score: round_to(sum / count as f64, 2),
        })
        .collect();
    top_risk_sectors.sort_by(|a, b| {
        b.avg_risk_score
            .total_cmp(&a.avg_risk_score)
            .then_with(|| a.sector.cmp(&b.sector))
    });
    top_risk_sectors.truncate(5);

    (totals, monthly_trend, top_risk_sectors)
}

pub fn performance_recommendations(performance: &PerformanceVsTargets) -> Vec<String> {
    let mut recommendations = Vec::new();
    if performance.incidents_vs_target > 120.0 {
        recommendations.push(
            "Le nombre d'incidents dépasse l'objectif de 20%. Renforcer les mesures préventives.".to_string(),
        );
    }
    if performance.resolution_vs_target < 80.0 {
        recommendations
            .push("Le taux de résolution est insuffisant. Accélérer le traitement des incidents.".to_string());
    }
    if performance.critical_vs_target > 200.0 {
        recommendations.push("Trop d'incidents critiques. Mise en place d'actions d'urgence.".to_string());
    }
    if performance.risk_vs_target > 150.0 {
        recommendations.push("Score de risque trop élevé. Révision des procédures de sécurité.".to_string());
    }
    if recommendations.is_empty() {
        recommendations.push("Performance conforme aux objectifs. Maintenir les efforts.".to_string());
    }
    recommendations
}

fn breakdown<'a>(keys: impl Iterator<Item = &'a str>) -> BTreeMap<String, i64> {
    let mut counts = BTreeMap::new();
    for key in keys {
        *counts.entry(key.to_string()).or_insert(0) += 1;
    }
    counts
}

#[derive(Clone)]
pub struct ReportGenerator {
    db_pool: SqlitePool,
    training: TrainingManager,
    suppliers: SupplierManager,
    regulations: RegulationRegistry,
}

impl ReportGenerator {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self {
            training: TrainingManager::new(db_pool.clone()),
            suppliers: SupplierManager::new(db_pool.clone()),
            regulations: RegulationRegistry::new(db_pool.clone()),
            db_pool,
        }
    }

    pub async fn generate(&self, kind: ReportKind, period: ReportPeriod) -> Result<Report, QhseError> {
        let report = match kind {
            ReportKind::IncidentSummary => Report::IncidentSummary(self.incident_summary(period).await?),
            ReportKind::RegulatoryCompliance => Report::RegulatoryCompliance(self.regulatory_compliance(period).await?),
            ReportKind::SafetyPerformance => Report::SafetyPerformance(self.safety_performance(period).await?),
            ReportKind::TrainingCompliance => Report::TrainingCompliance(self.training_compliance(period).await?),
            ReportKind::RiskAssessment => Report::RiskAssessment(self.risk_assessment(period).await?),
            ReportKind::AuditReport => Report::Audit(self.audit_report(period).await?),
        };
        info!(report_type = %kind, start = %period.start, end = %period.end, "Report generated");
        Ok(report)
    }

    pub async fn incident_summary(&self, period: ReportPeriod) -> Result<IncidentSummaryReport, QhseError> {
        let rows = sqlx::query_as::<_, IncidentRow>(
            "SELECT s.name AS sector_name, t.name AS incident_type_name, i.severity_level, i.status,
                    i.risk_score, i.ai_recommendations, i.created_at
             FROM incident_reports i
             JOIN sectors s ON s.id = i.sector_id
             JOIN incident_types t ON t.id = i.incident_type_id
             WHERE i.created_at >= ? AND i.created_at <= ?
             ORDER BY i.created_at DESC",
        )
        .bind(period.start)
        .bind(period.end)
        .fetch_all(&self.db_pool)
        .await?;

        let (statistics, monthly_trend, top_risk_sectors) = summarize_incidents(&rows);

        let mut recommendation_counts: HashMap<&str, i64> = HashMap::new();
        for line in rows
            .iter()
            .filter_map(|r| r.ai_recommendations.as_deref())
            .flat_map(str::lines)
            .map(str::trim)
            .filter(|l| !l.is_empty())
        {
            *recommendation_counts.entry(line).or_insert(0) += 1;
        }
        let mut top_recommendations: Vec<RecommendationCount> = recommendation_counts
            .into_iter()
            .map(|(recommendation, count)| RecommendationCount {
                recommendation: recommendation.to_string(),
                count,
            })
            .collect();
        top_recommendations.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.recommendation.cmp(&b.recommendation)));
        top_recommendations.truncate(10);

        Ok(IncidentSummaryReport {
            report_type: ReportKind::IncidentSummary.as_str(),
            generated_at: Utc::now(),
            period,
            sector_breakdown: breakdown(rows.iter().map(|r| r.sector_name.as_str())),
            type_breakdown: breakdown(rows.iter().map(|r| r.incident_type_name.as_str())),
            severity_breakdown: breakdown(rows.iter().map(|r| r.severity_level.as_str())),
            statistics,
            monthly_trend,
            top_risk_sectors,
            top_recommendations,
        })
    }

    /// Quarter and year are those of the period end
    pub async fn regulatory_compliance(&self, period: ReportPeriod) -> Result<RegulatoryComplianceReport, QhseError> {
        let regulations = self.regulations.regulations().await?;

        let total = regulations.len() as i64;
        let conforming = regulations.iter().filter(|r| r.status == CONFORMING).count() as i64;
        let average_score = if total > 0 {
            round_to(regulations.iter().map(|r| r.compliance_rate).sum::<f64>() / total as f64, 2)
        } else {
            0.0
        };

        let mut recommendations: Vec<String> = regulations
            .iter()
            .filter(|r| r.status != CONFORMING)
            .map(|r| format!("Prioriser la mise en conformité {}", r.code))
            .collect();
        recommendations.push("Planifier les audits de suivi".to_string());
        recommendations.push("Renforcer la formation des équipes".to_string());

        Ok(RegulatoryComplianceReport {
            report_type: ReportKind::RegulatoryCompliance.as_str(),
            generated_at: Utc::now(),
            quarter: format!("Q{}", period.end.month0() / 3 + 1),
            year: period.end.year(),
            compliance_rate: percentage(conforming as f64, total as f64),
            average_score,
            total_regulations: total,
            conforming_regulations: conforming,
            regulations,
            recommendations,
        })
    }

    async fn safety_kpis(&self, period: ReportPeriod) -> Result<SafetyKpis, QhseError> {
        let kpis = sqlx::query_as::<_, SafetyKpis>(
            "SELECT COUNT(*) AS total_incidents,
                    COALESCE(AVG(risk_score), 0.0) AS avg_risk_score,
                    COALESCE(SUM(CASE WHEN severity_level = 'critical' THEN 1 ELSE 0 END), 0) AS critical_incidents,
                    COALESCE(SUM(CASE WHEN status IN ('resolved', 'closed') THEN 1 ELSE 0 END), 0) AS resolved_incidents,
                    COALESCE(SUM(CASE WHEN status = 'open' THEN 1 ELSE 0 END), 0) AS open_incidents
             FROM incident_reports WHERE created_at >= ? AND created_at <= ?",
        )
        .bind(period.start)
        .bind(period.end)
        .fetch_one(&self.db_pool)
        .await?;
        Ok(kpis)
    }

    pub async fn safety_performance(&self, period: ReportPeriod) -> Result<SafetyPerformanceReport, QhseError> {
        let mut kpis = self.safety_kpis(period).await?;
        let previous_kpis = self.safety_kpis(period.previous()).await?;
        kpis.avg_risk_score = round_to(kpis.avg_risk_score, 2);

        let total = kpis.total_incidents as f64;
        let resolution_rate = percentage(kpis.resolved_incidents as f64, total);
        let critical_rate = percentage(kpis.critical_incidents as f64, total);
        let incident_trend = percentage(
            (kpis.total_incidents - previous_kpis.total_incidents) as f64,
            previous_kpis.total_incidents as f64,
        );

        let objectives = SAFETY_OBJECTIVES;
        let performance_vs_targets = PerformanceVsTargets {
            incidents_vs_target: percentage(total, objectives.target_incidents),
            resolution_vs_target: percentage(resolution_rate, objectives.target_resolution_rate),
            critical_vs_target: percentage(critical_rate, objectives.target_critical_rate),
            risk_vs_target: percentage(kpis.avg_risk_score, objectives.target_risk_score),
        };
        let recommendations = performance_recommendations(&performance_vs_targets);

        Ok(SafetyPerformanceReport {
            report_type: ReportKind::SafetyPerformance.as_str(),
            generated_at: Utc::now(),
            period,
            performance_indicators: PerformanceIndicators {
                resolution_rate,
                critical_rate,
                incident_trend,
                risk_trend: round_to(kpis.avg_risk_score - previous_kpis.avg_risk_score, 2),
            },
            kpis,
            previous_kpis,
            objectives,
            performance_vs_targets,
            recommendations,
        })
    }

    pub async fn training_compliance(&self, period: ReportPeriod) -> Result<TrainingReport, QhseError> {
        let mut report = self.training.report(period.start, period.end).await?;
        report.report_type = ReportKind::TrainingCompliance.as_str();
        Ok(report)
    }

    pub async fn risk_assessment(&self, period: ReportPeriod) -> Result<RiskAssessmentReport, QhseError> {
        let risk_analysis = sqlx::query_as::<_, SectorRiskRow>(
            "SELECT s.name AS sector,
                    COUNT(*) AS incident_count,
                    AVG(i.risk_score) AS avg_risk_score,
                    MAX(i.risk_score) AS max_risk_score,
                    COALESCE(SUM(CASE WHEN i.severity_level = 'critical' THEN 1 ELSE 0 END), 0) AS critical_count
             FROM incident_reports i
             JOIN sectors s ON s.id = i.sector_id
             WHERE i.created_at >= ? AND i.created_at <= ?
             GROUP BY s.id, s.name
             ORDER BY avg_risk_score DESC",
        )
        .bind(period.start)
        .bind(period.end)
        .fetch_all(&self.db_pool)
        .await?;

        let mut risk_classification: BTreeMap<&'static str, Vec<SectorRiskRow>> =
            RISK_RECOMMENDATIONS.iter().map(|(level, _)| (*level, Vec::new())).collect();
        for row in &risk_analysis {
            risk_classification
                .entry(risk_class(row.avg_risk_score))
                .or_default()
                .push(row.clone());
        }

        let high_risk_sectors = risk_analysis
            .iter()
            .filter(|r| matches!(risk_class(r.avg_risk_score), "high" | "critical"))
            .count();
        let average_risk_score = if risk_analysis.is_empty() {
            0.0
        } else {
            round_to(
                risk_analysis.iter().map(|r| r.avg_risk_score).sum::<f64>() / risk_analysis.len() as f64,
                2,
            )
        };
        let summary = RiskSummary {
            total_sectors: risk_analysis.len(),
            high_risk_sectors,
            average_risk_score,
            highest_risk_sector: risk_analysis.first().map(|r| r.sector.clone()),
        };

        Ok(RiskAssessmentReport {
            report_type: ReportKind::RiskAssessment.as_str(),
            generated_at: Utc::now(),
            period,
            risk_analysis,
            risk_classification,
            recommendations: RISK_RECOMMENDATIONS.into_iter().collect(),
            summary,
        })
    }

    pub async fn audit_report(&self, period: ReportPeriod) -> Result<AuditReport, QhseError> {
        let audits = self.suppliers.audits_between(period.start, period.end).await?;
        let overdue_audits = self.suppliers.overdue_audits().await?;

        let completed: Vec<&SupplierAudit> = audits.iter().filter(|a| a.status == "completed").collect();
        let scores: Vec<f64> = completed.iter().filter_map(|a| a.score).collect();
        let average_score = if scores.is_empty() {
            0.0
        } else {
            round_to(scores.iter().sum::<f64>() / scores.len() as f64, 2)
        };
        let average_compliance = if completed.is_empty() {
            0.0
        } else {
            round_to(
                completed.iter().map(|a| a.compliance_percentage).sum::<f64>() / completed.len() as f64,
                2,
            )
        };

        Ok(AuditReport {
            report_type: ReportKind::AuditReport.as_str(),
            generated_at: Utc::now(),
            period,
            total_audits: audits.len(),
            completed_audits: completed.len(),
            average_score,
            average_compliance,
            by_type: breakdown(audits.iter().map(|a| a.audit_type.as_str())),
            audits,
            overdue_audits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::Severity;
    use crate::db;
    use crate::incidents::store::{IncidentStore, NewIncident};
    use secrecy::Secret;

    async fn setup() -> (ReportGenerator, IncidentStore) {
        let pool = db::connect_in_memory().await.unwrap();
        db::seed::seed_reference_data(&pool, &Secret::new("admin123".to_string()))
            .await
            .unwrap();
        (ReportGenerator::new(pool.clone()), IncidentStore::new(pool))
    }

    fn incident(sector_id: i64, incident_type_id: i64, severity: Severity, probability: f64) -> NewIncident {
        NewIncident {
            sector_id,
            incident_type_id,
            title: "Chute dans l'atelier".to_string(),
            description: "Sol glissant".to_string(),
            severity_level: severity,
            probability_score: probability,
            location: None,
            date_incident: None,
            time_incident: None,
            status: None,
            ai_recommendations: Some("Nettoyer le sol\nSignaler la zone".to_string()),
        }
    }

    fn row(sector: &str, severity: &str, status: &str, risk: f64) -> IncidentRow {
        IncidentRow {
            sector_name: sector.to_string(),
            incident_type_name: "Coupure".to_string(),
            severity_level: severity.to_string(),
            status: status.to_string(),
            risk_score: risk,
            ai_recommendations: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_risk_class_thresholds() {
        assert_eq!(risk_class(1.99), "low");
        assert_eq!(risk_class(2.0), "medium");
        assert_eq!(risk_class(3.5), "high");
        assert_eq!(risk_class(4.0), "critical");
    }

    #[test]
    fn test_summarize_incidents() {
        let rows = vec![
            row("BTP", "critical", "open", 4.0),
            row("BTP", "high", "resolved", 3.0),
            row("Bureaux", "low", "closed", 0.5),
        ];
        let (totals, trend, top) = summarize_incidents(&rows);
        assert_eq!(totals.total_incidents, 3);
        assert_eq!(totals.critical_incidents, 1);
        assert_eq!(totals.resolved_incidents, 2);
        assert_eq!(trend.values().sum::<i64>(), 3);
        assert_eq!(top[0].sector, "BTP");
        assert_eq!(top[0].avg_risk_score, 3.5);
    }

    #[test]
    fn test_performance_recommendations_default() {
        let on_target = PerformanceVsTargets {
            incidents_vs_target: 50.0,
            resolution_vs_target: 100.0,
            critical_vs_target: 0.0,
            risk_vs_target: 80.0,
        };
        assert_eq!(performance_recommendations(&on_target).len(), 1);

        let off_target = PerformanceVsTargets {
            incidents_vs_target: 300.0,
            resolution_vs_target: 10.0,
            critical_vs_target: 400.0,
            risk_vs_target: 200.0,
        };
        assert_eq!(performance_recommendations(&off_target).len(), 4);
    }

    #[test]
    fn test_default_period() {
        let period = ReportPeriod::new(None, None).unwrap();
        assert_eq!((period.end - period.start).num_days(), 30);
        assert!(period.previous().end < period.start);
        assert_eq!(period.previous().end - period.previous().start, period.end - period.start);
        assert!(ReportPeriod::new(Some(Utc::now()), Some(Utc::now() - Duration::days(1))).is_err());
    }

    #[tokio::test]
    async fn test_incident_summary_and_risk_assessment() {
        let (generator, incidents) = setup().await;
        incidents.create(&incident(1, 2, Severity::Critical, 0.9), Some(1)).await.unwrap();
        incidents.create(&incident(1, 5, Severity::Low, 0.2), Some(1)).await.unwrap();
        incidents.create(&incident(2, 12, Severity::Medium, 0.5), None).await.unwrap();

        let period = ReportPeriod::new(None, Some(Utc::now() + Duration::minutes(1))).unwrap();
        let summary = generator.incident_summary(period).await.unwrap();
        assert_eq!(summary.statistics.total_incidents, 3);
        assert_eq!(summary.statistics.critical_incidents, 1);
        assert_eq!(summary.top_recommendations[0].count, 3);

        let risk = generator.risk_assessment(period).await.unwrap();
        assert_eq!(risk.summary.total_sectors, 2);
        assert_eq!(risk.risk_classification.len(), 4);
        assert!(risk.summary.highest_risk_sector.is_some());
    }

    #[tokio::test]
    async fn test_period_end_is_inclusive_in_every_report() {
        let (generator, incidents) = setup().await;
        let (id, _) = incidents.create(&incident(1, 2, Severity::Critical, 0.9), Some(1)).await.unwrap();
        let created_at: DateTime<Utc> = sqlx::query_scalar("SELECT created_at FROM incident_reports WHERE id = ?")
            .bind(id)
            .fetch_one(&generator.db_pool)
            .await
            .unwrap();

        let period = ReportPeriod::new(Some(created_at - Duration::days(7)), Some(created_at)).unwrap();
        let summary = generator.incident_summary(period).await.unwrap();
        let performance = generator.safety_performance(period).await.unwrap();
        assert_eq!(summary.statistics.total_incidents, 1);
        assert_eq!(performance.kpis.total_incidents, 1);
        assert_eq!(performance.kpis.critical_incidents, 1);

        // The following window starts at the incident and must not count it twice
        let next = ReportPeriod::new(Some(created_at), Some(created_at + Duration::days(7))).unwrap();
        let next_performance = generator.safety_performance(next).await.unwrap();
        assert_eq!(next_performance.kpis.total_incidents, 1);
        assert_eq!(next_performance.previous_kpis.total_incidents, 0);
    }

    #[tokio::test]
    async fn test_regulatory_compliance_from_seeded_table() {
        let (generator, _) = setup().await;
        let report = generator
            .regulatory_compliance(ReportPeriod::new(None, None).unwrap())
            .await
            .unwrap();
        assert_eq!(report.total_regulations, 4);
        assert_eq!(report.conforming_regulations, 3);
        assert_eq!(report.compliance_rate, 75.0);
        assert!(report.recommendations[0].contains("REACH"));
        assert!(report.quarter.starts_with('Q'));
    }

    #[tokio::test]
    async fn test_every_kind_generates() {
        let (generator, _) = setup().await;
        let period = ReportPeriod::new(None, None).unwrap();
        for kind in ReportKind::all() {
            let report = generator.generate(kind, period).await.unwrap();
            let value = serde_json::to_value(&report).unwrap();
            assert_eq!(value["report_type"], kind.as_str());
        }
    }
}
