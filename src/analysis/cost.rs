// Incident cost estimation, trends and period reports

use crate::core::errors::QhseError;
use crate::core::models::{round_to, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::debug;

const MEDICAL_BASE: [f64; 5] = [500.0, 2_000.0, 10_000.0, 50_000.0, 200_000.0];
const EQUIPMENT_BASE: [f64; 5] = [1_000.0, 5_000.0, 25_000.0, 100_000.0, 500_000.0];
const FINES_BASE: [f64; 5] = [0.0, 1_000.0, 10_000.0, 50_000.0, 200_000.0];
const INSURANCE_BASE: [f64; 5] = [500.0, 2_000.0, 10_000.0, 50_000.0, 200_000.0];
const COST_PER_DAY_LOST: f64 = 200.0;

/// (name, investment cost, expected cost reduction)
const PREVENTIVE_INVESTMENTS: [(&str, f64, f64); 5] = [
    ("formation_securite", 5_000.0, 0.15),
    ("equipements_protection", 10_000.0, 0.25),
    ("maintenance_preventive", 15_000.0, 0.20),
    ("audit_conformite", 8_000.0, 0.10),
    ("systeme_alerte", 12_000.0, 0.30),
];

/// Incident parameters for cost estimation; absent values take typical defaults
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CostInput {
    /// 1 (minor) to 5 (critical)
    pub severity_level: Option<u8>,
    pub incident_type_id: Option<i64>,
    pub sector_id: Option<i64>,
    pub employee_count: Option<f64>,
    pub days_lost: Option<f64>,
    pub age_employee: Option<f64>,
    pub experience_years: Option<f64>,
    pub safety_training_hours: Option<f64>,
    pub previous_incidents: Option<f64>,
    pub equipment_age: Option<f64>,
    pub safety_investment: Option<f64>,
    pub compliance_score: Option<f64>,
}

/// Fully resolved parameters
#[derive(Debug, Clone, Copy)]
struct CostParams {
    severity_level: u8,
    employee_count: f64,
    days_lost: f64,
    age_employee: f64,
    experience_years: f64,
    safety_training_hours: f64,
    previous_incidents: f64,
    equipment_age: f64,
    safety_investment: f64,
    compliance_score: f64,
}

impl From<&CostInput> for CostParams {
    fn from(input: &CostInput) -> Self {
        Self {
            severity_level: input.severity_level.unwrap_or(3).clamp(1, 5),
            employee_count: input.employee_count.unwrap_or(100.0),
            days_lost: input.days_lost.unwrap_or(5.0),
            age_employee: input.age_employee.unwrap_or(35.0),
            experience_years: input.experience_years.unwrap_or(5.0),
            safety_training_hours: input.safety_training_hours.unwrap_or(20.0),
            previous_incidents: input.previous_incidents.unwrap_or(1.0),
            equipment_age: input.equipment_age.unwrap_or(5.0),
            safety_investment: input.safety_investment.unwrap_or(10_000.0),
            compliance_score: input.compliance_score.unwrap_or(80.0).clamp(0.0, 100.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct CostBreakdown {
    pub medical_costs: f64,
    pub equipment_damage: f64,
    pub regulatory_fines: f64,
    pub insurance_impact: f64,
    pub productivity_loss: f64,
}

impl CostBreakdown {
    pub fn total(&self) -> f64 {
        self.medical_costs
            + self.equipment_damage
            + self.regulatory_fines
            + self.insurance_impact
            + self.productivity_loss
    }

    fn add(&mut self, other: &CostBreakdown) {
        self.medical_costs += other.medical_costs;
        self.equipment_damage += other.equipment_damage;
        self.regulatory_fines += other.regulatory_fines;
        self.insurance_impact += other.insurance_impact;
        self.productivity_loss += other.productivity_loss;
    }

    fn rounded(&self) -> Self {
        Self {
            medical_costs: round_to(self.medical_costs, 2),
            equipment_damage: round_to(self.equipment_damage, 2),
            regulatory_fines: round_to(self.regulatory_fines, 2),
            insurance_impact: round_to(self.insurance_impact, 2),
            productivity_loss: round_to(self.productivity_loss, 2),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SensitivityPoint {
    pub value: f64,
    pub cost: f64,
    pub impact_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvestmentRoi {
    pub investment_cost: f64,
    pub estimated_savings: f64,
    pub roi_percent: f64,
    /// `None` when the investment never pays back
    pub payback_period_months: Option<f64>,
    pub recommended: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostEstimate {
    pub total_cost: f64,
    pub breakdown: CostBreakdown,
    pub confidence_level: f64,
    pub sensitivity_analysis: BTreeMap<String, Vec<SensitivityPoint>>,
    pub optimization_recommendations: Vec<String>,
    pub roi_analysis: BTreeMap<String, InvestmentRoi>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyCost {
    pub month: String,
    pub incident_count: usize,
    pub estimated_cost: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostTrends {
    pub monthly_trends: Vec<MonthlyCost>,
    pub total_estimated_cost: f64,
    pub average_monthly_cost: f64,
    pub trend_direction: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncidentCost {
    pub incident_id: i64,
    pub created_at: DateTime<Utc>,
    pub severity: String,
    pub predicted_cost: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostReportPeriod {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub days: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostReportSummary {
    pub total_incidents: usize,
    pub total_estimated_cost: f64,
    pub average_cost_per_incident: f64,
    pub cost_breakdown: CostBreakdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostReport {
    pub period: CostReportPeriod,
    pub summary: CostReportSummary,
    pub detailed_breakdown: Vec<IncidentCost>,
    pub recommendations: Vec<String>,
}

/// Map a stored incident severity onto the five-band cost scale
pub fn cost_band(severity: Severity) -> u8 {
    match severity {
        Severity::Low => 1,
        Severity::Medium => 2,
        Severity::High => 4,
        Severity::Critical => 5,
    }
}

fn breakdown(params: &CostParams) -> CostBreakdown {
    let band = (params.severity_level - 1) as usize;

    let medical = MEDICAL_BASE[band]
        * (1.0 + (params.age_employee - 30.0) * 0.01)
        * (1.0 - params.experience_years * 0.005)
        * (1.0 - params.safety_training_hours * 0.001);

    let equipment = EQUIPMENT_BASE[band]
        * (1.0 + params.equipment_age * 0.1)
        * (1.0 - params.safety_investment / 100_000.0 * 0.3);

    let fines = if params.severity_level < 2 {
        0.0
    } else {
        FINES_BASE[band]
            * (1.0 - (params.compliance_score - 60.0) / 40.0)
            * (1.0 + params.previous_incidents * 0.2)
    };

    let insurance = INSURANCE_BASE[band]
        * (1.0 + params.employee_count / 1000.0 * 0.1)
        * (1.0 + params.previous_incidents * 0.3);

    CostBreakdown {
        medical_costs: medical.max(0.0),
        equipment_damage: equipment.max(0.0),
        regulatory_fines: fines.max(0.0),
        insurance_impact: insurance.max(0.0),
        productivity_loss: (params.days_lost * COST_PER_DAY_LOST).max(0.0),
    }
}

fn optimization_recommendations(costs: &CostBreakdown, total: f64) -> Vec<String> {
    let mut recommendations = Vec::new();

    if costs.medical_costs > 50_000.0 {
        recommendations.push("Coûts médicaux élevés - Renforcer la formation aux premiers secours".to_string());
        recommendations.push("Investir dans des équipements de protection individuelle de qualité".to_string());
    }
    if costs.equipment_damage > 100_000.0 {
        recommendations.push("Dommages matériels importants - Programme de maintenance préventive".to_string());
        recommendations.push("Mise à jour des équipements obsolètes".to_string());
    }
    if costs.regulatory_fines > 20_000.0 {
        recommendations.push("Risque d'amendes élevé - Audit de conformité immédiat".to_string());
        recommendations.push("Formation réglementaire renforcée".to_string());
    }
    if costs.insurance_impact > 50_000.0 {
        recommendations.push("Impact assurance important - Négociation des primes".to_string());
        recommendations.push("Mise en place d'un programme de prévention des risques".to_string());
    }

    if total > 200_000.0 {
        recommendations.push("Incident majeur - Plan de gestion de crise".to_string());
        recommendations.push("Audit complet du système QHSE".to_string());
    } else if total > 100_000.0 {
        recommendations.push("Incident significatif - Renforcement des contrôles".to_string());
        recommendations.push("Formation ciblée sur les risques identifiés".to_string());
    }

    recommendations
}

fn roi_analysis(predicted_cost: f64) -> BTreeMap<String, InvestmentRoi> {
    PREVENTIVE_INVESTMENTS
        .iter()
        .map(|(name, cost, reduction)| {
            let savings = predicted_cost * reduction;
            let roi = (savings - cost) / cost * 100.0;
            let payback = if savings > 0.0 { Some(round_to(cost / (savings / 12.0), 1)) } else { None };
            let recommended = roi > 50.0 && payback.map(|p| p < 24.0).unwrap_or(false);
            (
                name.to_string(),
                InvestmentRoi {
                    investment_cost: *cost,
                    estimated_savings: round_to(savings, 2),
                    roi_percent: round_to(roi, 1),
                    payback_period_months: payback,
                    recommended,
                },
            )
        })
        .collect()
}

fn sensitivity(input: &CostInput, base_cost: f64) -> BTreeMap<String, Vec<SensitivityPoint>> {
    let base = CostParams::from(input);
    let mut result = BTreeMap::new();

    let mut sweep_feature = |name: &str, values: &[f64], apply: &dyn Fn(&mut CostParams, f64)| {
        let points = values
            .iter()
            .map(|value| {
                let mut params = base;
                apply(&mut params, *value);
                let cost = breakdown(&params).total();
                let impact = if base_cost > 0.0 { (cost - base_cost) / base_cost * 100.0 } else { 0.0 };
                SensitivityPoint {
                    value: *value,
                    cost: round_to(cost, 2),
                    impact_percent: round_to(impact, 2),
                }
            })
            .collect();
        result.insert(name.to_string(), points);
    };

    if input.severity_level.is_some() {
        sweep_feature("severity_level", &[1.0, 2.0, 3.0, 4.0, 5.0], &|p, v| p.severity_level = v as u8);
    }
    if input.days_lost.is_some() {
        sweep_feature("days_lost", &[0.0, 5.0, 10.0, 20.0, 30.0], &|p, v| p.days_lost = v);
    }
    if input.employee_count.is_some() {
        sweep_feature("employee_count", &[50.0, 100.0, 200.0, 500.0, 1000.0], &|p, v| p.employee_count = v);
    }
    if input.compliance_score.is_some() {
        sweep_feature("compliance_score", &[60.0, 70.0, 80.0, 90.0, 100.0], &|p, v| p.compliance_score = v);
    }

    result
}

/// Estimate the full cost picture for a single incident
pub fn estimate(input: &CostInput) -> CostEstimate {
    let params = CostParams::from(input);
    let costs = breakdown(&params);
    let total = costs.total();

    CostEstimate {
        total_cost: round_to(total, 2),
        breakdown: costs.rounded(),
        confidence_level: 0.85,
        sensitivity_analysis: sensitivity(input, total),
        optimization_recommendations: optimization_recommendations(&costs, total),
        roi_analysis: roi_analysis(total),
    }
}

fn stored_incident_cost(severity: &str) -> CostBreakdown {
    let band = severity.parse::<Severity>().map(cost_band).unwrap_or(3);
    breakdown(&CostParams::from(&CostInput {
        severity_level: Some(band),
        ..CostInput::default()
    }))
}

/// Group incidents by calendar month and price them
pub fn monthly_costs(incidents: &[(DateTime<Utc>, String)]) -> CostTrends {
    let mut months: BTreeMap<String, (usize, f64)> = BTreeMap::new();
    for (created_at, severity) in incidents {
        let entry = months.entry(created_at.format("%Y-%m").to_string()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += stored_incident_cost(severity).total();
    }

    let monthly_trends: Vec<MonthlyCost> = months
        .into_iter()
        .map(|(month, (incident_count, cost))| MonthlyCost {
            month,
            incident_count,
            estimated_cost: round_to(cost, 2),
        })
        .collect();

    let total: f64 = monthly_trends.iter().map(|m| m.estimated_cost).sum();
    let average = if monthly_trends.is_empty() { 0.0 } else { total / monthly_trends.len() as f64 };
    let trend_direction = match (monthly_trends.first(), monthly_trends.last()) {
        (Some(first), Some(last)) if monthly_trends.len() > 1 && last.estimated_cost > first.estimated_cost => "increasing",
        _ => "stable",
    };

    CostTrends {
        monthly_trends,
        total_estimated_cost: round_to(total, 2),
        average_monthly_cost: round_to(average, 2),
        trend_direction,
    }
}

/// Cost analytics over the incident history
#[derive(Clone)]
pub struct CostModel {
    db_pool: SqlitePool,
}

impl CostModel {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn trends(&self, days: i64) -> Result<CostTrends, QhseError> {
        let since = Utc::now() - chrono::Duration::days(days.max(1));
        let incidents = sqlx::query_as::<_, (DateTime<Utc>, String)>(
            "SELECT created_at, severity_level FROM incident_reports WHERE created_at >= ? ORDER BY created_at",
        )
        .bind(since)
        .fetch_all(&self.db_pool)
        .await?;

        debug!(incidents = incidents.len(), days, "Computing cost trends");
        Ok(monthly_costs(&incidents))
    }

    /// Price every incident created in `[start, end]`
    pub async fn report(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<CostReport, QhseError> {
        if end < start {
            return Err(QhseError::Validation("end must not precede start".to_string()));
        }

        let incidents = sqlx::query_as::<_, (i64, DateTime<Utc>, String)>(
            "SELECT id, created_at, severity_level FROM incident_reports
             WHERE created_at >= ? AND created_at <= ? ORDER BY created_at",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.db_pool)
        .await?;

        if incidents.is_empty() {
            return Err(QhseError::NotFound("Incidents in period".to_string()));
        }

        let mut totals = CostBreakdown::default();
        let detailed_breakdown: Vec<IncidentCost> = incidents
            .iter()
            .map(|(id, created_at, severity)| {
                let costs = stored_incident_cost(severity);
                totals.add(&costs);
                IncidentCost {
                    incident_id: *id,
                    created_at: *created_at,
                    severity: severity.clone(),
                    predicted_cost: round_to(costs.total(), 2),
                }
            })
            .collect();

        let total = totals.total();
        Ok(CostReport {
            period: CostReportPeriod {
                start_date: start,
                end_date: end,
                days: (end - start).num_days(),
            },
            summary: CostReportSummary {
                total_incidents: incidents.len(),
                total_estimated_cost: round_to(total, 2),
                average_cost_per_incident: round_to(total / incidents.len() as f64, 2),
                cost_breakdown: totals.rounded(),
            },
            detailed_breakdown,
            recommendations: optimization_recommendations(&totals, total),
        })
    }
}
