// Report catalog

use crate::core::errors::QhseError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    IncidentSummary,
    RegulatoryCompliance,
    SafetyPerformance,
    TrainingCompliance,
    RiskAssessment,
    AuditReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportDescriptor {
    pub id: ReportKind,
    pub name: &'static str,
    pub description: &'static str,
    pub frequency: &'static str,
    pub regulatory: bool,
}

impl ReportKind {
    pub fn all() -> [ReportKind; 6] {
        [
            ReportKind::IncidentSummary,
            ReportKind::RegulatoryCompliance,
            ReportKind::SafetyPerformance,
            ReportKind::TrainingCompliance,
            ReportKind::RiskAssessment,
            ReportKind::AuditReport,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::IncidentSummary => "incident_summary",
            ReportKind::RegulatoryCompliance => "regulatory_compliance",
            ReportKind::SafetyPerformance => "safety_performance",
            ReportKind::TrainingCompliance => "training_compliance",
            ReportKind::RiskAssessment => "risk_assessment",
            ReportKind::AuditReport => "audit_report",
        }
    }

    pub fn descriptor(&self) -> ReportDescriptor {
        let (name, description, frequency, regulatory) = match self {
            ReportKind::IncidentSummary => (
                "Rapport de Synthèse des Incidents QHSE",
                "Vue d'ensemble des incidents et tendances",
                "monthly",
                false,
            ),
            ReportKind::RegulatoryCompliance => (
                "Rapport de Conformité Réglementaire",
                "État de conformité aux réglementations QHSE",
                "quarterly",
                true,
            ),
            ReportKind::SafetyPerformance => (
                "Rapport de Performance Sécurité",
                "Indicateurs de performance et KPIs",
                "monthly",
                false,
            ),
            ReportKind::TrainingCompliance => (
                "Rapport de Conformité Formation",
                "État des formations et certifications",
                "monthly",
                true,
            ),
            ReportKind::RiskAssessment => (
                "Rapport d'Évaluation des Risques",
                "Analyse des risques et recommandations",
                "quarterly",
                false,
            ),
            ReportKind::AuditReport => (
                "Rapport d'Audit QHSE",
                "Résultats des audits internes et externes",
                "annual",
                true,
            ),
        };
        ReportDescriptor {
            id: *self,
            name,
            description,
            frequency,
            regulatory,
        }
    }
}

impl FromStr for ReportKind {
    type Err = QhseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportKind::all()
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| QhseError::Validation(format!("Unknown report type '{}'", s)))
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn catalog() -> Vec<ReportDescriptor> {
    ReportKind::all().iter().map(ReportKind::descriptor).collect()
}
