// Workflow templates and escalation levels

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StepTemplate {
    pub name: &'static str,
    pub role: &'static str,
    pub duration_hours: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowTemplate {
    pub template_id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub steps: &'static [StepTemplate],
    pub escalation_triggers: &'static [&'static str],
}

const fn step(name: &'static str, role: &'static str, duration_hours: i64) -> StepTemplate {
    StepTemplate { name, role, duration_hours }
}

pub static WORKFLOW_TEMPLATES: [WorkflowTemplate; 5] = [
    WorkflowTemplate {
        template_id: "incident_investigation",
        name: "Investigation d'Incident",
        description: "Processus d'investigation et de résolution d'incident",
        steps: &[
            step("Signalement", "employee", 1),
            step("Validation", "supervisor", 4),
            step("Investigation", "qhse_manager", 24),
            step("Analyse", "qhse_manager", 48),
            step("Plan d'action", "qhse_manager", 72),
            step("Approbation", "site_manager", 24),
            step("Mise en œuvre", "responsible", 168),
            step("Vérification", "qhse_manager", 24),
        ],
        escalation_triggers: &["overdue", "rejection", "critical_severity"],
    },
    WorkflowTemplate {
        template_id: "corrective_action",
        name: "Action Corrective",
        description: "Processus de mise en œuvre d'action corrective",
        steps: &[
            step("Identification", "qhse_manager", 2),
            step("Planification", "qhse_manager", 24),
            step("Approbation", "site_manager", 48),
            step("Exécution", "responsible", 168),
            step("Vérification", "qhse_manager", 24),
            step("Clôture", "qhse_manager", 2),
        ],
        escalation_triggers: &["overdue", "rejection"],
    },
    WorkflowTemplate {
        template_id: "training_request",
        name: "Demande de Formation",
        description: "Processus d'approbation de demande de formation",
        steps: &[
            step("Demande", "employee", 1),
            step("Validation", "supervisor", 24),
            step("Approbation", "hr_manager", 48),
            step("Planification", "training_manager", 72),
            step("Exécution", "instructor", 8),
            step("Validation", "instructor", 1),
        ],
        escalation_triggers: &["overdue"],
    },
    WorkflowTemplate {
        template_id: "equipment_inspection",
        name: "Inspection d'Équipement",
        description: "Processus d'inspection et de maintenance préventive",
        steps: &[
            step("Planification", "maintenance_manager", 24),
            step("Préparation", "maintenance_team", 4),
            step("Inspection", "inspector", 8),
            step("Rapport", "inspector", 4),
            step("Validation", "maintenance_manager", 24),
            step("Actions", "maintenance_team", 48),
        ],
        escalation_triggers: &["overdue", "critical_finding"],
    },
    WorkflowTemplate {
        template_id: "regulatory_compliance",
        name: "Conformité Réglementaire",
        description: "Processus de mise en conformité réglementaire",
        steps: &[
            step("Audit", "compliance_auditor", 40),
            step("Analyse", "compliance_manager", 24),
            step("Plan d'action", "compliance_manager", 48),
            step("Approbation", "legal_manager", 72),
            step("Mise en œuvre", "responsible", 720),
            step("Vérification", "compliance_auditor", 24),
            step("Validation", "compliance_manager", 24),
        ],
        escalation_triggers: &["overdue", "regulatory_deadline"],
    },
];

/// Overdue escalation levels, most severe last
pub const ESCALATION_LEVELS: [(f64, &str); 3] = [(24.0, "supervisor"), (72.0, "manager"), (168.0, "director")];

pub const PRIORITIES: [&str; 5] = ["low", "medium", "high", "urgent", "critical"];

pub fn find(template_id: &str) -> Option<&'static WorkflowTemplate> {
    WORKFLOW_TEMPLATES.iter().find(|t| t.template_id == template_id)
}

/// Highest escalation level reached after `delay_hours` past the due date
pub fn escalation_level(delay_hours: f64) -> Option<&'static str> {
    ESCALATION_LEVELS
        .iter()
        .rev()
        .find(|(threshold, _)| delay_hours >= *threshold)
        .map(|(_, level)| *level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalation_levels() {
        assert_eq!(escalation_level(3.0), None);
        assert_eq!(escalation_level(24.0), Some("supervisor"));
        assert_eq!(escalation_level(100.0), Some("manager"));
        assert_eq!(escalation_level(500.0), Some("director"));
    }

    #[test]
    fn test_templates() {
        assert_eq!(WORKFLOW_TEMPLATES.len(), 5);
        assert_eq!(find("corrective_action").map(|t| t.steps.len()), Some(6));
        assert!(find("unknown").is_none());
    }
}
