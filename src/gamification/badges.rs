// Built-in badge catalog

use serde::Serialize;

/// Measurable condition a badge depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    /// No incident reported by the user for N days, with a profile at least that old
    DaysWithoutIncident,
    CompletedTrainings,
    /// Low-severity reports, counted as proactive risk reporting
    RiskReports,
    TeamChallenges,
    ImprovementSuggestions,
    TrainedEmployees,
    /// Not tracked; never satisfied
    CompliancePercentage,
}

#[derive(Debug, Clone, Serialize)]
pub struct Badge {
    pub badge_id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub points: i64,
    pub category: &'static str,
    pub rarity: &'static str,
    pub requirements: &'static [(Requirement, i64)],
}

pub static BADGES: [Badge; 7] = [
    Badge {
        badge_id: "safety_champion_1",
        name: "Champion de Sécurité",
        description: "Aucun incident pendant 30 jours consécutifs",
        icon: "🛡️",
        points: 100,
        category: "safety",
        rarity: "rare",
        requirements: &[(Requirement::DaysWithoutIncident, 30)],
    },
    Badge {
        badge_id: "training_master_1",
        name: "Maître de la Formation",
        description: "Compléter 10 formations QHSE",
        icon: "🎓",
        points: 75,
        category: "training",
        rarity: "common",
        requirements: &[(Requirement::CompletedTrainings, 10)],
    },
    Badge {
        badge_id: "risk_detective_1",
        name: "Détective des Risques",
        description: "Signaler 5 risques potentiels",
        icon: "🔍",
        points: 50,
        category: "prevention",
        rarity: "common",
        requirements: &[(Requirement::RiskReports, 5)],
    },
    Badge {
        badge_id: "team_player_1",
        name: "Joueur d'Équipe",
        description: "Participer à 5 challenges d'équipe",
        icon: "👥",
        points: 60,
        category: "teamwork",
        rarity: "common",
        requirements: &[(Requirement::TeamChallenges, 5)],
    },
    Badge {
        badge_id: "innovator_1",
        name: "Innovateur",
        description: "Proposer 3 améliorations QHSE",
        icon: "💡",
        points: 80,
        category: "innovation",
        rarity: "rare",
        requirements: &[(Requirement::ImprovementSuggestions, 3)],
    },
    Badge {
        badge_id: "mentor_1",
        name: "Mentor",
        description: "Former 5 nouveaux employés",
        icon: "👨‍🏫",
        points: 90,
        category: "leadership",
        rarity: "epic",
        requirements: &[(Requirement::TrainedEmployees, 5)],
    },
    Badge {
        badge_id: "perfectionist_1",
        name: "Perfectionniste",
        description: "100% de conformité pendant 6 mois",
        icon: "⭐",
        points: 150,
        category: "excellence",
        rarity: "legendary",
        requirements: &[(Requirement::CompliancePercentage, 100)],
    },
];

pub fn find(badge_id: &str) -> Option<&'static Badge> {
    BADGES.iter().find(|b| b.badge_id == badge_id)
}

pub fn by_category(category: Option<&str>) -> Vec<&'static Badge> {
    BADGES
        .iter()
        .filter(|b| category.map(|c| b.category == c).unwrap_or(true))
        .collect()
}
