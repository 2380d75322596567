// Built-in training categories

use serde::Serialize;

/// Minimum score for a training to count as passed
pub const PASSING_SCORE: f64 = 70.0;

/// Sector used when a plan is requested without one
pub const DEFAULT_SECTOR: &str = "Bureaux";

#[derive(Debug, Clone, Serialize)]
pub struct TrainingCategory {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mandatory: bool,
    pub validity_months: i64,
    /// `"all"` applies to every sector
    pub sectors: &'static [&'static str],
}

impl TrainingCategory {
    pub fn applies_to(&self, sector: &str) -> bool {
        self.sectors.iter().any(|s| *s == "all" || *s == sector)
    }
}

pub static TRAINING_CATEGORIES: [TrainingCategory; 8] = [
    TrainingCategory {
        key: "safety_general",
        name: "Sécurité Générale",
        description: "Formations de base en sécurité au travail",
        mandatory: true,
        validity_months: 24,
        sectors: &["all"],
    },
    TrainingCategory {
        key: "epi",
        name: "Équipements de Protection Individuelle",
        description: "Formation sur l'utilisation des EPI",
        mandatory: true,
        validity_months: 12,
        sectors: &["Industrie", "BTP", "Agroalimentaire"],
    },
    TrainingCategory {
        key: "fire_safety",
        name: "Sécurité Incendie",
        description: "Formation à la prévention et lutte contre l'incendie",
        mandatory: true,
        validity_months: 12,
        sectors: &["all"],
    },
    TrainingCategory {
        key: "chemical_safety",
        name: "Sécurité Chimique",
        description: "Formation à la manipulation des produits chimiques",
        mandatory: false,
        validity_months: 24,
        sectors: &["Industrie", "Agroalimentaire", "Santé"],
    },
    TrainingCategory {
        key: "height_work",
        name: "Travail en Hauteur",
        description: "Formation aux travaux en hauteur et antichute",
        mandatory: false,
        validity_months: 36,
        sectors: &["BTP", "Industrie"],
    },
    TrainingCategory {
        key: "electrical_safety",
        name: "Sécurité Électrique",
        description: "Formation aux risques électriques",
        mandatory: false,
        validity_months: 24,
        sectors: &["Industrie", "BTP"],
    },
    TrainingCategory {
        key: "ergonomics",
        name: "Ergonomie",
        description: "Formation à la prévention des TMS",
        mandatory: false,
        validity_months: 24,
        sectors: &["all"],
    },
    TrainingCategory {
        key: "environmental",
        name: "Environnement",
        description: "Formation à la protection de l'environnement",
        mandatory: false,
        validity_months: 36,
        sectors: &["Industrie", "Agroalimentaire"],
    },
];

pub fn find(key: &str) -> Option<&'static TrainingCategory> {
    TRAINING_CATEGORIES.iter().find(|c| c.key == key)
}

pub fn mandatory_for(sector: &str) -> impl Iterator<Item = &'static TrainingCategory> + '_ {
    TRAINING_CATEGORIES
        .iter()
        .filter(move |c| c.mandatory && c.applies_to(sector))
}
