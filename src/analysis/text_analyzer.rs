// Incident text analysis: keyword model and LLM fallback wrapper

use crate::api::TextAnalyzer;
use crate::core::errors::QhseError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Structured analysis of a free-text incident description
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextAnalysis {
    /// 1 (negligible) to 5 (critical)
    pub risk_level: u8,
    pub recommendations: Vec<String>,
    pub corrective_actions: Vec<String>,
    pub compliance_notes: Vec<String>,
    pub estimated_cost: f64,
    /// "llm", "keyword" or "fallback"
    #[serde(default)]
    pub source: String,
}

/// (keyword, weight, category)
const KEYWORDS: [(&str, u8, &str); 18] = [
    ("décès", 5, "severe"),
    ("mort", 5, "severe"),
    ("explosion", 5, "fire"),
    ("incendie", 4, "fire"),
    ("feu", 4, "fire"),
    ("électri", 4, "electrical"),
    ("hauteur", 4, "fall"),
    ("chute", 3, "fall"),
    ("blessé", 3, "injury"),
    ("blessure", 3, "injury"),
    ("chimique", 3, "chemical"),
    ("toxique", 4, "chemical"),
    ("fuite", 3, "chemical"),
    ("glissade", 2, "fall"),
    ("coupure", 2, "injury"),
    ("bruit", 1, "ergonomic"),
    ("fatigue", 1, "ergonomic"),
    ("stress", 1, "ergonomic"),
];

/// Estimated cost per risk level, in euros
const COST_BY_LEVEL: [f64; 5] = [500.0, 2_000.0, 10_000.0, 50_000.0, 200_000.0];

fn category_recommendation(category: &str) -> &'static str {
    match category {
        "severe" => "Déclencher la cellule de crise et informer l'inspection du travail",
        "fire" => "Vérifier les moyens d'extinction et le plan d'évacuation",
        "electrical" => "Consigner l'installation et faire intervenir une personne habilitée",
        "fall" => "Contrôler les protections collectives et le port du harnais",
        "injury" => "Renforcer le port des EPI adaptés au poste",
        "chemical" => "Consulter la FDS et contrôler la ventilation du local",
        _ => "Évaluer la charge de travail et l'ergonomie du poste",
    }
}

fn corrective_actions(level: u8) -> Vec<String> {
    let actions: &[&str] = match level {
        5 => &[
            "Arrêt immédiat de l'activité concernée",
            "Enquête accident avec arbre des causes",
            "Mise à jour du document unique",
        ],
        4 => &[
            "Sécurisation de la zone sous 24h",
            "Analyse des causes et plan d'action",
        ],
        3 => &["Analyse des causes sous 7 jours", "Sensibilisation de l'équipe"],
        _ => &["Suivi lors de la prochaine inspection"],
    };
    actions.iter().map(|s| s.to_string()).collect()
}

fn compliance_notes(categories: &[&str], sector: Option<&str>) -> Vec<String> {
    let mut notes = vec!["ISO 45001 : enregistrer l'événement et son analyse".to_string()];
    if categories.contains(&"chemical") {
        notes.push("REACH : vérifier l'enregistrement des substances impliquées".to_string());
    }
    if categories.contains(&"severe") {
        notes.push("Code du travail : déclaration d'accident sous 48h".to_string());
    }
    if let Some(sector) = sector.filter(|s| !s.is_empty()) {
        notes.push(format!("Vérifier les exigences spécifiques au secteur {}", sector));
    }
    notes
}

/// Deterministic keyword-weighted analyzer
#[derive(Debug, Default, Clone)]
pub struct KeywordTextAnalyzer;

impl KeywordTextAnalyzer {
    pub fn analyze_text(&self, text: &str, sector: Option<&str>) -> TextAnalysis {
        let lowered = text.to_lowercase();
        let matched: Vec<(u8, &str)> = KEYWORDS
            .iter()
            .filter(|(keyword, _, _)| lowered.contains(keyword))
            .map(|(_, weight, category)| (*weight, *category))
            .collect();

        let max_weight = matched.iter().map(|(w, _)| *w).max().unwrap_or(1);
        let bonus = if matched.len() >= 3 { 1 } else { 0 };
        let risk_level = (max_weight + bonus).clamp(1, 5);

        let mut categories: Vec<&str> = Vec::new();
        for (_, category) in &matched {
            if !categories.contains(category) {
                categories.push(category);
            }
        }

        let mut recommendations: Vec<String> = categories
            .iter()
            .map(|c| category_recommendation(c).to_string())
            .collect();
        if recommendations.is_empty() {
            recommendations.push("Documenter l'événement et surveiller sa récurrence".to_string());
        }

        TextAnalysis {
            risk_level,
            recommendations,
            corrective_actions: corrective_actions(risk_level),
            compliance_notes: compliance_notes(&categories, sector),
            estimated_cost: COST_BY_LEVEL[(risk_level - 1) as usize],
            source: "keyword".to_string(),
        }
    }
}

#[async_trait]
impl TextAnalyzer for KeywordTextAnalyzer {
    async fn analyze(&self, text: &str, sector: Option<&str>) -> Result<TextAnalysis, QhseError> {
        Ok(self.analyze_text(text, sector))
    }
}

/// Tries the primary analyzer and answers with the keyword model when it fails
pub struct ResilientTextAnalyzer {
    primary: Option<Arc<dyn TextAnalyzer + Send + Sync>>,
    fallback: KeywordTextAnalyzer,
}

impl ResilientTextAnalyzer {
    pub fn new(primary: Option<Arc<dyn TextAnalyzer + Send + Sync>>) -> Self {
        Self {
            primary,
            fallback: KeywordTextAnalyzer,
        }
    }
}

#[async_trait]
impl TextAnalyzer for ResilientTextAnalyzer {
    async fn analyze(&self, text: &str, sector: Option<&str>) -> Result<TextAnalysis, QhseError> {
        let Some(primary) = &self.primary else {
            return Ok(self.fallback.analyze_text(text, sector));
        };

        match primary.analyze(text, sector).await {
            Ok(analysis) => Ok(analysis),
            Err(e) => {
                warn!(error = %e, "Text analysis service failed, using keyword model");
                let mut analysis = self.fallback.analyze_text(text, sector);
                analysis.source = "fallback".to_string();
                Ok(analysis)
            }
        }
    }
}
