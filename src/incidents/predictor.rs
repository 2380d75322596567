// Deterministic risk prediction model

use crate::core::models::{round_to, Severity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RiskPredictionInput {
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub incident_type: Option<String>,
    #[serde(default)]
    pub probability_score: Option<f64>,
    #[serde(default)]
    pub time_incident: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskPrediction {
    pub prediction: Severity,
    pub confidence: f64,
    pub recommendations: Vec<String>,
}

/// Encoded feature vector: sector code, incident type code, probability, hour
#[derive(Debug, Clone, Copy, PartialEq)]
struct Features {
    sector: u8,
    incident_type: u8,
    probability: f64,
    hour: u32,
}

fn sector_code(sector: Option<&str>) -> u8 {
    match sector.unwrap_or("Bureaux") {
        "Industrie" => 1,
        "BTP" => 2,
        "Agroalimentaire" => 3,
        "Transport" => 4,
        "Santé" => 5,
        "Commerce" => 6,
        _ => 7,
    }
}

/// Incident types are matched by name prefix so "Chute de hauteur" encodes as a fall
fn incident_type_code(incident_type: Option<&str>) -> u8 {
    let name = incident_type.unwrap_or("Autre");
    [
        ("Chute", 1),
        ("Incendie", 2),
        ("Électrocution", 3),
        ("Coupure", 4),
        ("TMS", 5),
        ("Inhalation", 6),
    ]
    .iter()
    .find(|(prefix, _)| name.starts_with(prefix))
    .map(|(_, code)| *code)
    .unwrap_or(7)
}

fn hour_of(time_incident: Option<&str>) -> u32 {
    time_incident
        .and_then(|t| t.split(':').next())
        .and_then(|h| h.trim().parse::<u32>().ok())
        .filter(|h| *h < 24)
        .unwrap_or(12)
}

fn encode(input: &RiskPredictionInput) -> Features {
    Features {
        sector: sector_code(input.sector.as_deref()),
        incident_type: incident_type_code(input.incident_type.as_deref()),
        probability: input.probability_score.unwrap_or(0.5).clamp(0.0, 1.0),
        hour: hour_of(input.time_incident.as_deref()),
    }
}

fn score(features: &Features) -> f64 {
    let sector_factor = match features.sector {
        1 | 2 => 1.0,
        3..=5 => 0.5,
        _ => 0.0,
    };
    let type_factor = match features.incident_type {
        1 => 1.0,
        2 => 1.5,
        3 | 6 => 1.2,
        4 => 0.4,
        5 => 0.6,
        _ => 0.0,
    };
    let off_hours = if (8..18).contains(&features.hour) { 0.0 } else { 0.5 };

    features.probability * 5.0 + sector_factor + type_factor + off_hours
}

fn classify(score: f64) -> Severity {
    if score >= 5.5 {
        Severity::Critical
    } else if score >= 4.0 {
        Severity::High
    } else if score >= 2.5 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn recommendations(prediction: Severity) -> Vec<String> {
    let items: &[&str] = match prediction {
        Severity::High | Severity::Critical => &[
            "Formation urgente requise pour l'équipe",
            "Inspection immédiate de l'équipement",
            "Mise en place d'EPI supplémentaires",
            "Révision des procédures de sécurité",
        ],
        Severity::Medium => &[
            "Formation préventive recommandée",
            "Vérification périodique de l'équipement",
            "Sensibilisation des employés",
        ],
        Severity::Low => &[
            "Maintien des procédures actuelles",
            "Surveillance continue recommandée",
        ],
    };
    items.iter().map(|s| s.to_string()).collect()
}

/// Predict the severity of a prospective incident
///
/// Confidence grows with how far the probability sits from 0.5, capped at 0.95.
pub fn predict_risk(input: &RiskPredictionInput) -> RiskPrediction {
    let features = encode(input);
    let prediction = classify(score(&features));
    let confidence = round_to((0.70 + 0.25 * (features.probability - 0.5).abs() * 2.0).min(0.95), 2);

    RiskPrediction {
        prediction,
        confidence,
        recommendations: recommendations(prediction),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(sector: &str, incident_type: &str, probability: f64, time: &str) -> RiskPredictionInput {
        RiskPredictionInput {
            sector: Some(sector.to_string()),
            incident_type: Some(incident_type.to_string()),
            probability_score: Some(probability),
            time_incident: Some(time.to_string()),
        }
    }

    #[test]
    fn test_defaults() {
        let features = encode(&RiskPredictionInput::default());
        assert_eq!(
            features,
            Features { sector: 7, incident_type: 7, probability: 0.5, hour: 12 }
        );
        let prediction = predict_risk(&RiskPredictionInput::default());
        assert_eq!(prediction.prediction, Severity::Medium);
        assert_eq!(prediction.confidence, 0.7);
        assert_eq!(prediction.recommendations.len(), 3);
    }

    #[test]
    fn test_high_risk_construction_fall() {
        let prediction = predict_risk(&input("BTP", "Chute de hauteur", 0.9, "22:15"));
        assert_eq!(prediction.prediction, Severity::Critical);
        assert_eq!(prediction.recommendations.len(), 4);
        assert_eq!(prediction.confidence, 0.9);
    }

    #[test]
    fn test_low_risk_office_cut() {
        let prediction = predict_risk(&input("Bureaux", "Coupure", 0.1, "10:00"));
        assert_eq!(prediction.prediction, Severity::Low);
        assert_eq!(prediction.recommendations.len(), 2);
    }

    #[test]
    fn test_malformed_time_falls_back_to_noon() {
        assert_eq!(hour_of(Some("abc")), 12);
        assert_eq!(hour_of(Some("31:00")), 12);
        assert_eq!(hour_of(Some("07:45")), 7);
    }

    #[test]
    fn test_confidence_is_capped() {
        let prediction = predict_risk(&input("Industrie", "Incendie", 1.0, "09:00"));
        assert!(prediction.confidence <= 0.95);
    }
}
