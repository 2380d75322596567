// Notification rules and their delivery channels

use crate::core::errors::QhseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const CHANNELS: [&str; 4] = ["email", "sms", "slack", "in_app"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationRule {
    CriticalIncident,
    HighRisk,
    RegulatoryDeadline,
    TrainingExpiry,
    EquipmentInspection,
}

impl NotificationRule {
    pub fn all() -> [NotificationRule; 5] {
        [
            NotificationRule::CriticalIncident,
            NotificationRule::HighRisk,
            NotificationRule::RegulatoryDeadline,
            NotificationRule::TrainingExpiry,
            NotificationRule::EquipmentInspection,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationRule::CriticalIncident => "critical_incident",
            NotificationRule::HighRisk => "high_risk",
            NotificationRule::RegulatoryDeadline => "regulatory_deadline",
            NotificationRule::TrainingExpiry => "training_expiry",
            NotificationRule::EquipmentInspection => "equipment_inspection",
        }
    }

    pub fn channels(&self) -> &'static [&'static str] {
        match self {
            NotificationRule::CriticalIncident => &["email", "sms", "slack"],
            NotificationRule::HighRisk => &["email", "slack"],
            _ => &["email"],
        }
    }

    /// Immediate rules are sent as incidents happen; others come from the sweep
    pub fn immediate(&self) -> bool {
        matches!(self, NotificationRule::CriticalIncident | NotificationRule::HighRisk)
    }

    pub fn priority(&self) -> &'static str {
        match self {
            NotificationRule::CriticalIncident => "critical",
            NotificationRule::HighRisk => "high",
            NotificationRule::RegulatoryDeadline => "medium",
            NotificationRule::TrainingExpiry | NotificationRule::EquipmentInspection => "low",
        }
    }
}

impl FromStr for NotificationRule {
    type Err = QhseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationRule::all()
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| QhseError::Validation(format!("Unknown notification type '{}'", s)))
    }
}

impl fmt::Display for NotificationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_channels() {
        assert_eq!(NotificationRule::CriticalIncident.channels(), &["email", "sms", "slack"]);
        assert_eq!(NotificationRule::HighRisk.channels(), &["email", "slack"]);
        assert_eq!(NotificationRule::TrainingExpiry.channels(), &["email"]);
        for rule in NotificationRule::all() {
            assert!(rule.channels().iter().all(|c| CHANNELS.contains(c)));
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!("high_risk".parse::<NotificationRule>().unwrap(), NotificationRule::HighRisk);
        assert!("carrier_pigeon".parse::<NotificationRule>().is_err());
    }
}
