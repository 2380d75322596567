// Shared domain models

use crate::core::errors::QhseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User role, stored as its snake_case name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    QhseManager,
    TrainingManager,
    Employee,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::QhseManager => "qhse_manager",
            Role::TrainingManager => "training_manager",
            Role::Employee => "employee",
            Role::User => "user",
        }
    }

    pub fn all() -> [Role; 6] {
        [
            Role::Admin,
            Role::Manager,
            Role::QhseManager,
            Role::TrainingManager,
            Role::Employee,
            Role::User,
        ]
    }
}

impl FromStr for Role {
    type Err = QhseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::all()
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| QhseError::Validation(format!("Unknown role '{}'", s)))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated user attached to the request by the session middleware
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }

    /// Fail with 403 unless the user holds one of `roles`
    pub fn require_any_role(&self, roles: &[Role]) -> Result<(), QhseError> {
        if self.has_any_role(roles) {
            Ok(())
        } else {
            Err(QhseError::Forbidden("Insufficient permissions".to_string()))
        }
    }
}

/// Incident severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn all() -> [Severity; 4] {
        [Severity::Low, Severity::Medium, Severity::High, Severity::Critical]
    }

    /// Numeric level used by cost models (1 = low .. 4 = critical)
    pub fn level(&self) -> u8 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }

    pub fn is_severe(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }
}

impl FromStr for Severity {
    type Err = QhseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::all()
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| QhseError::Validation(format!("Unknown severity level '{}'", s)))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Round to `digits` decimal places
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}
