// Incident reporting: storage, risk prediction and the safety chatbot

pub mod chatbot;
pub mod predictor;
pub mod store;

pub use chatbot::{reply, ChatReply};
pub use predictor::{predict_risk, RiskPrediction, RiskPredictionInput};
pub use store::{
    CorrectiveAction, DashboardSummary, IncidentFilter, IncidentStatistics, IncidentStore,
    IncidentType, IncidentView, NewCorrectiveAction, NewIncident, Sector,
};

/// Statuses an incident may move through
pub const INCIDENT_STATUSES: [&str; 4] = ["open", "in_progress", "resolved", "closed"];
