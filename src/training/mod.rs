// QHSE training and certification

pub mod categories;
pub mod manager;

pub use categories::{TrainingCategory, DEFAULT_SECTOR, PASSING_SCORE, TRAINING_CATEGORIES};
pub use manager::{
    Certification, CompletionOutcome, ExpiringCertification, MandatoryStatus, NewSession, NewTraining, PlanItem,
    Training, TrainingManager, TrainingPlan, TrainingReport, TrainingSession, TrainingStatistics,
};
