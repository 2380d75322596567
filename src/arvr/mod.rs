// Immersive training scenes and sessions

pub mod scenes;
pub mod sessions;

pub use scenes::{DeviceType, SceneType};
pub use sessions::{ArvrManager, EndedSession, NewInteraction, Position, Scene, SceneStatistics, SessionSummary, TrainingReport};
