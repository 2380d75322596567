// Points, badges, leaderboards and challenges

pub mod badges;
pub mod engine;

pub use badges::{Badge, Requirement, BADGES};
pub use engine::{
    Challenge, GamificationEngine, LeaderboardCategory, LeaderboardEntry, NewChallenge, PointsAward,
    Profile, UserStats,
};
