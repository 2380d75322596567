// Core domain types, errors and shared utilities

pub mod crypto;
pub mod errors;
pub mod models;
pub mod resilience;
