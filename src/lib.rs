// Library root for the QHSE assistant

pub mod core;
pub mod state;
pub mod db;
pub mod auth;
pub mod incidents;
pub mod analysis;
pub mod ledger;
pub mod iot;
pub mod gamification;
pub mod arvr;
pub mod suppliers;
pub mod compliance;
pub mod equipment;
pub mod reports;
pub mod workflows;
pub mod training;
pub mod notifications;
pub mod admin;
pub mod api;
pub mod config;
