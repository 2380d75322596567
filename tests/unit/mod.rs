// Unit tests organized by module

#[path = "../common/mod.rs"]
mod common;

pub mod analysis;
pub mod api;
pub mod state;
