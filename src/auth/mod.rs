// Authentication: passwords, sessions and the request middleware

pub mod audit_logger;
pub mod auth_middleware;
pub mod password;
pub mod session;
pub mod user_store;
