// Security event logging

use crate::core::errors::QhseError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use tracing::{info, warn};

/// Most entries returned by one log query
pub const MAX_LOG_ENTRIES: i64 = 500;

/// Authentication event type
#[derive(Debug, Clone)]
pub enum AuthEvent {
    LoginSuccess,
    LoginFailure { reason: String },
    SessionRejected { reason: String },
    Logout,
}

impl AuthEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AuthEvent::LoginSuccess => "LOGIN_SUCCESS",
            AuthEvent::LoginFailure { .. } => "LOGIN_FAILURE",
            AuthEvent::SessionRejected { .. } => "SESSION_REJECTED",
            AuthEvent::Logout => "LOGOUT",
        }
    }

    fn reason(&self) -> Option<&str> {
        match self {
            AuthEvent::LoginFailure { reason } | AuthEvent::SessionRejected { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Stored security event; rejections and failures are `WARNING`, the rest `INFO`
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuditLogEntry {
    pub id: i64,
    pub level: String,
    pub event_type: String,
    pub username: Option<String>,
    pub reason: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Audit logger for security events
pub struct AuditLogger {
    db_pool: Option<SqlitePool>,
}

impl AuditLogger {
    /// Create a new audit logger
    ///
    /// If `db_pool` is `None`, only structured logging is used.
    pub fn new(db_pool: Option<SqlitePool>) -> Self {
        Self { db_pool }
    }

    /// Log an authentication event
    ///
    /// Fire-and-forget: persistence runs in a spawned task and never fails the request.
    pub fn log_auth_event(
        &self,
        event: AuthEvent,
        username: Option<&str>,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) {
        let db_pool = self.db_pool.clone();
        let username = username.map(|s| s.to_string());
        let ip = ip_address.map(|s| s.to_string());
        let ua = user_agent.map(|s| s.to_string());

        tokio::spawn(async move {
            match event {
                AuthEvent::LoginSuccess | AuthEvent::Logout => {
                    info!(
                        event = event.event_type(),
                        username = ?username,
                        ip_address = ?ip,
                        user_agent = ?ua,
                        "Authentication event"
                    );
                }
                AuthEvent::LoginFailure { ref reason } | AuthEvent::SessionRejected { ref reason } => {
                    warn!(
                        event = event.event_type(),
                        username = ?username,
                        ip_address = ?ip,
                        user_agent = ?ua,
                        reason = %reason,
                        "Authentication failed"
                    );
                }
            }

            if let Some(pool) = db_pool {
                if let Err(e) = sqlx::query(
                    "INSERT INTO auth_audit_log (username, event_type, reason, ip_address, user_agent, created_at)
                     VALUES (?, ?, ?, ?, ?, ?)"
                )
                .bind(&username)
                .bind(event.event_type())
                .bind(event.reason())
                .bind(&ip)
                .bind(&ua)
                .bind(Utc::now())
                .execute(&pool)
                .await
                {
                    warn!(error = %e, "Failed to write audit log to database");
                }
            }
        });
    }
}

impl AuditLogger {
    /// Newest persisted events first, optionally limited to one event type
    ///
    /// Always empty without a database.
    pub async fn recent_events(&self, limit: i64, event_type: Option<&str>) -> Result<Vec<AuditLogEntry>, QhseError> {
        let Some(pool) = &self.db_pool else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query_as::<_, AuditLogEntry>(
            "SELECT id,
                    CASE WHEN event_type IN ('LOGIN_FAILURE', 'SESSION_REJECTED') THEN 'WARNING' ELSE 'INFO' END AS level,
                    event_type, username, reason, ip_address, user_agent, created_at
             FROM auth_audit_log
             WHERE ? IS NULL OR event_type = ?
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(event_type)
        .bind(event_type)
        .bind(limit.clamp(1, MAX_LOG_ENTRIES))
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}
