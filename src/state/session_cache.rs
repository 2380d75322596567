// Moka-backed session store

use crate::api::SessionStore;
use crate::auth::session::{SessionToken, SessionTokenHash};
use crate::core::errors::QhseError;
use crate::core::models::{CurrentUser, Role};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use moka::future::Cache;
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
struct CachedSession {
    user: CurrentUser,
    expires_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct SessionRow {
    id: i64,
    username: String,
    email: String,
    role: String,
    expires_at: DateTime<Utc>,
}

/// Session store persisted in SQLite with an in-memory cache in front
///
/// The cache TTL matches the session TTL so an entry never outlives its row.
pub struct MokaSessionStore {
    db_pool: SqlitePool,
    cache: Cache<String, Arc<CachedSession>>,
    ttl_secs: u64,
}

impl MokaSessionStore {
    /// # Parameters
    /// * `ttl_secs` - session lifetime in seconds
    /// * `max_capacity` - maximum number of cached sessions
    pub fn new(db_pool: SqlitePool, ttl_secs: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(ttl_secs))
            .max_capacity(max_capacity)
            .build();

        Self {
            db_pool,
            cache,
            ttl_secs,
        }
    }

    /// Delete expired session rows, returning how many were removed
    pub async fn purge_expired(&self) -> Result<u64, QhseError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(Utc::now())
            .execute(&self.db_pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionStore for MokaSessionStore {
    async fn create_session(&self, user: &CurrentUser) -> Result<(SessionToken, DateTime<Utc>), QhseError> {
        let token = SessionToken::generate();
        let hash = token.hash();
        let now = Utc::now();
        let expires_at = now + ChronoDuration::seconds(self.ttl_secs as i64);

        sqlx::query("INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
            .bind(hash.as_str())
            .bind(user.id)
            .bind(now)
            .bind(expires_at)
            .execute(&self.db_pool)
            .await?;

        self.cache
            .insert(
                hash.as_str().to_string(),
                Arc::new(CachedSession {
                    user: user.clone(),
                    expires_at,
                }),
            )
            .await;

        Ok((token, expires_at))
    }

    async fn resolve_session(&self, token_hash: &SessionTokenHash) -> Result<Option<CurrentUser>, QhseError> {
        let now = Utc::now();

        if let Some(cached) = self.cache.get(token_hash.as_str()).await {
            if cached.expires_at > now {
                return Ok(Some(cached.user.clone()));
            }
            self.cache.invalidate(token_hash.as_str()).await;
            return Ok(None);
        }

        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT u.id, u.username, u.email, u.role, s.expires_at
             FROM sessions s JOIN users u ON u.id = s.user_id
             WHERE s.token_hash = ?"
        )
        .bind(token_hash.as_str())
        .fetch_optional(&self.db_pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        if row.expires_at <= now {
            return Ok(None);
        }

        let user = CurrentUser {
            id: row.id,
            username: row.username,
            email: row.email,
            role: row.role.parse::<Role>()?,
        };

        self.cache
            .insert(
                token_hash.as_str().to_string(),
                Arc::new(CachedSession {
                    user: user.clone(),
                    expires_at: row.expires_at,
                }),
            )
            .await;

        Ok(Some(user))
    }

    async fn revoke_session(&self, token_hash: &SessionTokenHash) -> Result<(), QhseError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(token_hash.as_str())
            .execute(&self.db_pool)
            .await?;
        self.cache.invalidate(token_hash.as_str()).await;
        Ok(())
    }

    async fn revoke_user_sessions(&self, user_id: i64) -> Result<(), QhseError> {
        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.db_pool)
            .await?;
        // Cache keys are token hashes, so drop everything
        self.cache.invalidate_all();
        Ok(())
    }
}
