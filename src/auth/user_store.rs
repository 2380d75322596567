// Database-backed user accounts

use crate::auth::password::PasswordHash;
use crate::core::errors::QhseError;
use crate::core::models::{CurrentUser, Role};
use chrono::{DateTime, Utc};
use secrecy::Secret;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

/// Database row for a user account
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Convert to the request-scoped identity
    pub fn to_current_user(&self) -> Result<CurrentUser, QhseError> {
        Ok(CurrentUser {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role.parse::<Role>()?,
        })
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
            created_at: self.created_at,
        }
    }
}

/// Public view of a user (no password hash)
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// User account storage
#[derive(Clone)]
pub struct UserStore {
    db_pool: SqlitePool,
}

impl UserStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, QhseError> {
        let row = sqlx::query_as::<_, UserRecord>(
            "SELECT id, username, email, password_hash, role, created_at FROM users WHERE username = ?"
        )
        .bind(username)
        .fetch_optional(&self.db_pool)
        .await?;
        Ok(row)
    }

    pub async fn find_by_id(&self, user_id: i64) -> Result<Option<UserRecord>, QhseError> {
        let row = sqlx::query_as::<_, UserRecord>(
            "SELECT id, username, email, password_hash, role, created_at FROM users WHERE id = ?"
        )
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?;
        Ok(row)
    }

    /// Check credentials, returning the user on success
    pub async fn authenticate(
        &self,
        username: &str,
        password: &Secret<String>,
    ) -> Result<Option<UserRecord>, QhseError> {
        let Some(user) = self.find_by_username(username).await? else {
            return Ok(None);
        };
        if PasswordHash::from_stored(user.password_hash.as_str()).verify(password) {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// Create a user; fails with `Conflict` when the username or email is taken
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &Secret<String>,
        role: Role,
    ) -> Result<UserRecord, QhseError> {
        if username.trim().is_empty() || email.trim().is_empty() {
            return Err(QhseError::Validation("username and email are required".to_string()));
        }

        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE username = ? OR email = ?"
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.db_pool)
        .await?;

        if existing > 0 {
            return Err(QhseError::Conflict("Username or email already exists".to_string()));
        }

        let hash = PasswordHash::generate(password);
        let id = sqlx::query(
            "INSERT INTO users (username, email, password_hash, role, created_at) VALUES (?, ?, ?, ?, ?)"
        )
        .bind(username)
        .bind(email)
        .bind(hash.as_str())
        .bind(role.as_str())
        .bind(Utc::now())
        .execute(&self.db_pool)
        .await?
        .last_insert_rowid();

        self.find_by_id(id)
            .await?
            .ok_or_else(|| QhseError::NotFound("User".to_string()))
    }

    pub async fn list_users(&self) -> Result<Vec<UserSummary>, QhseError> {
        let rows = sqlx::query_as::<_, UserRecord>(
            "SELECT id, username, email, password_hash, role, created_at FROM users ORDER BY created_at DESC, id DESC"
        )
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows.iter().map(UserRecord::summary).collect())
    }

    /// Returns false when the user does not exist
    pub async fn update_role(&self, user_id: i64, role: Role) -> Result<bool, QhseError> {
        let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(user_id)
            .execute(&self.db_pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Users holding any of `roles`
    pub async fn users_with_roles(&self, roles: &[Role]) -> Result<Vec<UserRecord>, QhseError> {
        let all = sqlx::query_as::<_, UserRecord>(
            "SELECT id, username, email, password_hash, role, created_at FROM users ORDER BY id"
        )
        .fetch_all(&self.db_pool)
        .await?;
        Ok(all
            .into_iter()
            .filter(|u| roles.iter().any(|r| r.as_str() == u.role))
            .collect())
    }

    pub async fn count_by_role(&self) -> Result<Vec<(String, i64)>, QhseError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT role, COUNT(*) FROM users GROUP BY role ORDER BY role"
        )
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows)
    }
}
