// Unit tests for the moka-backed session store

use crate::common::{create_user, test_pool};
use chrono::{Duration, Utc};
use qhse_assistant::api::SessionStore;
use qhse_assistant::auth::session::SessionTokenHash;
use qhse_assistant::core::models::{CurrentUser, Role};
use qhse_assistant::state::session_cache::MokaSessionStore;

fn user(id: i64, username: &str, role: Role) -> CurrentUser {
    CurrentUser {
        id,
        username: username.to_string(),
        email: format!("{}@example.com", username),
        role,
    }
}

#[tokio::test]
async fn test_session_resolves_from_cache_and_database() {
    let pool = test_pool().await;
    let store = MokaSessionStore::new(pool.clone(), 3600, 100);
    let admin = user(1, "admin", Role::Admin);

    let (token, expires_at) = store.create_session(&admin).await.unwrap();
    assert!(expires_at > Utc::now() + Duration::minutes(59));

    let resolved = store.resolve_session(&token.hash()).await.unwrap();
    assert_eq!(resolved, Some(admin.clone()));

    // A second store over the same pool has a cold cache
    let cold = MokaSessionStore::new(pool, 3600, 100);
    let resolved = cold.resolve_session(&token.hash()).await.unwrap().unwrap();
    assert_eq!(resolved.id, 1);
    assert_eq!(resolved.role, Role::Admin);
    assert_eq!(resolved.email, "admin@qhse.com");
}

#[tokio::test]
async fn test_unknown_token_is_none() {
    let store = MokaSessionStore::new(test_pool().await, 3600, 100);
    let missing = SessionTokenHash::from_token("never-issued");
    assert!(store.resolve_session(&missing).await.unwrap().is_none());
}

#[tokio::test]
async fn test_revoke_session() {
    let store = MokaSessionStore::new(test_pool().await, 3600, 100);
    let (token, _) = store.create_session(&user(1, "admin", Role::Admin)).await.unwrap();

    store.revoke_session(&token.hash()).await.unwrap();

    assert!(store.resolve_session(&token.hash()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_revoke_user_sessions_keeps_other_users() {
    let pool = test_pool().await;
    let alice_id = create_user(&pool, "alice", "secret-1", Role::Employee).await;
    let store = MokaSessionStore::new(pool, 3600, 100);

    let (first, _) = store.create_session(&user(alice_id, "alice", Role::Employee)).await.unwrap();
    let (second, _) = store.create_session(&user(alice_id, "alice", Role::Employee)).await.unwrap();
    let (admin_token, _) = store.create_session(&user(1, "admin", Role::Admin)).await.unwrap();

    store.revoke_user_sessions(alice_id).await.unwrap();

    assert!(store.resolve_session(&first.hash()).await.unwrap().is_none());
    assert!(store.resolve_session(&second.hash()).await.unwrap().is_none());
    // Reloaded from the database after the cache was cleared
    assert!(store.resolve_session(&admin_token.hash()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_expired_rows_are_rejected_and_purged() {
    let pool = test_pool().await;
    let hash = SessionTokenHash::from_token("stale-token");
    let now = Utc::now();
    sqlx::query("INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(hash.as_str())
        .bind(1_i64)
        .bind(now - Duration::hours(2))
        .bind(now - Duration::hours(1))
        .execute(&pool)
        .await
        .unwrap();

    let store = MokaSessionStore::new(pool, 3600, 100);
    assert!(store.resolve_session(&hash).await.unwrap().is_none());

    assert_eq!(store.purge_expired().await.unwrap(), 1);
    assert_eq!(store.purge_expired().await.unwrap(), 0);
}
