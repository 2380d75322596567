// Unit tests for the session middleware with mocked stores

use crate::common::{send, test_ledger, test_pool, MockSessionStore, MockTextAnalyzer};
use qhse_assistant::api::{create_router, AppState, Config, SessionStore};
use qhse_assistant::core::models::{CurrentUser, Role};
use std::sync::Arc;

async fn state_with_store(store: Arc<MockSessionStore>) -> AppState {
    let pool = test_pool().await;
    let ledger = test_ledger(pool.clone()).await;
    AppState::new(
        Arc::new(Config::test_config()),
        pool,
        ledger,
        store,
        Arc::new(MockTextAnalyzer::default()),
    )
    .unwrap()
}

fn admin() -> CurrentUser {
    CurrentUser {
        id: 1,
        username: "admin".to_string(),
        email: "admin@qhse.com".to_string(),
        role: Role::Admin,
    }
}

#[tokio::test]
async fn test_valid_session_reaches_handler() {
    let store = Arc::new(MockSessionStore::default());
    let (token, _) = store.create_session(&admin()).await.unwrap();
    let state = state_with_store(store).await;
    let router = create_router(&state, Some(state.auth_state())).with_state(state.clone());

    let (status, body) = send(&router, "GET", "/api/auth/me", Some(token.expose_secret()), None).await;

    assert_eq!(status, 200);
    assert_eq!(body["username"], "admin");
    assert_eq!(body["role"], "admin");
}

#[tokio::test]
async fn test_unknown_token_rejected() {
    let state = state_with_store(Arc::new(MockSessionStore::default())).await;
    let router = create_router(&state, Some(state.auth_state())).with_state(state.clone());

    let (status, body) = send(&router, "GET", "/api/auth/me", Some("not-a-session"), None).await;

    assert_eq!(status, 401);
    assert_eq!(body["error"], "Invalid session");
}

#[tokio::test]
async fn test_store_failure_is_service_unavailable() {
    let state = state_with_store(Arc::new(MockSessionStore::failing())).await;
    let router = create_router(&state, Some(state.auth_state())).with_state(state.clone());

    let (status, body) = send(&router, "GET", "/api/auth/me", Some("any-token"), None).await;

    assert_eq!(status, 503);
    assert_eq!(body["error"], "Service temporarily unavailable");
}

#[tokio::test]
async fn test_public_paths_skip_session_check() {
    let state = state_with_store(Arc::new(MockSessionStore::failing())).await;
    let router = create_router(&state, Some(state.auth_state())).with_state(state.clone());

    let (status, _) = send(&router, "GET", "/health", None, None).await;
    assert_eq!(status, 200);

    let (status, body) = send(&router, "GET", "/metrics", None, None).await;
    assert_eq!(status, 200);
    assert!(body.as_str().unwrap_or_default().contains("qhse_incidents_reported_total 0"));
}

#[tokio::test]
async fn test_logout_revokes_session() {
    let store = Arc::new(MockSessionStore::default());
    let (token, _) = store.create_session(&admin()).await.unwrap();
    let state = state_with_store(store.clone()).await;
    let router = create_router(&state, Some(state.auth_state())).with_state(state.clone());

    let (status, _) = send(&router, "POST", "/api/auth/logout", Some(token.expose_secret()), None).await;
    assert_eq!(status, 200);
    assert!(store.sessions.lock().unwrap().is_empty());

    let (status, _) = send(&router, "GET", "/api/auth/me", Some(token.expose_secret()), None).await;
    assert_eq!(status, 401);
}
