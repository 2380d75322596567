// Common test utilities and mocks
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use qhse_assistant::analysis::{KeywordTextAnalyzer, ResilientTextAnalyzer, TextAnalysis};
use qhse_assistant::api::{create_router, AppState, Config, SessionStore, TextAnalyzer};
use qhse_assistant::auth::session::{SessionToken, SessionTokenHash};
use qhse_assistant::auth::user_store::UserStore;
use qhse_assistant::core::crypto::LedgerSigner;
use qhse_assistant::core::errors::QhseError;
use qhse_assistant::core::models::{CurrentUser, Role};
use qhse_assistant::db;
use qhse_assistant::ledger::Ledger;
use qhse_assistant::state::session_cache::MokaSessionStore;
use secrecy::Secret;
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const ADMIN_PASSWORD: &str = "admin123";

/// Mock session store keeping sessions in a map
pub struct MockSessionStore {
    pub should_fail: bool,
    pub sessions: Mutex<HashMap<String, CurrentUser>>,
}

impl Default for MockSessionStore {
    fn default() -> Self {
        Self {
            should_fail: false,
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl MockSessionStore {
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), QhseError> {
        if self.should_fail {
            Err(QhseError::TransientError("Mock session store failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl SessionStore for MockSessionStore {
    async fn create_session(&self, user: &CurrentUser) -> Result<(SessionToken, DateTime<Utc>), QhseError> {
        self.check()?;
        let token = SessionToken::generate();
        self.sessions
            .lock()
            .unwrap()
            .insert(token.hash().as_str().to_string(), user.clone());
        Ok((token, Utc::now() + Duration::hours(1)))
    }

    async fn resolve_session(&self, token_hash: &SessionTokenHash) -> Result<Option<CurrentUser>, QhseError> {
        self.check()?;
        Ok(self.sessions.lock().unwrap().get(token_hash.as_str()).cloned())
    }

    async fn revoke_session(&self, token_hash: &SessionTokenHash) -> Result<(), QhseError> {
        self.check()?;
        self.sessions.lock().unwrap().remove(token_hash.as_str());
        Ok(())
    }

    async fn revoke_user_sessions(&self, user_id: i64) -> Result<(), QhseError> {
        self.check()?;
        self.sessions.lock().unwrap().retain(|_, user| user.id != user_id);
        Ok(())
    }
}

/// Mock text analyzer with a fixed answer
pub struct MockTextAnalyzer {
    pub should_fail: bool,
    pub risk_level: u8,
}

impl Default for MockTextAnalyzer {
    fn default() -> Self {
        Self {
            should_fail: false,
            risk_level: 3,
        }
    }
}

#[async_trait::async_trait]
impl TextAnalyzer for MockTextAnalyzer {
    async fn analyze(&self, _text: &str, _sector: Option<&str>) -> Result<TextAnalysis, QhseError> {
        if self.should_fail {
            return Err(QhseError::DependencyFailure {
                service: "llm".to_string(),
                error: "Mock analyzer failure".to_string(),
            });
        }
        Ok(TextAnalysis {
            risk_level: self.risk_level,
            recommendations: vec!["Mock recommendation".to_string()],
            corrective_actions: vec![],
            compliance_notes: vec![],
            estimated_cost: 1000.0,
            source: "mock".to_string(),
        })
    }
}

/// Migrated in-memory database with reference rows and the admin account
pub async fn test_pool() -> SqlitePool {
    let pool = db::connect_in_memory().await.expect("in-memory database");
    db::seed::seed_reference_data(&pool, &Secret::new(ADMIN_PASSWORD.to_string()))
        .await
        .expect("reference data");
    pool
}

pub async fn test_ledger(pool: SqlitePool) -> Arc<Ledger> {
    Arc::new(
        Ledger::load(pool, Arc::new(LedgerSigner::generate()), 1)
            .await
            .expect("ledger"),
    )
}

/// Full application state over a fresh database
pub async fn test_app_state() -> AppState {
    test_app_state_with(Arc::new(ResilientTextAnalyzer::new(None))).await
}

pub async fn test_app_state_with(text_analyzer: Arc<dyn TextAnalyzer + Send + Sync>) -> AppState {
    let config = Arc::new(Config::test_config());
    let pool = test_pool().await;
    let ledger = test_ledger(pool.clone()).await;
    let session_store = Arc::new(MokaSessionStore::new(
        pool.clone(),
        config.session_ttl_secs,
        config.session_cache_capacity,
    ));
    AppState::new(config, pool, ledger, session_store, text_analyzer).expect("app state")
}

pub fn keyword_analyzer() -> Arc<dyn TextAnalyzer + Send + Sync> {
    Arc::new(KeywordTextAnalyzer)
}

/// Router with session auth enabled
pub fn test_router(state: &AppState) -> Router {
    create_router(state, Some(state.auth_state())).with_state(state.clone())
}

/// Create a user directly in the store, returning its id
pub async fn create_user(pool: &SqlitePool, username: &str, password: &str, role: Role) -> i64 {
    UserStore::new(pool.clone())
        .create_user(
            username,
            &format!("{}@example.com", username),
            &Secret::new(password.to_string()),
            role,
        )
        .await
        .expect("user created")
        .id
}

/// Send a request and return status with the decoded JSON body (Null when empty)
pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (u16, Value) {
    match body {
        Some(body) => send_raw(router, method, uri, token, Some("application/json"), &body.to_string()).await,
        None => send_raw(router, method, uri, token, None, "").await,
    }
}

/// Send an arbitrary body, optionally labelled with a content type
pub async fn send_raw(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    content_type: Option<&str>,
    body: &str,
) -> (u16, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status().as_u16();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };
    (status, value)
}

/// Log in through the API and return the bearer token
pub async fn login(router: &Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        router,
        "POST",
        "/api/auth/login",
        None,
        Some(serde_json::json!({"username": username, "password": password})),
    )
    .await;
    assert_eq!(status, 200, "login failed: {}", body);
    body["token"].as_str().expect("token in login response").to_string()
}
