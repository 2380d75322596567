// Unit tests for AppState wiring

use crate::common::{test_app_state, test_app_state_with, MockTextAnalyzer};
use qhse_assistant::api::AppState;
use qhse_assistant::auth::auth_middleware::AuthState;
use static_assertions::assert_impl_all;
use std::sync::Arc;

assert_impl_all!(AppState: Send, Sync, Clone);
assert_impl_all!(AuthState: Send, Sync, Clone);

#[tokio::test]
async fn test_app_state_shares_one_ledger() {
    let state = test_app_state().await;
    let clone = state.clone();

    assert!(Arc::ptr_eq(&state.ledger, &clone.ledger));
    // Genesis block only
    assert_eq!(state.ledger.block_count().await, 1);
    assert!(state.ledger.is_chain_valid().await);
}

#[tokio::test]
async fn test_auth_state_reuses_session_store() {
    let state = test_app_state().await;
    let auth_state = state.auth_state();

    assert!(Arc::ptr_eq(&auth_state.session_store, &state.session_store));
    assert!(Arc::ptr_eq(&auth_state.user_store, &state.user_store));
}

#[tokio::test]
async fn test_injected_text_analyzer_is_used() {
    let analyzer = Arc::new(MockTextAnalyzer {
        risk_level: 4,
        ..MockTextAnalyzer::default()
    });
    let state = test_app_state_with(analyzer).await;

    let analysis = state.text_analyzer.analyze("Chute de hauteur", Some("BTP")).await.unwrap();
    assert_eq!(analysis.risk_level, 4);
    assert_eq!(analysis.source, "mock");
}

#[tokio::test]
async fn test_metrics_render_after_wiring() {
    let state = test_app_state().await;
    state.metrics.incidents_reported.inc();

    let text = state.metrics.render().unwrap();
    assert!(text.contains("qhse_incidents_reported_total 1"));
}
