// Integration tests for login, logout and role checks

use crate::common::{create_user, login, send, test_app_state, test_router, ADMIN_PASSWORD};
use qhse_assistant::core::models::Role;
use serde_json::json;

#[tokio::test]
async fn test_login_success_returns_token_and_user() {
    let state = test_app_state().await;
    let router = test_router(&state);

    let (status, body) = send(
        &router,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"username": "admin", "password": ADMIN_PASSWORD})),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["token"].as_str().unwrap().len(), 64);
    assert_eq!(body["user"]["username"], "admin");
    assert_eq!(body["user"]["role"], "admin");
    assert!(body["expires_at"].is_string());
}

#[tokio::test]
async fn test_login_wrong_password_is_unauthorized() {
    let state = test_app_state().await;
    let router = test_router(&state);

    let (status, body) = send(
        &router,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"username": "admin", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(body["error"], "Invalid username or password");

    // Unknown user gets the same answer
    let (status, body) = send(
        &router,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"username": "nobody", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(body["error"], "Invalid username or password");
}

#[tokio::test]
async fn test_login_malformed_body_is_bad_request() {
    let state = test_app_state().await;
    let router = test_router(&state);

    let (status, body) = send(&router, "POST", "/api/auth/login", None, Some(json!({"user": "admin"}))).await;

    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let state = test_app_state().await;
    let router = test_router(&state);

    let (status, body) = send(&router, "GET", "/api/incidents", None, None).await;

    assert_eq!(status, 401);
    assert_eq!(body["error"], "Missing session token");
}

#[tokio::test]
async fn test_logout_invalidates_token() {
    let state = test_app_state().await;
    let router = test_router(&state);
    let token = login(&router, "admin", ADMIN_PASSWORD).await;

    let (status, body) = send(&router, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, 200);
    assert_eq!(body["id"], 1);

    let (status, _) = send(&router, "POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, 200);

    let (status, body) = send(&router, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, 401);
    assert_eq!(body["error"], "Invalid session");
}

#[tokio::test]
async fn test_employee_cannot_schedule_training_sessions() {
    let state = test_app_state().await;
    create_user(&state.db_pool, "paul", "paul-pass", Role::Employee).await;
    let router = test_router(&state);
    let token = login(&router, "paul", "paul-pass").await;

    let (status, body) = send(
        &router,
        "POST",
        "/api/training/sessions",
        Some(&token),
        Some(json!({
            "training_id": 1,
            "start_date": "2030-01-10T08:00:00Z",
            "end_date": "2030-01-10T12:00:00Z"
        })),
    )
    .await;

    assert_eq!(status, 403);
    assert_eq!(body["error"], "Insufficient permissions");
}

#[tokio::test]
async fn test_role_change_revokes_sessions() {
    let state = test_app_state().await;
    let user_id = create_user(&state.db_pool, "lea", "lea-pass", Role::Employee).await;
    let router = test_router(&state);
    let admin_token = login(&router, "admin", ADMIN_PASSWORD).await;
    let user_token = login(&router, "lea", "lea-pass").await;

    let (status, body) = send(
        &router,
        "PUT",
        &format!("/api/admin/users/{}/role", user_id),
        Some(&admin_token),
        Some(json!({"role": "qhse_manager"})),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["role"], "qhse_manager");

    let (status, _) = send(&router, "GET", "/api/auth/me", Some(&user_token), None).await;
    assert_eq!(status, 401);

    let user_token = login(&router, "lea", "lea-pass").await;
    let (status, body) = send(&router, "GET", "/api/auth/me", Some(&user_token), None).await;
    assert_eq!(status, 200);
    assert_eq!(body["role"], "qhse_manager");
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let state = test_app_state().await;
    create_user(&state.db_pool, "marc", "marc-pass", Role::Employee).await;
    let router = test_router(&state);
    let token = login(&router, "marc", "marc-pass").await;

    let (status, _) = send(&router, "GET", "/api/admin/users", Some(&token), None).await;
    assert_eq!(status, 403);

    let admin_token = login(&router, "admin", ADMIN_PASSWORD).await;
    let (status, body) = send(&router, "GET", "/api/admin/users", Some(&admin_token), None).await;
    assert_eq!(status, 200);
    assert_eq!(body.as_array().unwrap().len(), 2);
}
