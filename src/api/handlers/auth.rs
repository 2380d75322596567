// Login, logout and current-user handlers

use axum::{extract::State, http::HeaderMap, Extension, Json};
use secrecy::Secret;
use serde::Deserialize;
use tracing::info;
use crate::api::handlers::{JsonBody, parse_body};
use crate::api::middleware::request_id;
use crate::api::responses::{ApiError, LoginResponse, MessageResponse};
use crate::api::AppState;
use crate::auth::audit_logger::AuthEvent;
use crate::auth::auth_middleware::{ip_from_headers, user_agent_from_headers};
use crate::auth::session::SessionTokenHash;
use crate::core::errors::QhseError;
use crate::core::models::CurrentUser;

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: Secret<String>,
}

/// POST /api/auth/login
///
/// Unknown user and wrong password share the same 401 message.
pub async fn login_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    JsonBody(body): JsonBody,
) -> Result<Json<LoginResponse>, ApiError> {
    let request_id = request_id(&headers);
    let request: LoginRequest =
        parse_body(body).map_err(|e| ApiError::from_qhse_error_with_id(e, request_id.clone()))?;
    let ip = ip_from_headers(&headers);
    let ua = user_agent_from_headers(&headers);

    let record = app_state
        .user_store
        .authenticate(request.username.trim(), &request.password)
        .await
        .map_err(|e| ApiError::from_qhse_error_with_id(e, request_id.clone()))?;

    let Some(record) = record else {
        app_state.metrics.logins.with_label_values(&["failure"]).inc();
        app_state.audit_logger.log_auth_event(
            AuthEvent::LoginFailure { reason: "Invalid credentials".to_string() },
            Some(request.username.as_str()),
            ip.as_deref(),
            ua.as_deref(),
        );
        return Err(ApiError::from_qhse_error_with_id(
            QhseError::Unauthorized("Invalid username or password".to_string()),
            request_id,
        ));
    };

    let user = record.to_current_user()?;
    let (token, expires_at) = app_state.session_store.create_session(&user).await?;

    app_state.metrics.logins.with_label_values(&["success"]).inc();
    app_state.audit_logger.log_auth_event(
        AuthEvent::LoginSuccess,
        Some(user.username.as_str()),
        ip.as_deref(),
        ua.as_deref(),
    );
    info!(user_id = user.id, role = %user.role, request_id = %request_id, "User logged in");

    Ok(Json(LoginResponse {
        token: token.expose_secret().to_string(),
        user,
        expires_at,
    }))
}

/// POST /api/auth/logout
pub async fn logout_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Extension(token_hash): Extension<SessionTokenHash>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, ApiError> {
    app_state.session_store.revoke_session(&token_hash).await?;
    app_state.audit_logger.log_auth_event(
        AuthEvent::Logout,
        Some(user.username.as_str()),
        ip_from_headers(&headers).as_deref(),
        user_agent_from_headers(&headers).as_deref(),
    );
    Ok(MessageResponse::new("Logged out"))
}

/// GET /api/auth/me
pub async fn me_handler(Extension(user): Extension<CurrentUser>) -> Json<CurrentUser> {
    Json(user)
}
