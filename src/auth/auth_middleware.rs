// Axum session authentication middleware

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{Json, Response},
};
use std::sync::Arc;
use tracing::error;
use crate::api::SessionStore;
use crate::api::responses::ErrorResponse;
use crate::auth::audit_logger::{AuditLogger, AuthEvent};
use crate::auth::session::SessionToken;
use crate::auth::user_store::UserStore;

/// Authentication state containing all dependencies
#[derive(Clone)]
pub struct AuthState {
    pub session_store: Arc<dyn SessionStore + Send + Sync>,
    pub user_store: Arc<UserStore>,
    pub audit_logger: Arc<AuditLogger>,
}

/// Session authentication middleware
///
/// Resolves the session token and stores the `CurrentUser` in request extensions.
pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let token_str = extract_session_token(request.headers())
        .ok_or_else(|| unauthorized("Missing session token"))?;

    let token = SessionToken::new(&token_str);
    let token_hash = token.hash();

    let user = match auth_state.session_store.resolve_session(&token_hash).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            auth_state.audit_logger.log_auth_event(
                AuthEvent::SessionRejected { reason: "Invalid or expired session".to_string() },
                None,
                extract_ip_address(&request).as_deref(),
                extract_user_agent(&request).as_deref(),
            );
            return Err(unauthorized("Invalid session"));
        }
        Err(e) => {
            error!(error = %e, "Session lookup failed");
            let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return Err((status, Json(ErrorResponse {
                error: e.user_message(),
                request_id: None,
            })));
        }
    };

    request.extensions_mut().insert(user);
    request.extensions_mut().insert(token_hash);

    Ok(next.run(request).await)
}

fn unauthorized(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::UNAUTHORIZED, Json(ErrorResponse {
        error: message.to_string(),
        request_id: None,
    }))
}

/// Extract the session token from `Authorization: Bearer` or `X-Session-Token`
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    bearer.or_else(|| {
        headers
            .get("X-Session-Token")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Extract IP address from request headers
///
/// Checks `X-Forwarded-For` first (for proxied requests), then `X-Real-IP`.
pub fn extract_ip_address(request: &Request) -> Option<String> {
    ip_from_headers(request.headers())
}

pub fn ip_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Forwarded-For")
        .or_else(|| headers.get("X-Real-IP"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Extract user agent from request headers
pub fn extract_user_agent(request: &Request) -> Option<String> {
    user_agent_from_headers(request.headers())
}

pub fn user_agent_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("User-Agent")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Bearer abc123".parse().unwrap());
        assert_eq!(extract_session_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn test_extract_fallback_header() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Session-Token", "tok".parse().unwrap());
        assert_eq!(extract_session_token(&headers), Some("tok".to_string()));
    }

    #[test]
    fn test_non_bearer_authorization_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Basic dXNlcjpwYXNz".parse().unwrap());
        assert_eq!(extract_session_token(&headers), None);
    }

    #[test]
    fn test_extract_token_missing() {
        assert_eq!(extract_session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Real-IP", "10.0.0.2".parse().unwrap());
        headers.insert("X-Forwarded-For", "10.0.0.1".parse().unwrap());
        assert_eq!(ip_from_headers(&headers), Some("10.0.0.1".to_string()));
    }
}
