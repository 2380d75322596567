// Response types for API endpoints

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use crate::core::errors::QhseError;
use crate::core::models::CurrentUser;

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub ledger_blocks: usize,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: CurrentUser,
    pub expires_at: DateTime<Utc>,
}

/// Acknowledgement for mutations that return no resource
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self { message: message.into() })
    }
}

#[derive(Debug, Serialize)]
pub struct IncidentCreated {
    pub id: i64,
    pub risk_score: f64,
    pub message: String,
}

/// API error type that converts domain errors to HTTP responses
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: String) -> Self {
        Self {
            status,
            message,
            request_id: None,
        }
    }

    pub fn with_request_id(status: StatusCode, message: String, request_id: String) -> Self {
        Self {
            status,
            message,
            request_id: Some(request_id),
        }
    }

    /// Map a domain error to its status code and user-facing message
    pub fn from_qhse_error(err: QhseError) -> Self {
        let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, err.user_message())
    }

    pub fn from_qhse_error_with_id(err: QhseError, request_id: String) -> Self {
        let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::with_request_id(status, err.user_message(), request_id)
    }
}

impl From<QhseError> for ApiError {
    fn from(err: QhseError) -> Self {
        ApiError::from_qhse_error(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            request_id: self.request_id,
        };
        (self.status, Json(body)).into_response()
    }
}
