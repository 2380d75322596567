// HTTP handlers, one module per domain

pub mod admin;
pub mod analysis;
pub mod arvr;
pub mod auth;
pub mod gamification;
pub mod incidents;
pub mod iot;
pub mod ledger;
pub mod notifications;
pub mod reports;
pub mod suppliers;
pub mod system;
pub mod training;
pub mod workflows;

use crate::api::responses::ApiError;
use crate::core::errors::QhseError;
use axum::{
    async_trait,
    body::Bytes,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// JSON request body whose rejections use the API error shape
pub struct JsonBody(pub Value);

#[async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<Value>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

/// Body that may be omitted; an empty body or `null` reads as `None`
///
/// A body that is present but not JSON is still rejected.
pub struct OptionalJsonBody(pub Option<Value>);

#[async_trait]
impl<S> FromRequest<S> for OptionalJsonBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::new(rejection.status(), rejection.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(None));
        }
        let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
            ApiError::new(StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e))
        })?;
        Ok(Self(Some(value).filter(|v| !v.is_null())))
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    let status = match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::BAD_REQUEST,
    };
    ApiError::new(status, format!("Invalid request body: {}", rejection.body_text()))
}

/// Decode a JSON body so shape errors come back as our 400 payload
pub(crate) fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T, QhseError> {
    serde_json::from_value(body).map_err(|e| QhseError::Validation(format!("Invalid request body: {}", e)))
}

/// 404 for an absent row
pub(crate) fn found<T>(value: Option<T>, what: impl Into<String>) -> Result<T, QhseError> {
    value.ok_or_else(|| QhseError::NotFound(what.into()))
}
