// Certificate and audit ledger handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use crate::api::handlers::{JsonBody, parse_body};
use crate::api::responses::ApiError;
use crate::api::AppState;
use crate::core::errors::QhseError;
use crate::core::models::CurrentUser;
use crate::ledger::{AuditRecord, CertificateRecord, CertificateVerification, ChainExport, LedgerStats};

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<i64>,
}

impl UserQuery {
    fn required(&self) -> Result<i64, QhseError> {
        self.user_id
            .ok_or_else(|| QhseError::Validation("user_id query parameter is required".to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct BlockRange {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

#[derive(Deserialize)]
struct NewCertificate {
    user_id: i64,
    certificate_type: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    issuer: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct NewAudit {
    #[serde(default)]
    auditor_id: Option<i64>,
    auditee_id: i64,
    audit_type: String,
    #[serde(default)]
    results: Value,
}

/// GET /api/blockchain/certificates?user_id
pub async fn certificates_handler(
    State(app_state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<CertificateRecord>>, ApiError> {
    let user_id = query.required()?;
    Ok(Json(app_state.ledger.certificate_history(user_id).await?))
}

/// POST /api/blockchain/certificates
///
/// Mined before responding, so this may take a while at high difficulty.
pub async fn create_certificate_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<CertificateRecord>), ApiError> {
    let request: NewCertificate = parse_body(body)?;
    let issuer = request.issuer.unwrap_or_else(|| user.username.clone());
    let certificate = app_state
        .ledger
        .create_certificate(request.user_id, &request.certificate_type, request.expires_at, &issuer, request.data)
        .await?;
    app_state.metrics.ledger_blocks.set(app_state.ledger.block_count().await as i64);
    Ok((StatusCode::CREATED, Json(certificate)))
}

/// GET /api/blockchain/verify/{id}
pub async fn verify_certificate_handler(
    State(app_state): State<AppState>,
    Path(certificate_id): Path<String>,
) -> Result<Json<CertificateVerification>, ApiError> {
    Ok(Json(app_state.ledger.verify_certificate(&certificate_id).await?))
}

/// POST /api/blockchain/audits
///
/// The auditor defaults to the caller.
pub async fn create_audit_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<AuditRecord>), ApiError> {
    let request: NewAudit = parse_body(body)?;
    let record = app_state
        .ledger
        .create_audit_record(
            request.auditor_id.unwrap_or(user.id),
            request.auditee_id,
            &request.audit_type,
            request.results,
        )
        .await?;
    app_state.metrics.ledger_blocks.set(app_state.ledger.block_count().await as i64);
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/blockchain/audits?user_id
pub async fn audits_handler(
    State(app_state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<AuditRecord>>, ApiError> {
    let user_id = query.required()?;
    Ok(Json(app_state.ledger.audit_history(user_id).await?))
}

pub async fn stats_handler(State(app_state): State<AppState>) -> Json<LedgerStats> {
    Json(app_state.ledger.stats().await)
}

/// GET /api/blockchain/blocks?start&end
pub async fn blocks_handler(
    State(app_state): State<AppState>,
    Query(range): Query<BlockRange>,
) -> Json<ChainExport> {
    Json(app_state.ledger.export_range(range.start.unwrap_or(0), range.end).await)
}
