// Supplier evaluation handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use crate::api::handlers::{JsonBody, found, parse_body};
use crate::api::responses::ApiError;
use crate::api::AppState;
use crate::core::models::{CurrentUser, Role};
use crate::suppliers::{
    AuditResult, AuditSchedule, IncidentOutcome, NewSupplier, OverdueAudit, RiskAssessment, Supplier, SupplierAudit,
    SupplierIncidentReport, SupplierStatistics,
};

const STATUS_ROLES: [Role; 3] = [Role::Admin, Role::Manager, Role::QhseManager];

#[derive(Deserialize)]
struct StatusUpdate {
    status: String,
}

pub async fn suppliers_handler(State(app_state): State<AppState>) -> Result<Json<Vec<Supplier>>, ApiError> {
    Ok(Json(app_state.suppliers.suppliers().await?))
}

/// POST /api/suppliers
pub async fn add_supplier_handler(
    State(app_state): State<AppState>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<Supplier>), ApiError> {
    let supplier: NewSupplier = parse_body(body)?;
    Ok((StatusCode::CREATED, Json(app_state.suppliers.add_supplier(&supplier).await?)))
}

pub async fn risk_assessment_handler(
    State(app_state): State<AppState>,
    Path(supplier_id): Path<String>,
) -> Result<Json<RiskAssessment>, ApiError> {
    Ok(Json(app_state.suppliers.risk_assessment(&supplier_id).await?))
}

/// POST /api/suppliers/{id}/audits
///
/// The auditor defaults to the caller.
pub async fn schedule_audit_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(supplier_id): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<SupplierAudit>), ApiError> {
    let schedule: AuditSchedule = parse_body(body)?;
    let auditor_id = schedule.auditor_id.unwrap_or(user.id);
    let audit_id = app_state.suppliers.schedule_audit(&supplier_id, auditor_id, &schedule).await?;
    let audit = found(app_state.suppliers.audit(&audit_id).await?, format!("Audit {}", audit_id))?;
    Ok((StatusCode::CREATED, Json(audit)))
}

/// POST /api/suppliers/audits/{id}/complete
pub async fn complete_audit_handler(
    State(app_state): State<AppState>,
    Path(audit_id): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<Json<Supplier>, ApiError> {
    let result: AuditResult = parse_body(body)?;
    Ok(Json(app_state.suppliers.complete_audit(&audit_id, &result).await?))
}

/// POST /api/suppliers/{id}/incidents
pub async fn report_incident_handler(
    State(app_state): State<AppState>,
    Path(supplier_id): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<IncidentOutcome>), ApiError> {
    let report: SupplierIncidentReport = parse_body(body)?;
    Ok((
        StatusCode::CREATED,
        Json(app_state.suppliers.report_incident(&supplier_id, &report).await?),
    ))
}

pub async fn overdue_audits_handler(State(app_state): State<AppState>) -> Result<Json<Vec<OverdueAudit>>, ApiError> {
    Ok(Json(app_state.suppliers.overdue_audits().await?))
}

pub async fn statistics_handler(State(app_state): State<AppState>) -> Result<Json<SupplierStatistics>, ApiError> {
    Ok(Json(app_state.suppliers.statistics().await?))
}

/// PUT /api/suppliers/{id}/status
pub async fn update_status_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(supplier_id): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<Json<Supplier>, ApiError> {
    user.require_any_role(&STATUS_ROLES)?;
    let update: StatusUpdate = parse_body(body)?;
    Ok(Json(app_state.suppliers.update_status(&supplier_id, &update.status).await?))
}

/// GET /api/suppliers/risk/{level}
pub async fn by_risk_level_handler(
    State(app_state): State<AppState>,
    Path(risk_level): Path<String>,
) -> Result<Json<Vec<Supplier>>, ApiError> {
    Ok(Json(app_state.suppliers.by_risk_level(&risk_level).await?))
}
