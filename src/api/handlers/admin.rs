// Administration handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use crate::admin::{EquipmentOverview, NewUser, SystemOverview, UPCOMING_WINDOW_DAYS};
use crate::api::handlers::{JsonBody, parse_body};
use crate::api::responses::ApiError;
use crate::api::AppState;
use crate::auth::audit_logger::AuditLogEntry;
use crate::auth::user_store::UserSummary;
use crate::compliance::{ComplianceStatus, RegulationStatus, ReviewOutcome};
use crate::core::models::{CurrentUser, Role};
use crate::equipment::{Equipment, InspectionDue, InspectionRecord, NewEquipment, NewInspection};

/// Roles running compliance and equipment follow-up
const QHSE_ROLES: [Role; 3] = [Role::Admin, Role::Manager, Role::QhseManager];

#[derive(Deserialize)]
struct RoleUpdate {
    role: Role,
}

#[derive(Deserialize)]
struct StatusUpdate {
    status: String,
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub limit: Option<i64>,
    pub event_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DueQuery {
    pub days: Option<i64>,
}

/// GET /api/admin/overview (admin or manager)
pub async fn overview_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<SystemOverview>, ApiError> {
    user.require_any_role(&[Role::Admin, Role::Manager])?;
    Ok(Json(app_state.admin.overview().await?))
}

pub async fn users_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    user.require_any_role(&[Role::Admin])?;
    Ok(Json(app_state.admin.users().await?))
}

/// POST /api/admin/users
pub async fn create_user_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<UserSummary>), ApiError> {
    user.require_any_role(&[Role::Admin])?;
    let new_user: NewUser = parse_body(body)?;
    Ok((StatusCode::CREATED, Json(app_state.admin.create_user(&new_user).await?)))
}

/// PUT /api/admin/users/{id}/role
///
/// Existing sessions of the user are revoked so the new role applies at once.
pub async fn update_role_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    JsonBody(body): JsonBody,
) -> Result<Json<UserSummary>, ApiError> {
    user.require_any_role(&[Role::Admin])?;
    let update: RoleUpdate = parse_body(body)?;
    let summary = app_state.admin.update_role(user_id, update.role).await?;
    app_state.session_store.revoke_user_sessions(user_id).await?;
    Ok(Json(summary))
}

/// GET /api/admin/compliance
pub async fn compliance_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ComplianceStatus>, ApiError> {
    user.require_any_role(&QHSE_ROLES)?;
    Ok(Json(app_state.admin.compliance_status().await?))
}

/// PUT /api/admin/compliance/{code}
pub async fn review_regulation_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<Json<RegulationStatus>, ApiError> {
    user.require_any_role(&[Role::Admin, Role::QhseManager])?;
    let outcome: ReviewOutcome = parse_body(body)?;
    Ok(Json(app_state.admin.record_regulation_review(&code, &outcome).await?))
}

/// GET /api/admin/logs?limit=100&event_type=LOGIN_FAILURE
pub async fn logs_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<AuditLogEntry>>, ApiError> {
    user.require_any_role(&[Role::Admin])?;
    let logs = app_state
        .admin
        .system_logs(query.limit.unwrap_or(100), query.event_type.as_deref())
        .await?;
    Ok(Json(logs))
}

pub async fn equipment_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<EquipmentOverview>, ApiError> {
    user.require_any_role(&QHSE_ROLES)?;
    Ok(Json(app_state.admin.equipment_overview().await?))
}

/// POST /api/admin/equipment
pub async fn create_equipment_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<Equipment>), ApiError> {
    user.require_any_role(&QHSE_ROLES)?;
    let equipment: NewEquipment = parse_body(body)?;
    Ok((StatusCode::CREATED, Json(app_state.admin.register_equipment(&equipment).await?)))
}

/// PUT /api/admin/equipment/{id}/status
pub async fn equipment_status_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(equipment_id): Path<i64>,
    JsonBody(body): JsonBody,
) -> Result<Json<Equipment>, ApiError> {
    user.require_any_role(&QHSE_ROLES)?;
    let update: StatusUpdate = parse_body(body)?;
    Ok(Json(app_state.admin.update_equipment_status(equipment_id, &update.status).await?))
}

/// GET /api/admin/equipment/inspections?days=30
///
/// Overdue equipment is always included.
pub async fn inspections_due_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<DueQuery>,
) -> Result<Json<Vec<InspectionDue>>, ApiError> {
    user.require_any_role(&QHSE_ROLES)?;
    let days = query.days.unwrap_or(UPCOMING_WINDOW_DAYS);
    Ok(Json(app_state.admin.inspections_due(days).await?))
}

pub async fn inspection_history_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(equipment_id): Path<i64>,
) -> Result<Json<Vec<InspectionRecord>>, ApiError> {
    user.require_any_role(&QHSE_ROLES)?;
    Ok(Json(app_state.admin.inspections(equipment_id).await?))
}

/// POST /api/admin/equipment/{id}/inspections
///
/// The caller is recorded as inspector.
pub async fn record_inspection_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(equipment_id): Path<i64>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<InspectionRecord>), ApiError> {
    user.require_any_role(&QHSE_ROLES)?;
    let inspection: NewInspection = parse_body(body)?;
    let record = app_state.admin.record_inspection(equipment_id, user.id, &inspection).await?;
    Ok((StatusCode::CREATED, Json(record)))
}
