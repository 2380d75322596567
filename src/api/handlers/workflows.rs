// Approval workflow handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use crate::api::handlers::analysis::RangeQuery;
use crate::api::handlers::{JsonBody, found, parse_body};
use crate::api::responses::ApiError;
use crate::api::AppState;
use crate::core::errors::QhseError;
use crate::core::models::CurrentUser;
use crate::workflows::{
    NewWorkflow, StepAction, StepOutcome, Workflow, WorkflowDetail, WorkflowMetrics, WorkflowTemplate,
    WORKFLOW_TEMPLATES,
};

#[derive(Debug, Deserialize)]
pub struct RoleQuery {
    pub role: Option<String>,
}

#[derive(Deserialize)]
struct StepRequest {
    action: StepAction,
    #[serde(default)]
    comment: Option<String>,
}

/// GET /api/workflows?role, defaulting to the caller's role
pub async fn user_workflows_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<RoleQuery>,
) -> Result<Json<Vec<Workflow>>, ApiError> {
    let role = query.role.unwrap_or_else(|| user.role.as_str().to_string());
    Ok(Json(app_state.workflows.user_workflows(&role).await?))
}

pub async fn templates_handler() -> Json<&'static [WorkflowTemplate]> {
    Json(&WORKFLOW_TEMPLATES)
}

/// POST /api/workflows
pub async fn create_workflow_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<WorkflowDetail>), ApiError> {
    let request: NewWorkflow = parse_body(body)?;
    Ok((StatusCode::CREATED, Json(app_state.workflows.create(&request, user.id).await?)))
}

pub async fn get_workflow_handler(
    State(app_state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<WorkflowDetail>, ApiError> {
    let workflow = found(app_state.workflows.get(&workflow_id).await?, format!("Workflow {}", workflow_id))?;
    Ok(Json(workflow))
}

/// POST /api/workflows/{id}/steps/{step_id}
///
/// Every failure to apply the action, including an unknown step, is a 400.
pub async fn execute_step_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((workflow_id, step_id)): Path<(String, String)>,
    JsonBody(body): JsonBody,
) -> Result<Json<StepOutcome>, ApiError> {
    let request: StepRequest = parse_body(body)?;
    let outcome = app_state
        .workflows
        .execute_step(&workflow_id, &step_id, request.action, user.id, request.comment.as_deref())
        .await
        .map_err(|e| match e {
            QhseError::NotFound(what) => QhseError::Validation(format!("{} not found", what)),
            other => other,
        })?;
    Ok(Json(outcome))
}

/// GET /api/workflows/metrics?start&end
pub async fn metrics_handler(
    State(app_state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<WorkflowMetrics>, ApiError> {
    let period = range.period()?;
    Ok(Json(app_state.workflows.metrics(period.start, period.end).await?))
}
