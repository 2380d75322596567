// AR/VR training handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use crate::api::handlers::{JsonBody, OptionalJsonBody, found, parse_body};
use crate::api::responses::ApiError;
use crate::api::AppState;
use crate::arvr::{
    DeviceType, EndedSession, NewInteraction, Scene, SceneStatistics, SceneType, SessionSummary, TrainingReport,
};
use crate::core::models::CurrentUser;

const SESSION_HISTORY_LIMIT: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct SceneQuery {
    pub scene_type: Option<String>,
    pub device_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub user_id: Option<i64>,
    pub days: Option<i64>,
}

#[derive(Deserialize)]
struct StartSession {
    scene_id: String,
    device_type: DeviceType,
}

#[derive(Deserialize, Default)]
struct EndSession {
    #[serde(default)]
    score: Option<f64>,
}

/// GET /api/arvr/scenes?scene_type&device_type
pub async fn scenes_handler(
    State(app_state): State<AppState>,
    Query(query): Query<SceneQuery>,
) -> Result<Json<Vec<Scene>>, ApiError> {
    let scene_type = query.scene_type.as_deref().map(str::parse::<SceneType>).transpose()?;
    let device_type = query.device_type.as_deref().map(str::parse::<DeviceType>).transpose()?;
    Ok(Json(app_state.arvr.scenes(scene_type, device_type).await?))
}

/// POST /api/arvr/sessions
pub async fn start_session_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let request: StartSession = parse_body(body)?;
    let session_id = app_state
        .arvr
        .start_session(user.id, &request.scene_id, request.device_type)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "session_id": session_id, "scene_id": request.scene_id })),
    ))
}

/// POST /api/arvr/sessions/{id}/interaction
///
/// 404 once the session has ended.
pub async fn interaction_handler(
    State(app_state): State<AppState>,
    Path(session_id): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<Json<Value>, ApiError> {
    let interaction: NewInteraction = parse_body(body)?;
    let interaction_id = found(
        app_state.arvr.record_interaction(&session_id, &interaction).await?,
        format!("Active session {}", session_id),
    )?;
    Ok(Json(json!({ "interaction_id": interaction_id, "session_id": session_id })))
}

/// POST /api/arvr/sessions/{id}/end
///
/// The body is optional and may carry a `score`.
pub async fn end_session_handler(
    State(app_state): State<AppState>,
    Path(session_id): Path<String>,
    OptionalJsonBody(body): OptionalJsonBody,
) -> Result<Json<EndedSession>, ApiError> {
    let request: EndSession = match body {
        Some(value) => parse_body(value)?,
        _ => EndSession::default(),
    };
    let ended = found(
        app_state.arvr.end_session(&session_id, request.score).await?,
        format!("Active session {}", session_id),
    )?;
    Ok(Json(ended))
}

/// GET /api/arvr/sessions?user_id, defaulting to the caller
pub async fn user_sessions_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    let user_id = query.user_id.unwrap_or(user.id);
    Ok(Json(app_state.arvr.user_sessions(user_id, SESSION_HISTORY_LIMIT).await?))
}

pub async fn scene_statistics_handler(
    State(app_state): State<AppState>,
    Path(scene_id): Path<String>,
) -> Result<Json<SceneStatistics>, ApiError> {
    Ok(Json(app_state.arvr.scene_statistics(&scene_id).await?))
}

/// GET /api/arvr/report?days=30
pub async fn training_report_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<TrainingReport>, ApiError> {
    let user_id = query.user_id.unwrap_or(user.id);
    Ok(Json(app_state.arvr.training_report(user_id, query.days.unwrap_or(30)).await?))
}
