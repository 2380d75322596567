// Training and certification handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use crate::api::handlers::analysis::RangeQuery;
use crate::api::handlers::{JsonBody, OptionalJsonBody, parse_body};
use crate::api::responses::ApiError;
use crate::api::AppState;
use crate::core::errors::QhseError;
use crate::core::models::{CurrentUser, Role};
use crate::training::{
    Certification, CompletionOutcome, ExpiringCertification, NewSession, NewTraining, Training, TrainingCategory,
    TrainingPlan, TrainingSession, TrainingStatistics, DEFAULT_SECTOR,
};

const SCHEDULING_ROLES: [Role; 2] = [Role::Admin, Role::TrainingManager];

#[derive(Deserialize, Default)]
struct EnrollRequest {
    #[serde(default)]
    user_id: Option<i64>,
}

#[derive(Deserialize)]
struct CompletionRequest {
    score: f64,
}

#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SectorQuery {
    pub sector: Option<String>,
}

pub async fn trainings_handler(State(app_state): State<AppState>) -> Result<Json<Vec<Training>>, ApiError> {
    Ok(Json(app_state.training.trainings().await?))
}

/// POST /api/training
pub async fn create_training_handler(
    State(app_state): State<AppState>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<Training>), ApiError> {
    let training: NewTraining = parse_body(body)?;
    Ok((StatusCode::CREATED, Json(app_state.training.create_training(&training).await?)))
}

pub async fn categories_handler(State(app_state): State<AppState>) -> Json<&'static [TrainingCategory]> {
    Json(app_state.training.categories())
}

/// POST /api/training/sessions
///
/// Admins and training managers only; the trainer defaults to the caller.
pub async fn schedule_session_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<TrainingSession>), ApiError> {
    user.require_any_role(&SCHEDULING_ROLES)?;
    let session: NewSession = parse_body(body)?;
    let trainer_id = session.trainer_id.unwrap_or(user.id);
    Ok((
        StatusCode::CREATED,
        Json(app_state.training.schedule_session(&session, trainer_id).await?),
    ))
}

/// POST /api/training/sessions/{id}/enroll
///
/// Enrolls the caller unless the body names another `user_id`.
pub async fn enroll_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(session_id): Path<i64>,
    OptionalJsonBody(body): OptionalJsonBody,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let request: EnrollRequest = match body {
        Some(value) => parse_body(value)?,
        _ => EnrollRequest::default(),
    };
    let user_id = request.user_id.unwrap_or(user.id);
    let participation_id = app_state.training.enroll(session_id, user_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "participation_id": participation_id, "session_id": session_id, "user_id": user_id })),
    ))
}

/// POST /api/training/participations/{id}/complete
pub async fn complete_handler(
    State(app_state): State<AppState>,
    Path(participation_id): Path<i64>,
    JsonBody(body): JsonBody,
) -> Result<Json<CompletionOutcome>, ApiError> {
    let request: CompletionRequest = parse_body(body)?;
    Ok(Json(app_state.training.complete_training(participation_id, request.score).await?))
}

pub async fn certifications_handler(
    State(app_state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Certification>>, ApiError> {
    Ok(Json(app_state.training.certifications(user_id).await?))
}

/// GET /api/training/expiring?days=30
pub async fn expiring_handler(
    State(app_state): State<AppState>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<Vec<ExpiringCertification>>, ApiError> {
    let days = query.days.unwrap_or(30);
    if days <= 0 {
        return Err(QhseError::Validation("days must be positive".to_string()).into());
    }
    Ok(Json(app_state.training.expiring(days).await?))
}

/// GET /api/training/plan/{user_id}?sector
pub async fn plan_handler(
    State(app_state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<SectorQuery>,
) -> Result<Json<TrainingPlan>, ApiError> {
    let sector = query.sector.as_deref().unwrap_or(DEFAULT_SECTOR);
    Ok(Json(app_state.training.training_plan(user_id, sector).await?))
}

/// GET /api/training/statistics?start&end
pub async fn statistics_handler(
    State(app_state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<TrainingStatistics>, ApiError> {
    let period = range.period()?;
    Ok(Json(app_state.training.statistics(period.start, period.end).await?))
}
