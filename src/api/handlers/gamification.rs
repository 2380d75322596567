// Gamification handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use crate::api::handlers::{JsonBody, found, parse_body};
use crate::api::responses::ApiError;
use crate::api::AppState;
use crate::core::models::{CurrentUser, Role};
use crate::gamification::engine::ProfileView;
use crate::gamification::{
    Badge, Challenge, LeaderboardCategory, LeaderboardEntry, NewChallenge, PointsAward, UserStats,
};

/// Roles allowed to grant points by hand
const AWARDING_ROLES: [Role; 4] = [Role::Admin, Role::Manager, Role::QhseManager, Role::TrainingManager];

#[derive(Deserialize)]
struct NewProfile {
    user_id: Option<i64>,
    username: Option<String>,
}

#[derive(Deserialize)]
struct AwardRequest {
    user_id: i64,
    event_type: String,
    points: i64,
    #[serde(default)]
    description: String,
    #[serde(default)]
    context: Value,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub category: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BadgeQuery {
    pub category: Option<String>,
}

/// GET /api/gamification/profile/{user_id}
pub async fn profile_handler(
    State(app_state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<ProfileView>, ApiError> {
    let profile = found(app_state.gamification.profile(user_id).await?, format!("Profile {}", user_id))?;
    Ok(Json(profile))
}

/// POST /api/gamification/profile
///
/// Defaults to the caller's own profile.
pub async fn create_profile_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<ProfileView>), ApiError> {
    let request: NewProfile = parse_body(body)?;
    let user_id = request.user_id.unwrap_or(user.id);
    let username = match request.username {
        Some(name) => name,
        None if user_id == user.id => user.username.clone(),
        None => {
            let record = found(app_state.user_store.find_by_id(user_id).await?, format!("User {}", user_id))?;
            record.username
        }
    };
    let profile = app_state.gamification.create_profile(user_id, &username).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// POST /api/gamification/award-points
pub async fn award_points_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(body): JsonBody,
) -> Result<Json<PointsAward>, ApiError> {
    user.require_any_role(&AWARDING_ROLES)?;
    let request: AwardRequest = parse_body(body)?;
    let context = if request.context.is_null() {
        json!({ "awarded_by": user.id })
    } else {
        request.context
    };
    let award = app_state
        .gamification
        .award_points(request.user_id, &request.event_type, request.points, &request.description, context)
        .await?;
    Ok(Json(award))
}

/// GET /api/gamification/leaderboard?category=all&limit=10
pub async fn leaderboard_handler(
    State(app_state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    let category = match query.category.as_deref() {
        Some(c) => c.parse::<LeaderboardCategory>()?,
        None => LeaderboardCategory::All,
    };
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    Ok(Json(app_state.gamification.leaderboard(category, limit).await?))
}

pub async fn badges_handler(
    State(app_state): State<AppState>,
    Query(query): Query<BadgeQuery>,
) -> Json<Vec<&'static Badge>> {
    Json(app_state.gamification.badges(query.category.as_deref()))
}

pub async fn create_challenge_handler(
    State(app_state): State<AppState>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<Challenge>), ApiError> {
    let challenge: NewChallenge = parse_body(body)?;
    Ok((StatusCode::CREATED, Json(app_state.gamification.create_challenge(&challenge).await?)))
}

/// POST /api/gamification/challenges/{id}/join
pub async fn join_challenge_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(challenge_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let joined = app_state.gamification.join_challenge(user.id, &challenge_id).await?;
    Ok(Json(json!({ "challenge_id": challenge_id, "joined": joined })))
}

pub async fn user_stats_handler(
    State(app_state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<UserStats>, ApiError> {
    let stats = found(app_state.gamification.user_stats(user_id).await?, format!("Profile {}", user_id))?;
    Ok(Json(stats))
}
