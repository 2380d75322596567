// Notification inbox and channel configuration handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use crate::api::handlers::{JsonBody, parse_body};
use crate::api::responses::{ApiError, MessageResponse};
use crate::api::AppState;
use crate::core::errors::QhseError;
use crate::core::models::{CurrentUser, Role};
use crate::notifications::{ChannelConfig, ChannelUpdate, Notification};

#[derive(Debug, Serialize)]
pub struct Inbox {
    pub unread: i64,
    pub notifications: Vec<Notification>,
}

/// Accepts either `{"channels": [..]}` or a bare array
#[derive(Deserialize)]
#[serde(untagged)]
enum ChannelUpdates {
    Wrapped { channels: Vec<ChannelUpdate> },
    Bare(Vec<ChannelUpdate>),
}

/// GET /api/notifications
pub async fn list_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Inbox>, ApiError> {
    let notifications = app_state.notifications.for_user(user.id).await?;
    let unread = app_state.notifications.unread_count(user.id).await?;
    Ok(Json(Inbox { unread, notifications }))
}

/// POST /api/notifications/{id}/read
///
/// Another user's notification is reported as not found.
pub async fn mark_read_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(notification_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !app_state.notifications.mark_read(notification_id, user.id).await? {
        return Err(QhseError::NotFound(format!("Notification {}", notification_id)).into());
    }
    Ok(MessageResponse::new("Notification marked as read"))
}

pub async fn config_handler(State(app_state): State<AppState>) -> Result<Json<Vec<ChannelConfig>>, ApiError> {
    Ok(Json(app_state.notifications.channel_config().await?))
}

/// PUT /api/notifications/config (admin)
pub async fn update_config_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(body): JsonBody,
) -> Result<Json<Vec<ChannelConfig>>, ApiError> {
    user.require_any_role(&[Role::Admin])?;
    let updates = match parse_body::<ChannelUpdates>(body)? {
        ChannelUpdates::Wrapped { channels } => channels,
        ChannelUpdates::Bare(channels) => channels,
    };
    Ok(Json(app_state.notifications.update_channel_config(&updates).await?))
}
