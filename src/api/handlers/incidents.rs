// Incident reporting handlers

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use crate::api::handlers::{JsonBody, found, parse_body};
use crate::api::middleware::request_id;
use crate::api::responses::{ApiError, IncidentCreated, MessageResponse};
use crate::api::AppState;
use crate::core::errors::QhseError;
use crate::core::models::{CurrentUser, Severity};
use crate::incidents::{
    predict_risk, reply, ChatReply, CorrectiveAction, DashboardSummary, IncidentFilter, IncidentStatistics,
    IncidentType, IncidentView, NewCorrectiveAction, NewIncident, RiskPrediction, RiskPredictionInput, Sector,
};
use crate::notifications::IncidentAlert;

/// Points credited to the reporter of an incident
const REPORT_POINTS: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct IncidentQuery {
    pub sector: Option<String>,
    pub severity: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
struct StatusUpdate {
    status: String,
}

#[derive(Deserialize)]
struct ChatMessage {
    message: String,
}

pub async fn sectors_handler(State(app_state): State<AppState>) -> Result<Json<Vec<Sector>>, ApiError> {
    Ok(Json(app_state.incidents.sectors().await?))
}

pub async fn incident_types_handler(State(app_state): State<AppState>) -> Result<Json<Vec<IncidentType>>, ApiError> {
    Ok(Json(app_state.incidents.incident_types().await?))
}

/// GET /api/incidents?sector&severity&status&limit
pub async fn list_incidents_handler(
    State(app_state): State<AppState>,
    Query(query): Query<IncidentQuery>,
) -> Result<Json<Vec<IncidentView>>, ApiError> {
    let severity = query.severity.as_deref().map(str::parse::<Severity>).transpose()?;
    let mut filter = IncidentFilter {
        sector: query.sector,
        severity,
        status: query.status,
        ..IncidentFilter::default()
    };
    if let Some(limit) = query.limit {
        if limit <= 0 {
            return Err(QhseError::Validation("limit must be positive".to_string()).into());
        }
        filter.limit = limit;
    }
    Ok(Json(app_state.incidents.list(&filter).await?))
}

/// POST /api/incidents
///
/// Alerts and reporter points are best-effort; their failures never fail the report.
pub async fn create_incident_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    headers: HeaderMap,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<IncidentCreated>), ApiError> {
    let request_id = request_id(&headers);
    let incident: NewIncident =
        parse_body(body).map_err(|e| ApiError::from_qhse_error_with_id(e, request_id.clone()))?;

    let (id, risk_score) = app_state
        .incidents
        .create(&incident, Some(user.id))
        .await
        .map_err(|e| ApiError::from_qhse_error_with_id(e, request_id.clone()))?;
    app_state.metrics.incidents_reported.inc();

    let incident_type_name = match app_state.incidents.get(id).await {
        Ok(view) => view.map(|v| v.incident_type_name),
        Err(e) => {
            warn!(error = %e, incident_id = id, "Could not reload incident for alerting");
            None
        }
    };
    let alert = IncidentAlert {
        incident_id: id,
        title: incident.title.clone(),
        severity_level: incident.severity_level.as_str().to_string(),
        risk_score,
        location: incident.location.clone(),
        incident_type_name,
        ai_recommendations: incident.ai_recommendations.clone(),
        reported_by: Some(user.id),
    };
    match app_state.notifications.incident_alert(&alert).await {
        Ok(Some(outcome)) => info!(
            incident_id = id,
            notification_type = outcome.notification_type,
            recipients = outcome.recipients,
            request_id = %request_id,
            "Incident alert dispatched"
        ),
        Ok(None) => {}
        Err(e) => warn!(error = %e, incident_id = id, "Incident alert failed"),
    }

    match app_state
        .gamification
        .award_points(user.id, "incident_reported", REPORT_POINTS, "Signalement d'incident", json!({ "incident_id": id }))
        .await
    {
        Ok(_) | Err(QhseError::NotFound(_)) => {}
        Err(e) => warn!(error = %e, user_id = user.id, "Could not award reporting points"),
    }

    Ok((
        StatusCode::CREATED,
        Json(IncidentCreated {
            id,
            risk_score,
            message: "Incident reported".to_string(),
        }),
    ))
}

pub async fn get_incident_handler(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<IncidentView>, ApiError> {
    let incident = found(app_state.incidents.get(id).await?, format!("Incident {}", id))?;
    Ok(Json(incident))
}

/// PUT /api/incidents/{id}/status
pub async fn update_status_handler(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody,
) -> Result<Json<MessageResponse>, ApiError> {
    let update: StatusUpdate = parse_body(body)?;
    app_state.incidents.update_status(id, &update.status).await?;
    Ok(MessageResponse::new(format!("Incident {} is now {}", id, update.status)))
}

pub async fn list_actions_handler(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<CorrectiveAction>>, ApiError> {
    found(app_state.incidents.get(id).await?, format!("Incident {}", id))?;
    Ok(Json(app_state.incidents.corrective_actions(id).await?))
}

pub async fn add_action_handler(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let action: NewCorrectiveAction = parse_body(body)?;
    let action_id = app_state.incidents.add_corrective_action(id, &action).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": action_id, "incident_id": id }))))
}

pub async fn dashboard_handler(State(app_state): State<AppState>) -> Result<Json<DashboardSummary>, ApiError> {
    Ok(Json(app_state.incidents.dashboard().await?))
}

pub async fn statistics_handler(State(app_state): State<AppState>) -> Result<Json<IncidentStatistics>, ApiError> {
    Ok(Json(app_state.incidents.statistics().await?))
}

pub async fn high_risk_handler(State(app_state): State<AppState>) -> Result<Json<Vec<IncidentView>>, ApiError> {
    Ok(Json(app_state.incidents.high_risk().await?))
}

/// POST /api/predict
pub async fn predict_handler(JsonBody(body): JsonBody) -> Result<Json<RiskPrediction>, ApiError> {
    let input: RiskPredictionInput = parse_body(body)?;
    Ok(Json(predict_risk(&input)))
}

/// POST /api/chatbot
pub async fn chatbot_handler(JsonBody(body): JsonBody) -> Result<Json<ChatReply>, ApiError> {
    let message: ChatMessage = parse_body(body)?;
    if message.message.trim().is_empty() {
        return Err(QhseError::Validation("message is required".to_string()).into());
    }
    Ok(Json(reply(&message.message)))
}
