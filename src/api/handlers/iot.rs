// Sensor and alert handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use crate::api::handlers::{JsonBody, parse_body};
use crate::api::responses::{ApiError, MessageResponse};
use crate::api::AppState;
use crate::core::errors::QhseError;
use crate::iot::{AlertLevel, NewSensor, Sensor, SensorAlert, SensorReading, SensorStatusSummary};

#[derive(Debug, Deserialize)]
pub struct HoursQuery {
    pub hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    pub level: Option<String>,
    pub acknowledged: Option<bool>,
}

#[derive(Deserialize)]
struct NewReading {
    value: f64,
    #[serde(default)]
    unit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReadingRecorded {
    pub sensor_id: String,
    pub value: f64,
    pub alert: Option<SensorAlert>,
}

pub async fn sensors_handler(State(app_state): State<AppState>) -> Result<Json<Vec<Sensor>>, ApiError> {
    Ok(Json(app_state.iot.sensors().await?))
}

pub async fn status_handler(State(app_state): State<AppState>) -> Result<Json<SensorStatusSummary>, ApiError> {
    Ok(Json(app_state.iot.status_summary().await?))
}

/// POST /api/iot/sensors
pub async fn add_sensor_handler(
    State(app_state): State<AppState>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<Sensor>), ApiError> {
    let sensor: NewSensor = parse_body(body)?;
    Ok((StatusCode::CREATED, Json(app_state.iot.add_sensor(&sensor).await?)))
}

/// DELETE /api/iot/sensors/{id}
pub async fn remove_sensor_handler(
    State(app_state): State<AppState>,
    Path(sensor_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !app_state.iot.remove_sensor(&sensor_id).await? {
        return Err(QhseError::NotFound(format!("Sensor {}", sensor_id)).into());
    }
    Ok(MessageResponse::new(format!("Sensor {} removed", sensor_id)))
}

/// GET /api/iot/sensors/{id}/data?hours=24
pub async fn sensor_data_handler(
    State(app_state): State<AppState>,
    Path(sensor_id): Path<String>,
    Query(query): Query<HoursQuery>,
) -> Result<Json<Vec<SensorReading>>, ApiError> {
    if app_state.iot.sensor(&sensor_id).await?.is_none() {
        return Err(QhseError::NotFound(format!("Sensor {}", sensor_id)).into());
    }
    Ok(Json(app_state.iot.sensor_data(&sensor_id, query.hours.unwrap_or(24)).await?))
}

/// POST /api/iot/sensors/{id}/readings
pub async fn record_reading_handler(
    State(app_state): State<AppState>,
    Path(sensor_id): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<ReadingRecorded>), ApiError> {
    let reading: NewReading = parse_body(body)?;
    let alert = app_state
        .iot
        .record_reading(&sensor_id, reading.value, reading.unit.as_deref())
        .await?;
    if alert.is_some() {
        app_state.metrics.sensor_alerts.inc();
    }
    Ok((
        StatusCode::CREATED,
        Json(ReadingRecorded {
            sensor_id,
            value: reading.value,
            alert,
        }),
    ))
}

/// GET /api/iot/alerts?level&acknowledged
pub async fn alerts_handler(
    State(app_state): State<AppState>,
    Query(query): Query<AlertQuery>,
) -> Result<Json<Vec<SensorAlert>>, ApiError> {
    let level = query.level.as_deref().map(str::parse::<AlertLevel>).transpose()?;
    Ok(Json(app_state.iot.alerts(level, query.acknowledged).await?))
}

pub async fn acknowledge_alert_handler(
    State(app_state): State<AppState>,
    Path(alert_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !app_state.iot.acknowledge_alert(&alert_id).await? {
        return Err(QhseError::NotFound(format!("Alert {}", alert_id)).into());
    }
    Ok(MessageResponse::new("Alert acknowledged"))
}

pub async fn resolve_alert_handler(
    State(app_state): State<AppState>,
    Path(alert_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !app_state.iot.resolve_alert(&alert_id).await? {
        return Err(QhseError::NotFound(format!("Alert {}", alert_id)).into());
    }
    Ok(MessageResponse::new("Alert resolved"))
}
