// Health, metrics and the cross-module dashboard

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use crate::api::responses::{ApiError, HealthResponse};
use crate::api::AppState;
use crate::db;
use crate::iot::SensorStatusSummary;
use crate::ledger::LedgerStats;
use crate::suppliers::SupplierStatistics;

/// Health check handler
///
/// GET /health
///
/// 503 when the database does not answer a ping within 800ms.
pub async fn health_handler(State(app_state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let ledger_blocks = app_state.ledger.block_count().await;

    let (status, database) = match tokio::time::timeout(Duration::from_millis(800), db::ping(&app_state.db_pool)).await {
        Ok(Ok(())) => (StatusCode::OK, "connected".to_string()),
        Ok(Err(e)) => {
            warn!(error = %e, "Database ping failed");
            (StatusCode::SERVICE_UNAVAILABLE, "disconnected".to_string())
        }
        Err(_) => {
            debug!("Database ping timed out in health check");
            (StatusCode::SERVICE_UNAVAILABLE, "timeout".to_string())
        }
    };

    let label = if status == StatusCode::OK { "healthy" } else { "unhealthy" };
    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            database,
            ledger_blocks,
        }),
    )
}

/// GET /metrics
///
/// Prometheus text format.
pub async fn metrics_handler(State(app_state): State<AppState>) -> Result<String, ApiError> {
    let blocks = app_state.ledger.block_count().await;
    app_state.metrics.ledger_blocks.set(blocks as i64);
    Ok(app_state.metrics.render()?)
}

#[derive(Debug, Serialize)]
pub struct IncidentCounts {
    pub total: i64,
    pub last_7_days: i64,
    pub resolution_rate: f64,
    pub high_risk: usize,
}

#[derive(Debug, Serialize)]
pub struct ArvrCounts {
    pub total_sessions: i64,
    pub active_sessions: i64,
}

#[derive(Debug, Serialize)]
pub struct AdvancedDashboard {
    pub incidents: IncidentCounts,
    pub iot: SensorStatusSummary,
    pub gamification_profiles: i64,
    pub ledger: LedgerStats,
    pub suppliers: SupplierStatistics,
    pub arvr: ArvrCounts,
    pub timestamp: DateTime<Utc>,
}

/// GET /api/dashboard/advanced
pub async fn advanced_dashboard_handler(
    State(app_state): State<AppState>,
) -> Result<Json<AdvancedDashboard>, ApiError> {
    let summary = app_state.incidents.dashboard().await?;
    let high_risk = app_state.incidents.high_risk().await?.len();
    let iot = app_state.iot.status_summary().await?;
    let gamification_profiles = app_state.gamification.profile_count().await?;
    let ledger = app_state.ledger.stats().await;
    let suppliers = app_state.suppliers.statistics().await?;
    let (total_sessions, active_sessions) = app_state.arvr.session_counts().await?;

    Ok(Json(AdvancedDashboard {
        incidents: IncidentCounts {
            total: summary.total_incidents,
            last_7_days: summary.recent_incidents_7d,
            resolution_rate: summary.resolution_rate,
            high_risk,
        },
        iot,
        gamification_profiles,
        ledger,
        suppliers,
        arvr: ArvrCounts {
            total_sessions,
            active_sessions,
        },
        timestamp: Utc::now(),
    }))
}
