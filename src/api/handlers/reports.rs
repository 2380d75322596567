// Regulatory report handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use tracing::info;
use crate::api::handlers::analysis::RangeQuery;
use crate::api::handlers::{OptionalJsonBody, parse_body};
use crate::api::responses::ApiError;
use crate::api::AppState;
use crate::core::models::CurrentUser;
use crate::reports::{catalog, Report, ReportDescriptor, ReportKind};

/// GET /api/reports
pub async fn catalog_handler() -> Json<Vec<ReportDescriptor>> {
    Json(catalog())
}

/// POST /api/reports/{type}
///
/// Optional body `{start, end}` as calendar dates; the default is the last 30 days.
pub async fn generate_report_handler(
    State(app_state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(report_type): Path<String>,
    OptionalJsonBody(body): OptionalJsonBody,
) -> Result<Json<Report>, ApiError> {
    let kind: ReportKind = report_type.parse()?;
    let range: RangeQuery = match body {
        Some(value) => parse_body(value)?,
        _ => RangeQuery { start: None, end: None },
    };
    let period = range.period()?;

    let report = app_state.reports.generate(kind, period).await?;
    info!(report_type = %kind, user_id = user.id, start = %period.start, end = %period.end, "Report generated");
    Ok(Json(report))
}
