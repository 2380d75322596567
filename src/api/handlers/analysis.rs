// Text analysis, sentiment and cost analytics handlers

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;
use crate::analysis::cost::{CostReport, CostTrends};
use crate::analysis::{analyze_sentiment, cost, CostEstimate, CostInput, IncidentForecast, SentimentReport, TextAnalysis};
use crate::api::handlers::{JsonBody, parse_body};
use crate::api::responses::ApiError;
use crate::api::AppState;
use crate::core::errors::QhseError;
use crate::reports::ReportPeriod;

#[derive(Deserialize)]
struct AnalyzeRequest {
    text: String,
    #[serde(default)]
    sector: Option<String>,
}

/// A single text or a batch
#[derive(Deserialize)]
#[serde(untagged)]
enum SentimentInput {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
struct SentimentRequest {
    text: SentimentInput,
}

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub days: Option<i64>,
}

/// Calendar dates; the end date is inclusive
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl RangeQuery {
    pub fn period(&self) -> Result<ReportPeriod, QhseError> {
        let start = self.start.and_then(|d| d.and_hms_opt(0, 0, 0)).map(|d| d.and_utc());
        let end = self.end.and_then(|d| d.and_hms_opt(23, 59, 59)).map(|d| d.and_utc());
        ReportPeriod::new(start, end)
    }
}

/// POST /api/ai/analyze-text
pub async fn analyze_text_handler(
    State(app_state): State<AppState>,
    JsonBody(body): JsonBody,
) -> Result<Json<TextAnalysis>, ApiError> {
    let request: AnalyzeRequest = parse_body(body)?;
    if request.text.trim().is_empty() {
        return Err(QhseError::Validation("text is required".to_string()).into());
    }
    let analysis = app_state
        .text_analyzer
        .analyze(&request.text, request.sector.as_deref())
        .await?;
    info!(risk_level = analysis.risk_level, source = %analysis.source, "Text analyzed");
    Ok(Json(analysis))
}

/// POST /api/ai/sentiment-analysis
pub async fn sentiment_handler(JsonBody(body): JsonBody) -> Result<Json<SentimentReport>, ApiError> {
    let request: SentimentRequest = parse_body(body)?;
    let texts = match request.text {
        SentimentInput::One(text) => vec![text],
        SentimentInput::Many(texts) => texts,
    };
    if texts.is_empty() {
        return Err(QhseError::Validation("text must not be empty".to_string()).into());
    }
    Ok(Json(analyze_sentiment(&texts)))
}

/// GET /api/ai/predict-incidents?days=30
pub async fn predict_incidents_handler(
    State(app_state): State<AppState>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<IncidentForecast>, ApiError> {
    let forecast = app_state.forecaster.predict(query.days.unwrap_or(30)).await?;
    info!(
        horizon = forecast.predictions.len(),
        trend = forecast.trend_analysis.current_trend,
        "Incident forecast computed"
    );
    Ok(Json(forecast))
}

/// POST /api/analytics/cost-prediction
pub async fn cost_prediction_handler(JsonBody(body): JsonBody) -> Result<Json<CostEstimate>, ApiError> {
    let input: CostInput = parse_body(body)?;
    Ok(Json(cost::estimate(&input)))
}

/// GET /api/analytics/cost-trends?days=365
pub async fn cost_trends_handler(
    State(app_state): State<AppState>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<CostTrends>, ApiError> {
    let days = query.days.unwrap_or(365);
    if days <= 0 {
        return Err(QhseError::Validation("days must be positive".to_string()).into());
    }
    Ok(Json(app_state.cost_model.trends(days).await?))
}

/// GET /api/analytics/cost-report?start&end
pub async fn cost_report_handler(
    State(app_state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<CostReport>, ApiError> {
    let period = query.period()?;
    Ok(Json(app_state.cost_model.report(period.start, period.end).await?))
}
