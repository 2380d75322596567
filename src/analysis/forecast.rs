// Incident forecasting from recent daily counts

use crate::core::errors::QhseError;
use crate::core::models::round_to;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::debug;

/// Days of history behind the baseline rate
pub const BASELINE_DAYS: i64 = 30;
/// Days behind the short-term rate used for the trend
pub const MOVING_AVERAGE_DAYS: i64 = 7;
pub const MAX_HORIZON_DAYS: i64 = 365;

const CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, Serialize)]
pub struct DailyPrediction {
    pub date: NaiveDate,
    pub predicted_incidents: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendAnalysis {
    pub current_trend: &'static str,
    pub risk_level: &'static str,
    pub daily_average: f64,
    pub moving_average: f64,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncidentForecast {
    pub predictions: Vec<DailyPrediction>,
    pub trend_analysis: TrendAnalysis,
}

fn daily_rate(counts: &BTreeMap<NaiveDate, i64>, today: NaiveDate, window: i64) -> f64 {
    let first = today - Duration::days(window - 1);
    let total: i64 = counts.range(first..=today).map(|(_, n)| n).sum();
    total as f64 / window as f64
}

pub fn trend_recommendations(daily_average: f64) -> Vec<String> {
    let items: &[&str] = if daily_average > 2.0 {
        &[
            "Tendance à la hausse - Renforcement des contrôles",
            "Audit complet des procédures",
            "Formation d'urgence du personnel",
        ]
    } else if daily_average > 1.0 {
        &[
            "Surveillance renforcée recommandée",
            "Vérification des équipements de protection",
        ]
    } else {
        &[
            "Tendance stable - Maintien des bonnes pratiques",
            "Formation continue recommandée",
        ]
    };
    items.iter().map(|s| s.to_string()).collect()
}

/// Project the last `BASELINE_DAYS` rate over `horizon` days after `today`
///
/// The trend compares the last week with the baseline: more than 20% above
/// is increasing, more than 20% below is decreasing.
pub fn forecast(incident_dates: &[NaiveDate], today: NaiveDate, horizon: i64) -> IncidentForecast {
    let mut counts: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for date in incident_dates {
        *counts.entry(*date).or_insert(0) += 1;
    }

    let daily_average = daily_rate(&counts, today, BASELINE_DAYS);
    let moving_average = daily_rate(&counts, today, MOVING_AVERAGE_DAYS);
    let current_trend = if moving_average > daily_average * 1.2 {
        "increasing"
    } else if moving_average < daily_average * 0.8 {
        "decreasing"
    } else {
        "stable"
    };

    let predicted_incidents = round_to(daily_average, 1);
    let predictions = (1..=horizon)
        .map(|offset| DailyPrediction {
            date: today + Duration::days(offset),
            predicted_incidents,
            confidence: CONFIDENCE,
        })
        .collect();

    IncidentForecast {
        predictions,
        trend_analysis: TrendAnalysis {
            current_trend,
            risk_level: if daily_average > 1.0 { "medium" } else { "low" },
            daily_average: round_to(daily_average, 2),
            moving_average: round_to(moving_average, 2),
            recommendations: trend_recommendations(daily_average),
        },
    }
}

#[derive(Clone)]
pub struct IncidentForecaster {
    db_pool: SqlitePool,
}

impl IncidentForecaster {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn predict(&self, horizon: i64) -> Result<IncidentForecast, QhseError> {
        if !(1..=MAX_HORIZON_DAYS).contains(&horizon) {
            return Err(QhseError::Validation(format!(
                "days must be between 1 and {}",
                MAX_HORIZON_DAYS
            )));
        }
        let now = Utc::now();
        let today = now.date_naive();
        let since = (today - Duration::days(BASELINE_DAYS - 1))
            .and_hms_opt(0, 0, 0)
            .map(|d| d.and_utc())
            .unwrap_or(now);

        let created: Vec<DateTime<Utc>> =
            sqlx::query_scalar("SELECT created_at FROM incident_reports WHERE created_at >= ?")
                .bind(since)
                .fetch_all(&self.db_pool)
                .await?;
        debug!(incidents = created.len(), horizon, "Forecasting incidents");

        let dates: Vec<NaiveDate> = created.iter().map(|c| c.date_naive()).collect();
        Ok(forecast(&dates, today, horizon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_quiet_history() {
        let result = forecast(&[], day(30), 3);
        assert_eq!(result.predictions.len(), 3);
        assert_eq!(result.predictions[0].date, day(31));
        assert!(result.predictions.iter().all(|p| p.predicted_incidents == 0.0));
        assert_eq!(result.trend_analysis.current_trend, "stable");
        assert_eq!(result.trend_analysis.risk_level, "low");
        assert_eq!(result.trend_analysis.recommendations.len(), 2);
    }

    #[test]
    fn test_recent_burst_is_increasing() {
        // 45 incidents in the last week, none before
        let dates: Vec<NaiveDate> = (24..=30).flat_map(|d| std::iter::repeat(day(d)).take(9)).take(45).collect();
        let result = forecast(&dates, day(30), 1);
        assert_eq!(result.trend_analysis.daily_average, 1.5);
        assert_eq!(result.predictions[0].predicted_incidents, 1.5);
        assert_eq!(result.trend_analysis.current_trend, "increasing");
        assert_eq!(result.trend_analysis.risk_level, "medium");
        assert_eq!(
            result.trend_analysis.recommendations[0],
            "Surveillance renforcée recommandée"
        );
    }

    #[test]
    fn test_history_outside_window_is_ignored() {
        let dates = vec![day(1), day(1), day(2)];
        let result = forecast(&dates, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), 1);
        assert_eq!(result.trend_analysis.daily_average, 0.0);
    }

    #[test]
    fn test_older_incidents_make_a_decreasing_trend() {
        let dates: Vec<NaiveDate> = (1..=20).map(day).collect();
        let result = forecast(&dates, day(30), 1);
        assert_eq!(result.trend_analysis.moving_average, 0.0);
        assert_eq!(result.trend_analysis.current_trend, "decreasing");
    }

    #[tokio::test]
    async fn test_horizon_bounds() {
        let forecaster = IncidentForecaster::new(crate::db::connect_in_memory().await.unwrap());
        assert!(matches!(forecaster.predict(0).await, Err(QhseError::Validation(_))));
        assert!(matches!(forecaster.predict(366).await, Err(QhseError::Validation(_))));
        assert_eq!(forecaster.predict(30).await.unwrap().predictions.len(), 30);
    }
}
