// Prometheus counters exposed on /metrics

use crate::core::errors::QhseError;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Application counters registered on a private registry
pub struct Metrics {
    registry: Registry,
    pub logins: IntCounterVec,
    pub incidents_reported: IntCounter,
    pub sensor_alerts: IntCounter,
    pub ledger_blocks: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self, QhseError> {
        let registry = Registry::new_custom(Some("qhse".to_string()), None).map_err(metrics_error)?;

        let logins = IntCounterVec::new(Opts::new("logins_total", "Login attempts by outcome"), &["outcome"])
            .map_err(metrics_error)?;
        let incidents_reported =
            IntCounter::new("incidents_reported_total", "Incidents created through the API").map_err(metrics_error)?;
        let sensor_alerts =
            IntCounter::new("sensor_alerts_total", "Alerts raised by readings posted to the API").map_err(metrics_error)?;
        let ledger_blocks = IntGauge::new("ledger_blocks", "Blocks in the ledger chain").map_err(metrics_error)?;

        registry.register(Box::new(logins.clone())).map_err(metrics_error)?;
        registry.register(Box::new(incidents_reported.clone())).map_err(metrics_error)?;
        registry.register(Box::new(sensor_alerts.clone())).map_err(metrics_error)?;
        registry.register(Box::new(ledger_blocks.clone())).map_err(metrics_error)?;

        Ok(Self {
            registry,
            logins,
            incidents_reported,
            sensor_alerts,
            ledger_blocks,
        })
    }

    /// Text exposition format
    pub fn render(&self) -> Result<String, QhseError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| QhseError::ConfigurationError(e.to_string()))
    }
}

fn metrics_error(err: prometheus::Error) -> QhseError {
    QhseError::ConfigurationError(format!("metrics: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_prefixed_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.logins.with_label_values(&["success"]).inc();
        metrics.incidents_reported.inc_by(3);
        let text = metrics.render().unwrap();
        assert!(text.contains("qhse_logins_total{outcome=\"success\"} 1"));
        assert!(text.contains("qhse_incidents_reported_total 3"));
    }
}
