// Sensor types, units and safety thresholds

use crate::core::errors::QhseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Temperature,
    Humidity,
    Noise,
    Vibration,
    Gas,
    Light,
    Pressure,
    AirQuality,
    Motion,
    Weather,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub min: f64,
    pub max: f64,
    pub critical_min: f64,
    pub critical_max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
    Emergency,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
            AlertLevel::Emergency => "emergency",
        }
    }
}

impl FromStr for AlertLevel {
    type Err = QhseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(AlertLevel::Info),
            "warning" => Ok(AlertLevel::Warning),
            "critical" => Ok(AlertLevel::Critical),
            "emergency" => Ok(AlertLevel::Emergency),
            other => Err(QhseError::Validation(format!("Unknown alert level '{}'", other))),
        }
    }
}

/// Outcome of checking a reading against its thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breach {
    pub level: AlertLevel,
    pub alert_type: &'static str,
    /// Warn bound that was crossed
    pub threshold: f64,
}

impl SensorType {
    pub fn all() -> [SensorType; 10] {
        [
            SensorType::Temperature,
            SensorType::Humidity,
            SensorType::Noise,
            SensorType::Vibration,
            SensorType::Gas,
            SensorType::Light,
            SensorType::Pressure,
            SensorType::AirQuality,
            SensorType::Motion,
            SensorType::Weather,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::Temperature => "temperature",
            SensorType::Humidity => "humidity",
            SensorType::Noise => "noise",
            SensorType::Vibration => "vibration",
            SensorType::Gas => "gas",
            SensorType::Light => "light",
            SensorType::Pressure => "pressure",
            SensorType::AirQuality => "air_quality",
            SensorType::Motion => "motion",
            SensorType::Weather => "weather",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            SensorType::Temperature => "°C",
            SensorType::Humidity => "%",
            SensorType::Noise => "dB",
            SensorType::Vibration => "m/s²",
            SensorType::Gas => "ppm",
            SensorType::Light => "lux",
            SensorType::Pressure => "kPa",
            SensorType::AirQuality => "AQI",
            SensorType::Motion | SensorType::Weather => "unit",
        }
    }

    /// Motion and weather sensors are informational and never alert
    pub fn thresholds(&self) -> Option<Thresholds> {
        let (min, max, critical_min, critical_max) = match self {
            SensorType::Temperature => (15.0, 35.0, 5.0, 45.0),
            SensorType::Humidity => (30.0, 70.0, 10.0, 90.0),
            SensorType::Noise => (0.0, 80.0, 0.0, 100.0),
            SensorType::Vibration => (0.0, 2.0, 0.0, 5.0),
            SensorType::Gas => (0.0, 10.0, 0.0, 50.0),
            SensorType::Light => (200.0, 1000.0, 50.0, 2000.0),
            SensorType::Pressure => (95.0, 105.0, 90.0, 110.0),
            SensorType::AirQuality => (0.0, 50.0, 0.0, 100.0),
            SensorType::Motion | SensorType::Weather => return None,
        };
        Some(Thresholds { min, max, critical_min, critical_max })
    }

    /// Range the simulator draws from, with the number of decimals kept
    pub fn simulated_range(&self) -> (Range<f64>, i32) {
        match self {
            SensorType::Temperature => (18.0..25.0, 1),
            SensorType::Humidity => (40.0..60.0, 1),
            SensorType::Noise => (50.0..70.0, 1),
            SensorType::Vibration => (0.5..1.5, 2),
            SensorType::Gas => (0.01..5.0, 2),
            SensorType::Light => (300.0..800.0, 0),
            SensorType::Pressure => (98.0..102.0, 1),
            SensorType::AirQuality => (20.0..40.0, 1),
            SensorType::Motion | SensorType::Weather => (0.0..100.0, 2),
        }
    }

    /// Critical bounds are checked before warn bounds
    pub fn evaluate(&self, value: f64) -> Option<Breach> {
        let t = self.thresholds()?;
        let threshold = if value <= t.min { t.min } else { t.max };

        if value <= t.critical_min || value >= t.critical_max {
            Some(Breach {
                level: AlertLevel::Emergency,
                alert_type: "critical_threshold",
                threshold,
            })
        } else if value <= t.min || value >= t.max {
            Some(Breach {
                level: AlertLevel::Warning,
                alert_type: "threshold_exceeded",
                threshold,
            })
        } else {
            None
        }
    }
}

impl FromStr for SensorType {
    type Err = QhseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorType::all()
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| QhseError::Validation(format!("Unknown sensor type '{}'", s)))
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_bands() {
        assert_eq!(SensorType::Temperature.evaluate(22.0), None);

        let warm = SensorType::Temperature.evaluate(38.0).unwrap();
        assert_eq!(warm.level, AlertLevel::Warning);
        assert_eq!(warm.alert_type, "threshold_exceeded");
        assert_eq!(warm.threshold, 35.0);

        let cold = SensorType::Temperature.evaluate(10.0).unwrap();
        assert_eq!(cold.level, AlertLevel::Warning);
        assert_eq!(cold.threshold, 15.0);

        let fire = SensorType::Temperature.evaluate(45.0).unwrap();
        assert_eq!(fire.level, AlertLevel::Emergency);
        assert_eq!(fire.alert_type, "critical_threshold");
        assert_eq!(fire.threshold, 35.0);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        assert_eq!(SensorType::Gas.evaluate(10.0).unwrap().level, AlertLevel::Warning);
        assert_eq!(SensorType::Noise.evaluate(100.0).unwrap().level, AlertLevel::Emergency);
        // a zero-floor critical bound also catches zero
        assert_eq!(SensorType::Noise.evaluate(0.0).unwrap().level, AlertLevel::Emergency);
    }

    #[test]
    fn test_informational_types_never_alert() {
        assert!(SensorType::Motion.evaluate(1_000.0).is_none());
        assert_eq!(SensorType::Weather.unit(), "unit");
    }

    #[test]
    fn test_simulated_ranges_stay_within_warn_bounds() {
        for sensor_type in SensorType::all() {
            let (range, _) = sensor_type.simulated_range();
            if sensor_type.thresholds().is_some() {
                assert!(sensor_type.evaluate(range.start).is_none(), "{}", sensor_type);
                assert!(sensor_type.evaluate(range.end - 0.01).is_none(), "{}", sensor_type);
            }
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!("air_quality".parse::<SensorType>().unwrap(), SensorType::AirQuality);
        assert!("radar".parse::<SensorType>().is_err());
        assert_eq!("emergency".parse::<AlertLevel>().unwrap(), AlertLevel::Emergency);
    }
}
