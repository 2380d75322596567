// Sensor registry, readings and threshold alerts

use crate::core::errors::QhseError;
use crate::iot::thresholds::{AlertLevel, SensorType};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Sensor {
    pub id: String,
    pub name: String,
    pub sensor_type: String,
    pub location: String,
    pub zone: String,
    pub status: String,
    pub battery_level: f64,
    pub signal_strength: f64,
    pub last_update: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Sensor {
    pub fn kind(&self) -> Result<SensorType, QhseError> {
        self.sensor_type.parse()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSensor {
    pub id: String,
    pub name: String,
    pub sensor_type: SensorType,
    pub location: String,
    #[serde(default = "default_zone")]
    pub zone: String,
}

fn default_zone() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SensorReading {
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SensorAlert {
    #[sqlx(rename = "id")]
    pub alert_id: String,
    pub sensor_id: String,
    pub alert_type: String,
    pub level: String,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    pub timestamp: DateTime<Utc>,
    pub location: String,
    pub acknowledged: bool,
    pub resolved: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SensorStatusSummary {
    pub total_sensors: usize,
    pub active_sensors: usize,
    pub inactive_sensors: usize,
    pub low_battery: usize,
    pub active_alerts: i64,
    pub sensors: Vec<Sensor>,
}

const SENSOR_COLUMNS: &str =
    "id, name, sensor_type, location, zone, status, battery_level, signal_strength, last_update, created_at";

#[derive(Clone)]
pub struct IotManager {
    db_pool: SqlitePool,
}

impl IotManager {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn sensors(&self) -> Result<Vec<Sensor>, QhseError> {
        let rows = sqlx::query_as::<_, Sensor>(&format!("SELECT {} FROM iot_sensors ORDER BY id", SENSOR_COLUMNS))
            .fetch_all(&self.db_pool)
            .await?;
        Ok(rows)
    }

    pub async fn active_sensors(&self) -> Result<Vec<Sensor>, QhseError> {
        let rows = sqlx::query_as::<_, Sensor>(&format!(
            "SELECT {} FROM iot_sensors WHERE status = 'active' ORDER BY id",
            SENSOR_COLUMNS
        ))
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows)
    }

    pub async fn sensor(&self, sensor_id: &str) -> Result<Option<Sensor>, QhseError> {
        let row = sqlx::query_as::<_, Sensor>(&format!("SELECT {} FROM iot_sensors WHERE id = ?", SENSOR_COLUMNS))
            .bind(sensor_id)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(row)
    }

    pub async fn add_sensor(&self, sensor: &NewSensor) -> Result<Sensor, QhseError> {
        if sensor.id.trim().is_empty() || sensor.name.trim().is_empty() {
            return Err(QhseError::Validation("id and name are required".to_string()));
        }
        if self.sensor(&sensor.id).await?.is_some() {
            return Err(QhseError::Conflict(format!("Sensor {} already exists", sensor.id)));
        }

        sqlx::query(
            "INSERT INTO iot_sensors (id, name, sensor_type, location, zone, status, battery_level, signal_strength, created_at)
             VALUES (?, ?, ?, ?, ?, 'active', 100.0, 100.0, ?)",
        )
        .bind(&sensor.id)
        .bind(&sensor.name)
        .bind(sensor.sensor_type.as_str())
        .bind(&sensor.location)
        .bind(&sensor.zone)
        .bind(Utc::now())
        .execute(&self.db_pool)
        .await?;

        info!(sensor_id = %sensor.id, sensor_type = %sensor.sensor_type, "Sensor added");
        self.sensor(&sensor.id)
            .await?
            .ok_or_else(|| QhseError::NotFound(format!("Sensor {}", sensor.id)))
    }

    /// Delete a sensor together with its readings and alerts
    pub async fn remove_sensor(&self, sensor_id: &str) -> Result<bool, QhseError> {
        let mut tx = self.db_pool.begin().await?;
        sqlx::query("DELETE FROM sensor_data WHERE sensor_id = ?")
            .bind(sensor_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sensor_alerts WHERE sensor_id = ?")
            .bind(sensor_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM iot_sensors WHERE id = ?")
            .bind(sensor_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!(sensor_id, "Sensor removed");
        }
        Ok(removed)
    }

    /// Persist a reading, refresh `last_update` and raise an alert when a threshold is crossed
    pub async fn record_reading(
        &self,
        sensor_id: &str,
        value: f64,
        unit: Option<&str>,
    ) -> Result<Option<SensorAlert>, QhseError> {
        if !value.is_finite() {
            return Err(QhseError::Validation("value must be a finite number".to_string()));
        }
        let sensor = self
            .sensor(sensor_id)
            .await?
            .ok_or_else(|| QhseError::NotFound(format!("Sensor {}", sensor_id)))?;
        let kind = sensor.kind()?;
        let unit = unit.unwrap_or(kind.unit());
        let now = Utc::now();

        sqlx::query("INSERT INTO sensor_data (sensor_id, value, unit, timestamp) VALUES (?, ?, ?, ?)")
            .bind(sensor_id)
            .bind(value)
            .bind(unit)
            .bind(now)
            .execute(&self.db_pool)
            .await?;
        sqlx::query("UPDATE iot_sensors SET last_update = ? WHERE id = ?")
            .bind(now)
            .bind(sensor_id)
            .execute(&self.db_pool)
            .await?;

        let Some(breach) = kind.evaluate(value) else {
            return Ok(None);
        };

        let message = match breach.level {
            AlertLevel::Emergency => format!("Valeur critique détectée: {} {}", value, unit),
            _ => format!("Seuil dépassé: {} {}", value, unit),
        };
        let alert = SensorAlert {
            alert_id: format!("{}_{}", sensor_id, now.timestamp()),
            sensor_id: sensor_id.to_string(),
            alert_type: breach.alert_type.to_string(),
            level: breach.level.as_str().to_string(),
            message,
            value,
            threshold: breach.threshold,
            timestamp: now,
            location: sensor.location.clone(),
            acknowledged: false,
            resolved: false,
        };

        // Same sensor and second share an id; the newest reading wins
        sqlx::query(
            "INSERT OR REPLACE INTO sensor_alerts
             (id, sensor_id, alert_type, level, message, value, threshold, timestamp, location, acknowledged, resolved)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0)",
        )
        .bind(&alert.alert_id)
        .bind(&alert.sensor_id)
        .bind(&alert.alert_type)
        .bind(&alert.level)
        .bind(&alert.message)
        .bind(alert.value)
        .bind(alert.threshold)
        .bind(alert.timestamp)
        .bind(&alert.location)
        .execute(&self.db_pool)
        .await?;

        warn!(sensor_id, level = %alert.level, value, "Sensor alert raised");
        Ok(Some(alert))
    }

    pub async fn sensor_data(&self, sensor_id: &str, hours: i64) -> Result<Vec<SensorReading>, QhseError> {
        let since = Utc::now() - Duration::hours(hours.max(1));
        let rows = sqlx::query_as::<_, SensorReading>(
            "SELECT value, unit, timestamp FROM sensor_data
             WHERE sensor_id = ? AND timestamp >= ? ORDER BY timestamp",
        )
        .bind(sensor_id)
        .bind(since)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows)
    }

    pub async fn status_summary(&self) -> Result<SensorStatusSummary, QhseError> {
        let sensors = self.sensors().await?;
        let active_alerts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sensor_alerts WHERE resolved = 0")
            .fetch_one(&self.db_pool)
            .await?;

        let active = sensors.iter().filter(|s| s.status == "active").count();
        Ok(SensorStatusSummary {
            total_sensors: sensors.len(),
            active_sensors: active,
            inactive_sensors: sensors.len() - active,
            low_battery: sensors.iter().filter(|s| s.battery_level < 20.0).count(),
            active_alerts,
            sensors,
        })
    }

    /// Newest alerts first, at most 100
    pub async fn alerts(&self, level: Option<AlertLevel>, acknowledged: Option<bool>) -> Result<Vec<SensorAlert>, QhseError> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, sensor_id, alert_type, level, message, value, threshold, timestamp, location, acknowledged, resolved
             FROM sensor_alerts WHERE 1 = 1",
        );
        if let Some(level) = level {
            query.push(" AND level = ").push_bind(level.as_str());
        }
        if let Some(acknowledged) = acknowledged {
            query.push(" AND acknowledged = ").push_bind(acknowledged);
        }
        query.push(" ORDER BY timestamp DESC LIMIT 100");

        let rows = query.build_query_as::<SensorAlert>().fetch_all(&self.db_pool).await?;
        Ok(rows)
    }

    pub async fn acknowledge_alert(&self, alert_id: &str) -> Result<bool, QhseError> {
        let result = sqlx::query("UPDATE sensor_alerts SET acknowledged = 1 WHERE id = ?")
            .bind(alert_id)
            .execute(&self.db_pool)
            .await?;
        let updated = result.rows_affected() > 0;
        if updated {
            info!(alert_id, "Alert acknowledged");
        }
        Ok(updated)
    }

    pub async fn resolve_alert(&self, alert_id: &str) -> Result<bool, QhseError> {
        let result = sqlx::query("UPDATE sensor_alerts SET resolved = 1 WHERE id = ?")
            .bind(alert_id)
            .execute(&self.db_pool)
            .await?;
        let updated = result.rows_affected() > 0;
        if updated {
            info!(alert_id, "Alert resolved");
        }
        Ok(updated)
    }

    pub async fn sensor_count(&self) -> Result<i64, QhseError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM iot_sensors")
            .fetch_one(&self.db_pool)
            .await?;
        Ok(count)
    }
}
