// Background task writing synthetic sensor readings

use crate::core::errors::QhseError;
use crate::core::models::round_to;
use crate::iot::manager::IotManager;
use crate::iot::thresholds::SensorType;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Draw a plausible value for the sensor type
pub fn realistic_value<R: Rng>(rng: &mut R, sensor_type: SensorType) -> f64 {
    let (range, decimals) = sensor_type.simulated_range();
    round_to(rng.gen_range(range), decimals)
}

/// Write one reading for every active sensor, returning how many were written
pub async fn simulate_once(manager: &IotManager) -> Result<usize, QhseError> {
    let sensors = manager.active_sensors().await?;

    let readings: Vec<(String, f64)> = {
        let mut rng = rand::thread_rng();
        sensors
            .iter()
            .filter_map(|sensor| {
                let kind = sensor.kind().ok()?;
                Some((sensor.id.clone(), realistic_value(&mut rng, kind)))
            })
            .collect()
    };

    for (sensor_id, value) in &readings {
        manager.record_reading(sensor_id, *value, None).await?;
    }
    Ok(readings.len())
}

/// Run [`simulate_once`] every `interval` until the task is aborted
pub fn spawn_simulator(manager: Arc<IotManager>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "IoT simulator started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match simulate_once(&manager).await {
                Ok(count) => debug!(readings = count, "Simulated sensor readings"),
                Err(e) => error!(error = %e, "Sensor simulation failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::iot::manager::NewSensor;

    #[test]
    fn test_values_are_rounded_and_in_range() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let value = realistic_value(&mut rng, SensorType::Light);
            assert_eq!(value, value.round());
            assert!((300.0..=800.0).contains(&value));
            assert!(SensorType::Temperature.evaluate(realistic_value(&mut rng, SensorType::Temperature)).is_none());
        }
    }

    #[tokio::test]
    async fn test_simulation_skips_inactive_sensors() {
        let pool = db::connect_in_memory().await.unwrap();
        let manager = IotManager::new(pool.clone());
        for (id, sensor_type) in [("hum_t", SensorType::Humidity), ("gas_t", SensorType::Gas)] {
            manager
                .add_sensor(&NewSensor {
                    id: id.to_string(),
                    name: id.to_string(),
                    sensor_type,
                    location: "Test".to_string(),
                    zone: "Test".to_string(),
                })
                .await
                .unwrap();
        }
        sqlx::query("UPDATE iot_sensors SET status = 'maintenance' WHERE id = 'gas_t'")
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(simulate_once(&manager).await.unwrap(), 1);
        assert_eq!(manager.sensor_data("hum_t", 1).await.unwrap().len(), 1);
        assert!(manager.sensor_data("gas_t", 1).await.unwrap().is_empty());
        assert!(manager.alerts(None, None).await.unwrap().is_empty());
    }
}
