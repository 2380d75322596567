// Simulated IoT sensor monitoring

pub mod manager;
pub mod simulator;
pub mod thresholds;

pub use manager::{IotManager, NewSensor, Sensor, SensorAlert, SensorReading, SensorStatusSummary};
pub use simulator::spawn_simulator;
pub use thresholds::{AlertLevel, SensorType, Thresholds};
