use crate::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: i64,
    pub name: String,
    pub sensor_type: String,
    pub hive_id: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorDraft {
    pub name: String,
    pub sensor_type: String,
    pub hive_id: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hive_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: i64,
    pub sensor_id: i64,
    pub value: f64,
    #[serde(default)]
    pub battery_level: Option<f64>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

/// Time window and cap for a measurement query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementWindow {
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
    pub limit: u32,
}

impl MeasurementWindow {
    pub const DEFAULT_LIMIT: u32 = 100;
}

impl Default for MeasurementWindow {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorStats {
    pub sensor_id: i64,
    pub sensor_name: String,
    pub sensor_type: String,
    #[serde(default)]
    pub last_value: Option<f64>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub avg_value: Option<f64>,
    #[serde(default)]
    pub battery_level: Option<f64>,
    #[serde(default)]
    pub last_measurement_time: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    #[default]
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub hive_id: i64,
    #[serde(default)]
    pub sensor_id: Option<i64>,
    pub alert_type: String,
    pub message: String,
    #[serde(default)]
    pub is_resolved: bool,
    /// The monitoring service has no severity column; alerts default to warning.
    #[serde(default)]
    pub severity: AlertSeverity,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
    /// Client-side only; there is no read endpoint for alerts.
    #[serde(skip)]
    pub is_read: bool,
}

/// Optional filters for `GET /alerts/`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertFilter {
    pub hive_id: Option<i64>,
    pub sensor_id: Option<i64>,
}
