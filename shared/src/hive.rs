use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// Health label the hive service attaches to hives and inspections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HiveStatus {
    #[default]
    Healthy,
    Warning,
    Critical,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hive {
    pub id: i64,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub status: HiveStatus,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub queen_year: Option<i32>,
    #[serde(default)]
    pub frames_count: Option<i32>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiveDraft {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub status: HiveStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queen_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames_count: Option<i32>,
}

/// Partial update; absent fields are left untouched by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HiveChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<HiveStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queen_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames_count: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inspection {
    pub id: i64,
    pub hive_id: i64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<HiveStatus>,
    pub temperature: f64,
    pub humidity: f64,
    pub weight: f64,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionDraft {
    pub hive_id: i64,
    pub temperature: f64,
    pub humidity: f64,
    pub weight: f64,
    pub notes: String,
    pub status: HiveStatus,
}
