use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Default condition type for free-form notes.
pub const DEFAULT_CONDITION_TYPE: &str = "observation";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalHistory {
    pub id: i64,
    pub patient_id: String,
    pub description: String,
    pub condition_type: Option<String>,
    pub date_recorded: NaiveDateTime,
    pub recorded_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHistoryEntry {
    pub description: String,
    #[serde(default)]
    pub condition_type: Option<String>,
    #[serde(default)]
    pub recorded_by: Option<String>,
}
