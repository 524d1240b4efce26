use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::{Classification, Priority};

/// One triage event. Immutable once stored.
///
/// `confidence` is always the model's probability of PNEUMONIA, whatever
/// the final label. Displays format this same value as a percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub id: String,
    pub patient_id: String,
    pub image_reference: Option<String>,
    pub classification: Classification,
    pub confidence: f64,
    pub priority: Priority,
    pub notes: Option<String>,
    pub timestamp: NaiveDateTime,
    pub created_by: String,
}

/// Validated input for a diagnosis insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDiagnosis {
    pub patient_id: String,
    pub image_reference: Option<String>,
    pub classification: Classification,
    pub confidence: f64,
    pub priority: Priority,
    pub notes: Option<String>,
    pub created_by: String,
}

/// Confidence as supplied by a caller: a probability or a percentage text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfidenceInput {
    Value(f64),
    Text(String),
}

/// Unvalidated diagnosis fields, as received on the register-diagnosis intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisInput {
    pub patient_id: String,
    pub classification: String,
    pub confidence: ConfidenceInput,
    pub priority: String,
    #[serde(default)]
    pub image_reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Result of looking up by diagnosis ID or by patient ID.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "match", content = "records", rename_all = "snake_case")]
pub enum DiagnosisLookup {
    Diagnosis(Diagnosis),
    /// All diagnoses of a patient, newest first.
    Patient(Vec<Diagnosis>),
}
