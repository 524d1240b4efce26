//! Structured intents accepted by the orchestrator.
//!
//! Wire form is a JSON object tagged by `intent`:
//! `{"intent": "analyze_image", "patient_id": "P001", "image_path": "..."}`.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::enums::Channel;
use crate::models::{DiagnosisInput, NewHistoryEntry, NewPatient, PatientUpdate};

/// Who an image belongs to. Either an existing `patient_id`, or enough
/// fields to find or register the patient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientIdentity {
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub national_id: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl PatientIdentity {
    pub fn with_patient_id(id: impl Into<String>) -> Self {
        Self {
            patient_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn patient_id(&self) -> Option<&str> {
        non_blank(&self.patient_id)
    }

    pub fn national_id(&self) -> Option<&str> {
        non_blank(&self.national_id)
    }

    pub fn name(&self) -> Option<&str> {
        non_blank(&self.name)
    }

    /// True when nothing identifies the patient.
    pub fn is_empty(&self) -> bool {
        self.patient_id().is_none() && self.national_id().is_none() && self.name().is_none()
    }

    /// Registration fields, when a name is present.
    pub fn registration(&self) -> Option<NewPatient> {
        let name = self.name()?;
        Some(NewPatient {
            name: name.to_string(),
            birth_date: self.birth_date,
            national_id: self.national_id.clone(),
            contact: self.contact.clone(),
            email: self.email.clone(),
            address: self.address.clone(),
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Which channels to use after a diagnosis is stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyPreference {
    /// Tier policy: direct always, plus alert for HIGH and CRITICAL.
    #[default]
    Policy,
    Skip,
    Channels(Vec<Channel>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    AnalyzeImage {
        #[serde(flatten)]
        identity: PatientIdentity,
        image_path: PathBuf,
        #[serde(default)]
        notify: NotifyPreference,
        #[serde(default)]
        report: bool,
        #[serde(default)]
        notes: Option<String>,
        #[serde(default)]
        created_by: Option<String>,
    },
    GetPatient {
        patient_id: String,
    },
    ListPatients,
    RegisterPatient {
        #[serde(flatten)]
        patient: NewPatient,
    },
    UpdatePatient {
        patient_id: String,
        #[serde(flatten)]
        changes: PatientUpdate,
    },
    GetHistory {
        patient_id: String,
    },
    AddHistory {
        patient_id: String,
        #[serde(flatten)]
        entry: NewHistoryEntry,
    },
    /// Diagnosis ID, or a patient ID to list that patient's diagnoses.
    GetDiagnosis {
        id: String,
    },
    ListDiagnoses {
        #[serde(default)]
        patient_id: Option<String>,
    },
    RegisterDiagnosis {
        #[serde(flatten)]
        diagnosis: DiagnosisInput,
    },
    /// Notify about a stored diagnosis (the patient's latest when omitted).
    Notify {
        patient_id: String,
        #[serde(default)]
        diagnosis_id: Option<String>,
        /// Tier policy when omitted.
        #[serde(default)]
        channels: Option<Vec<Channel>>,
    },
    GenerateReport {
        patient_id: String,
        #[serde(default)]
        diagnosis_id: Option<String>,
    },
    GenerateStats {
        #[serde(default)]
        patient_id: Option<String>,
    },
}

impl Intent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AnalyzeImage { .. } => "analyze_image",
            Self::GetPatient { .. } => "get_patient",
            Self::ListPatients => "list_patients",
            Self::RegisterPatient { .. } => "register_patient",
            Self::UpdatePatient { .. } => "update_patient",
            Self::GetHistory { .. } => "get_history",
            Self::AddHistory { .. } => "add_history",
            Self::GetDiagnosis { .. } => "get_diagnosis",
            Self::ListDiagnoses { .. } => "list_diagnoses",
            Self::RegisterDiagnosis { .. } => "register_diagnosis",
            Self::Notify { .. } => "notify",
            Self::GenerateReport { .. } => "generate_report",
            Self::GenerateStats { .. } => "generate_stats",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConfidenceInput;

    #[test]
    fn analyze_with_defaults() {
        let intent: Intent = serde_json::from_str(
            r#"{"intent": "analyze_image", "patient_id": "P003", "image_path": "/scans/a.png"}"#,
        )
        .unwrap();
        match intent {
            Intent::AnalyzeImage {
                identity,
                image_path,
                notify,
                report,
                ..
            } => {
                assert_eq!(identity.patient_id(), Some("P003"));
                assert_eq!(image_path, PathBuf::from("/scans/a.png"));
                assert_eq!(notify, NotifyPreference::Policy);
                assert!(!report);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn analyze_with_registration_fields_and_channels() {
        let intent: Intent = serde_json::from_str(
            r#"{"intent": "analyze_image", "name": "Jane Doe", "birth_date": "1980-04-02",
                "image_path": "x.png", "notify": {"channels": ["alert"]}, "report": true}"#,
        )
        .unwrap();
        let Intent::AnalyzeImage { identity, notify, report, .. } = intent else {
            panic!("wrong variant");
        };
        assert!(identity.patient_id().is_none());
        let reg = identity.registration().unwrap();
        assert_eq!(reg.name, "Jane Doe");
        assert_eq!(reg.birth_date, NaiveDate::from_ymd_opt(1980, 4, 2));
        assert_eq!(notify, NotifyPreference::Channels(vec![Channel::Alert]));
        assert!(report);
    }

    #[test]
    fn blank_identity_is_empty() {
        let identity = PatientIdentity {
            patient_id: Some("  ".into()),
            name: Some(String::new()),
            ..PatientIdentity::default()
        };
        assert!(identity.is_empty());
        assert!(identity.registration().is_none());
    }

    #[test]
    fn register_diagnosis_accepts_percentage_text() {
        let intent: Intent = serde_json::from_str(
            r#"{"intent": "register_diagnosis", "patient_id": "P001",
                "classification": "pneumonia", "confidence": "82%", "priority": "ALTA"}"#,
        )
        .unwrap();
        let Intent::RegisterDiagnosis { diagnosis } = intent else {
            panic!("wrong variant");
        };
        assert_eq!(diagnosis.confidence, ConfidenceInput::Text("82%".into()));
        assert_eq!(diagnosis.priority, "ALTA");
    }

    #[test]
    fn unit_and_skip_forms() {
        let intent: Intent = serde_json::from_str(r#"{"intent": "list_patients"}"#).unwrap();
        assert_eq!(intent.kind(), "list_patients");

        let pref: NotifyPreference = serde_json::from_str(r#""skip""#).unwrap();
        assert_eq!(pref, NotifyPreference::Skip);
    }

    #[test]
    fn unknown_intent_is_rejected() {
        assert!(serde_json::from_str::<Intent>(r#"{"intent": "delete_patient"}"#).is_err());
    }
}
