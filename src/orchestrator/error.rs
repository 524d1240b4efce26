//! Caller-facing error kinds.
//!
//! Component errors are converted here. Internal causes are logged and
//! replaced by a fixed message for the infrastructure kinds.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::DatabaseError;
use crate::notify::NotificationError;
use crate::report::ReportError;
use crate::triage::ClassificationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    MissingIdentity,
    ImageError,
    ModelUnavailable,
    UnknownPatient,
    DuplicateIdentity,
    InvalidClassification,
    InvalidPriority,
    InvalidConfidence,
    InvalidInput,
    NotFound,
    PersistenceFailure,
    DeliveryFailure,
    ReportFailure,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingIdentity => "MissingIdentity",
            Self::ImageError => "ImageError",
            Self::ModelUnavailable => "ModelUnavailable",
            Self::UnknownPatient => "UnknownPatient",
            Self::DuplicateIdentity => "DuplicateIdentity",
            Self::InvalidClassification => "InvalidClassification",
            Self::InvalidPriority => "InvalidPriority",
            Self::InvalidConfidence => "InvalidConfidence",
            Self::InvalidInput => "InvalidInput",
            Self::NotFound => "NotFound",
            Self::PersistenceFailure => "PersistenceFailure",
            Self::DeliveryFailure => "DeliveryFailure",
            Self::ReportFailure => "ReportFailure",
            Self::Internal => "Internal",
        }
    }

    /// Gating and validation kinds are raised before any mutating call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingIdentity
                | Self::UnknownPatient
                | Self::DuplicateIdentity
                | Self::InvalidClassification
                | Self::InvalidPriority
                | Self::InvalidConfidence
                | Self::InvalidInput
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable kind plus a message safe to show the caller.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct OrchestratorError {
    pub kind: ErrorKind,
    pub message: String,
}

impl OrchestratorError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn missing_identity() -> Self {
        Self::new(
            ErrorKind::MissingIdentity,
            "A patient identifier is required before an image can be analyzed. \
             Provide patient_id, or the patient's name to register them.",
        )
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    /// Prefix the message with what already happened before the failure.
    pub fn with_context(mut self, context: impl AsRef<str>) -> Self {
        self.message = format!("{}; {}", context.as_ref(), self.message);
        self
    }
}

impl From<DatabaseError> for OrchestratorError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::UnknownPatient(id) if id.trim().is_empty() => {
                Self::new(ErrorKind::MissingIdentity, "A patient identifier is required")
            }
            DatabaseError::UnknownPatient(id) => {
                Self::new(ErrorKind::UnknownPatient, format!("Patient {id} not found"))
            }
            DatabaseError::DuplicateIdentity {
                national_id,
                existing_id,
            } => Self::new(
                ErrorKind::DuplicateIdentity,
                format!("National ID {national_id} is already registered to patient {existing_id}"),
            ),
            DatabaseError::InvalidEnum { field, value } => match field.as_str() {
                "Classification" => Self::new(
                    ErrorKind::InvalidClassification,
                    format!("Classification must be NORMAL or PNEUMONIA, got '{value}'"),
                ),
                "Priority" => Self::new(
                    ErrorKind::InvalidPriority,
                    format!("Priority must be LOW, MEDIUM, HIGH or CRITICAL, got '{value}'"),
                ),
                _ => Self::invalid_input(format!("Invalid value '{value}' for {field}")),
            },
            DatabaseError::InvalidConfidence(value) => Self::new(
                ErrorKind::InvalidConfidence,
                format!("Confidence must be a probability in [0, 1] or a percentage, got '{value}'"),
            ),
            DatabaseError::InvalidField { field, reason } => {
                Self::invalid_input(format!("Invalid {field}: {reason}"))
            }
            DatabaseError::NotFound { entity_type, id } => {
                Self::new(ErrorKind::NotFound, format!("No {entity_type} found for {id}"))
            }
            other => {
                tracing::error!(error = %other, "Persistence failure");
                Self::new(
                    ErrorKind::PersistenceFailure,
                    "The record store could not complete the operation",
                )
            }
        }
    }
}

impl From<ClassificationError> for OrchestratorError {
    fn from(err: ClassificationError) -> Self {
        match err {
            ClassificationError::ImageNotFound(path) => Self::new(
                ErrorKind::ImageError,
                format!("Image not found: {}", path.display()),
            ),
            ClassificationError::ImageDecode(detail) => {
                tracing::warn!(error = %detail, "Image decode failed");
                Self::new(ErrorKind::ImageError, "The image could not be decoded")
            }
            ClassificationError::ModelUnavailable(detail)
            | ClassificationError::Inference(detail) => {
                tracing::error!(error = %detail, "Classifier unavailable");
                Self::new(
                    ErrorKind::ModelUnavailable,
                    "The classification model is unavailable",
                )
            }
        }
    }
}

impl From<NotificationError> for OrchestratorError {
    fn from(err: NotificationError) -> Self {
        tracing::error!(error = %err, "Notification failure");
        Self::new(ErrorKind::DeliveryFailure, "The team alert could not be delivered")
    }
}

impl From<ReportError> for OrchestratorError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::PatientMismatch {
                patient_id,
                diagnosis_id,
            } => Self::invalid_input(format!(
                "Diagnosis {diagnosis_id} does not belong to patient {patient_id}"
            )),
            other => {
                tracing::error!(error = %other, "Report failure");
                Self::new(ErrorKind::ReportFailure, "The report could not be generated")
            }
        }
    }
}
