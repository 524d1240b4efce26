//! Report gateway: one-diagnosis PDF documents and aggregate statistics.

pub mod pdf;
pub mod stats;

use std::path::PathBuf;

use thiserror::Error;

use crate::models::Diagnosis;

pub use pdf::PdfReportGateway;
pub use stats::{summarize, DiagnosisSummary};

/// Printed at the bottom of every report.
pub const DISCLAIMER: &str = "This is an automated triage system. \
    Consult a physician for a definitive diagnosis.";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF rendering failed: {0}")]
    Pdf(String),

    #[error("Diagnosis {diagnosis_id} does not belong to patient {patient_id}")]
    PatientMismatch {
        patient_id: String,
        diagnosis_id: String,
    },
}

/// Renders a stored diagnosis into a durable document and returns its location.
pub trait ReportRenderer {
    fn render(&self, patient_id: &str, diagnosis: &Diagnosis) -> Result<PathBuf, ReportError>;
}
