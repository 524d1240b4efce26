pub mod classifier;
pub mod preprocess;
pub mod priority;

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::models::enums::Classification;

pub use classifier::{
    build_classifier, ClassificationModel, ClassificationWorker, ImageClassifier, StaticModel,
    UnavailableModel,
};
pub use priority::{assess, label_for, priority_for, TriageAssessment};

#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("Image not found: {0}")]
    ImageNotFound(PathBuf),

    #[error("Image could not be decoded: {0}")]
    ImageDecode(String),

    #[error("Classification model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Output of one classification call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub label: Classification,
    /// Probability of PNEUMONIA, in [0, 1].
    pub confidence: f64,
}

impl ClassificationResult {
    pub fn from_probability(confidence: f64) -> Self {
        Self {
            label: label_for(confidence),
            confidence,
        }
    }
}
