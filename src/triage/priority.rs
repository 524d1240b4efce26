//! Confidence → clinical priority tier.
//!
//! `confidence` is the probability of PNEUMONIA. Each band includes its
//! lower bound and excludes its upper bound; the top band includes 1.0.
//!
//! | band         | tier     |
//! |--------------|----------|
//! | [0, 0.45)    | LOW      |
//! | [0.45, 0.50) | MEDIUM   |
//! | [0.50, 0.70) | HIGH     |
//! | [0.70, 1.0]  | CRITICAL |

use serde::Serialize;

use crate::models::enums::{Classification, Priority};

pub const MEDIUM_THRESHOLD: f64 = 0.45;
pub const HIGH_THRESHOLD: f64 = 0.50;
pub const CRITICAL_THRESHOLD: f64 = 0.70;

/// At or above this probability the label is PNEUMONIA.
pub const PNEUMONIA_THRESHOLD: f64 = 0.50;

/// Tier, label and the action text attached to the diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriageAssessment {
    pub classification: Classification,
    pub priority: Priority,
    pub recommended_action: &'static str,
}

pub fn priority_for(confidence: f64) -> Priority {
    if confidence >= CRITICAL_THRESHOLD {
        Priority::Critical
    } else if confidence >= HIGH_THRESHOLD {
        Priority::High
    } else if confidence >= MEDIUM_THRESHOLD {
        Priority::Medium
    } else {
        Priority::Low
    }
}

pub fn label_for(confidence: f64) -> Classification {
    if confidence >= PNEUMONIA_THRESHOLD {
        Classification::Pneumonia
    } else {
        Classification::Normal
    }
}

pub fn recommended_action(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "Routine follow-up only if symptoms persist.",
        Priority::Medium => "Clinical follow-up within 24-48h.",
        Priority::High => "Same-day clinical evaluation.",
        Priority::Critical => "Immediate medical attention required.",
    }
}

pub fn assess(confidence: f64) -> TriageAssessment {
    let priority = priority_for(confidence);
    TriageAssessment {
        classification: label_for(confidence),
        priority,
        recommended_action: recommended_action(priority),
    }
}
