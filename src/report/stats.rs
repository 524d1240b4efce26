use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::enums::{Classification, Priority};
use crate::models::Diagnosis;

/// Aggregate over a list of diagnoses.
///
/// Every classification and tier appears in the maps, with zero when absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosisSummary {
    pub total: usize,
    pub count_by_classification: BTreeMap<Classification, usize>,
    pub count_by_priority: BTreeMap<Priority, usize>,
    /// Mean stored probability of PNEUMONIA.
    pub average_confidence: f64,
    /// Fraction of PNEUMONIA results, in [0, 1].
    pub pneumonia_rate: f64,
}

pub fn summarize(diagnoses: &[Diagnosis]) -> DiagnosisSummary {
    let mut count_by_classification: BTreeMap<Classification, usize> =
        Classification::ALL.iter().map(|c| (*c, 0)).collect();
    let mut count_by_priority: BTreeMap<Priority, usize> =
        Priority::ALL.iter().map(|p| (*p, 0)).collect();

    let mut confidence_sum = 0.0;
    for d in diagnoses {
        *count_by_classification.entry(d.classification).or_insert(0) += 1;
        *count_by_priority.entry(d.priority).or_insert(0) += 1;
        confidence_sum += d.confidence;
    }

    let total = diagnoses.len();
    let (average_confidence, pneumonia_rate) = if total == 0 {
        (0.0, 0.0)
    } else {
        let pneumonia = count_by_classification
            .get(&Classification::Pneumonia)
            .copied()
            .unwrap_or(0);
        (
            confidence_sum / total as f64,
            pneumonia as f64 / total as f64,
        )
    };

    DiagnosisSummary {
        total,
        count_by_classification,
        count_by_priority,
        average_confidence,
        pneumonia_rate,
    }
}
