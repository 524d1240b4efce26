//! JSON-array files backing the alert queue and the simulated-mail outbox.

use std::path::Path;

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{NotificationError, NotificationPayload, Recipient};
use crate::models::enums::{Classification, Priority};

/// One entry of the internal alert queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: Uuid,
    pub timestamp: NaiveDateTime,
    pub patient_id: String,
    pub patient_name: String,
    pub diagnosis_id: String,
    pub classification: Classification,
    pub priority: Priority,
    pub confidence: f64,
    pub recommendation: String,
    #[serde(default)]
    pub read: bool,
}

impl AlertRecord {
    pub fn new(payload: &NotificationPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now().naive_utc(),
            patient_id: payload.patient_id.clone(),
            patient_name: payload.patient_name.clone(),
            diagnosis_id: payload.diagnosis_id.clone(),
            classification: payload.classification,
            priority: payload.priority,
            confidence: payload.confidence,
            recommendation: payload.recommendation.clone(),
            read: false,
        }
    }
}

/// A direct message that was recorded instead of transmitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub timestamp: NaiveDateTime,
    pub recipient: String,
    pub to: Option<String>,
    pub subject: String,
    pub body: String,
    pub reason: String,
}

impl OutboxMessage {
    pub fn new(recipient: &Recipient, payload: &NotificationPayload, reason: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now().naive_utc(),
            recipient: recipient.name.clone(),
            to: recipient.email.clone(),
            subject: payload.subject(),
            body: payload.body(),
            reason: reason.to_string(),
        }
    }
}

/// Read every record. A missing or empty file is an empty queue.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, NotificationError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&content)
        .map_err(|e| NotificationError::CorruptedQueue(format!("{}: {e}", path.display())))
}

/// Replace the file contents. Writes a sibling temp file, then renames.
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<(), NotificationError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| NotificationError::CorruptedQueue(e.to_string()))?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Read, push, rewrite. Callers hold the gateway's file lock.
pub fn append_record<T>(path: &Path, record: &T) -> Result<(), NotificationError>
where
    T: Serialize + DeserializeOwned + Clone,
{
    let mut records: Vec<T> = read_records(path)?;
    records.push(record.clone());
    write_records(path, &records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> NotificationPayload {
        NotificationPayload {
            patient_id: "P002".into(),
            patient_name: "John Roe".into(),
            diagnosis_id: "D010".into(),
            classification: Classification::Normal,
            priority: Priority::Medium,
            confidence: 0.47,
            recommendation: "Clinical follow-up within 24-48h.".into(),
        }
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let records: Vec<AlertRecord> = read_records(&dir.path().join("none.json")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn append_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts_queue.json");
        let first = AlertRecord::new(&payload());
        let second = AlertRecord::new(&payload());
        append_record(&path, &first).unwrap();
        append_record(&path, &second).unwrap();

        let records: Vec<AlertRecord> = read_records(&path).unwrap();
        assert_eq!(records, vec![first, second]);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn legacy_entries_without_read_flag_are_unread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts_queue.json");
        let mut value = serde_json::to_value(AlertRecord::new(&payload())).unwrap();
        value.as_object_mut().unwrap().remove("read");
        std::fs::write(&path, serde_json::to_string(&vec![value]).unwrap()).unwrap();

        let records: Vec<AlertRecord> = read_records(&path).unwrap();
        assert!(!records[0].read);
    }

    #[test]
    fn garbage_file_is_corrupted_queue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outbox.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = read_records::<OutboxMessage>(&path).unwrap_err();
        assert!(matches!(err, NotificationError::CorruptedQueue(_)));
    }
}
