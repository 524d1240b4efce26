//! Persistence gateway over patients, diagnoses and medical history.
//!
//! Every operation opens its own connection, so concurrent requests each
//! get an independent transaction scope. Writes that mint an ID run under
//! `BEGIN IMMEDIATE`, which takes the database write lock before the
//! max-suffix read and holds it through the insert.

use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;

use super::ids::{next_sequential_id, SequencedEntity};
use super::repository;
use super::sqlite::{connect, open_database};
use super::DatabaseError;
use crate::models::enums::{Classification, Priority};
use crate::models::*;
use crate::triage::assess;

/// Bound on primary-key collision retries during ID issuance.
const MAX_ID_RETRIES: usize = 5;

/// Creator recorded when the caller does not name one.
pub const DEFAULT_CREATED_BY: &str = "system";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the store and bring its schema up to date.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        drop(open_database(path)?);
        tracing::info!(path = %path.display(), "Triage store opened");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fresh connection for one unit of work.
    pub fn connection(&self) -> Result<Connection, DatabaseError> {
        connect(&self.path)
    }

    // ── Patients ────────────────────────────────────────────

    pub fn get_patient(&self, id: &str) -> Result<Patient, DatabaseError> {
        let conn = self.connection()?;
        repository::get_patient(&conn, id)?
            .ok_or_else(|| DatabaseError::UnknownPatient(id.to_string()))
    }

    /// `Ok(None)` when the patient does not exist.
    pub fn find_patient(&self, id: &str) -> Result<Option<Patient>, DatabaseError> {
        let conn = self.connection()?;
        repository::get_patient(&conn, id)
    }

    pub fn find_patient_by_national_id(
        &self,
        national_id: &str,
    ) -> Result<Option<Patient>, DatabaseError> {
        let conn = self.connection()?;
        repository::find_patient_by_national_id(&conn, national_id.trim())
    }

    pub fn list_patients(&self) -> Result<Vec<Patient>, DatabaseError> {
        let conn = self.connection()?;
        repository::list_patients(&conn)
    }

    /// Register a patient under a freshly issued `P` ID.
    ///
    /// Fails with `DuplicateIdentity` when the national ID is already taken.
    pub fn register_patient(&self, fields: &NewPatient) -> Result<Patient, DatabaseError> {
        self.insert_patient(fields, OnExistingIdentity::Reject)
            .map(|(patient, _)| patient)
    }

    /// Patient holding the national ID in `fields`, registering one when
    /// nobody does. The lookup and the insert share one write transaction,
    /// so concurrent callers with the same national ID converge on a single
    /// record. The flag is true when this call created the patient.
    pub fn find_or_register_patient(
        &self,
        fields: &NewPatient,
    ) -> Result<(Patient, bool), DatabaseError> {
        self.insert_patient(fields, OnExistingIdentity::Reuse)
    }

    fn insert_patient(
        &self,
        fields: &NewPatient,
        on_existing: OnExistingIdentity,
    ) -> Result<(Patient, bool), DatabaseError> {
        let name = fields.name.trim();
        if name.is_empty() {
            return Err(DatabaseError::InvalidField {
                field: "name",
                reason: "a patient name is required".into(),
            });
        }
        let national_id = clean(&fields.national_id);

        for attempt in 1..=MAX_ID_RETRIES {
            let mut conn = self.connection()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if let Some(nid) = national_id.as_deref() {
                if let Some(existing) = repository::find_patient_by_national_id(&tx, nid)? {
                    return match on_existing {
                        OnExistingIdentity::Reuse => Ok((existing, false)),
                        OnExistingIdentity::Reject => Err(DatabaseError::DuplicateIdentity {
                            national_id: nid.to_string(),
                            existing_id: existing.id,
                        }),
                    };
                }
            }

            let now = now();
            let patient = Patient {
                id: next_sequential_id(&tx, SequencedEntity::Patient)?,
                name: name.to_string(),
                birth_date: fields.birth_date,
                national_id: national_id.clone(),
                contact: clean(&fields.contact),
                email: clean(&fields.email),
                address: clean(&fields.address),
                created_at: now,
                updated_at: now,
            };

            match repository::insert_patient(&tx, &patient) {
                Ok(()) => {}
                Err(e) if is_primary_key_conflict(&e) => {
                    tracing::warn!(attempt, id = %patient.id, "Patient ID collision, retrying");
                    continue;
                }
                Err(e) if is_unique_conflict(&e) => {
                    let nid = national_id.clone().unwrap_or_default();
                    let existing = repository::find_patient_by_national_id(&tx, &nid)?;
                    return match (on_existing, existing) {
                        (OnExistingIdentity::Reuse, Some(existing)) => Ok((existing, false)),
                        (_, existing) => Err(DatabaseError::DuplicateIdentity {
                            national_id: nid,
                            existing_id: existing.map(|p| p.id).unwrap_or_default(),
                        }),
                    };
                }
                Err(e) => return Err(e),
            }

            tx.commit()?;
            tracing::info!(patient_id = %patient.id, "Patient registered");
            return Ok((patient, true));
        }

        Err(DatabaseError::IdIssuance {
            entity: SequencedEntity::Patient.label(),
            attempts: MAX_ID_RETRIES,
        })
    }

    /// Apply the supplied fields in place and bump `updated_at`.
    pub fn update_patient(&self, id: &str, update: &PatientUpdate) -> Result<Patient, DatabaseError> {
        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut patient = repository::get_patient(&tx, id)?
            .ok_or_else(|| DatabaseError::UnknownPatient(id.to_string()))?;

        if let Some(name) = update.name.as_deref() {
            let name = name.trim();
            if name.is_empty() {
                return Err(DatabaseError::InvalidField {
                    field: "name",
                    reason: "a patient name cannot be blank".into(),
                });
            }
            patient.name = name.to_string();
        }
        if let Some(nid) = clean(&update.national_id) {
            if let Some(other) = repository::find_patient_by_national_id(&tx, &nid)? {
                if other.id != patient.id {
                    return Err(DatabaseError::DuplicateIdentity {
                        national_id: nid,
                        existing_id: other.id,
                    });
                }
            }
            patient.national_id = Some(nid);
        }
        if update.birth_date.is_some() {
            patient.birth_date = update.birth_date;
        }
        if update.contact.is_some() {
            patient.contact = clean(&update.contact);
        }
        if update.email.is_some() {
            patient.email = clean(&update.email);
        }
        if update.address.is_some() {
            patient.address = clean(&update.address);
        }
        patient.updated_at = now();

        repository::update_patient_row(&tx, &patient)?;
        tx.commit()?;
        tracing::info!(patient_id = %patient.id, "Patient updated");
        Ok(patient)
    }

    // ── Medical history ─────────────────────────────────────

    pub fn get_history(&self, patient_id: &str) -> Result<Vec<MedicalHistory>, DatabaseError> {
        let conn = self.connection()?;
        if !repository::patient_exists(&conn, patient_id)? {
            return Err(DatabaseError::UnknownPatient(patient_id.to_string()));
        }
        repository::get_history_for_patient(&conn, patient_id)
    }

    pub fn add_history(
        &self,
        patient_id: &str,
        entry: &NewHistoryEntry,
    ) -> Result<MedicalHistory, DatabaseError> {
        let description = entry.description.trim();
        if description.is_empty() {
            return Err(DatabaseError::InvalidField {
                field: "description",
                reason: "a history entry needs a description".into(),
            });
        }
        let condition_type =
            clean(&entry.condition_type).unwrap_or_else(|| DEFAULT_CONDITION_TYPE.to_string());
        let recorded_by = clean(&entry.recorded_by);

        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !repository::patient_exists(&tx, patient_id)? {
            return Err(DatabaseError::UnknownPatient(patient_id.to_string()));
        }
        let record = repository::insert_history(
            &tx,
            patient_id,
            description,
            Some(&condition_type),
            recorded_by.as_deref(),
            now(),
        )?;
        tx.commit()?;
        tracing::info!(patient_id, history_id = record.id, "History entry recorded");
        Ok(record)
    }

    // ── Diagnoses ───────────────────────────────────────────

    /// Exact diagnosis ID first, then all diagnoses of a patient with that ID.
    pub fn get_diagnosis(&self, id_or_patient_id: &str) -> Result<DiagnosisLookup, DatabaseError> {
        let conn = self.connection()?;
        if let Some(diag) = repository::get_diagnosis_by_id(&conn, id_or_patient_id)? {
            return Ok(DiagnosisLookup::Diagnosis(diag));
        }
        let for_patient = repository::get_diagnoses_for_patient(&conn, id_or_patient_id)?;
        if !for_patient.is_empty() {
            return Ok(DiagnosisLookup::Patient(for_patient));
        }
        Err(DatabaseError::NotFound {
            entity_type: "diagnosis".into(),
            id: id_or_patient_id.to_string(),
        })
    }

    pub fn list_diagnoses(&self) -> Result<Vec<Diagnosis>, DatabaseError> {
        let conn = self.connection()?;
        repository::get_all_diagnoses(&conn)
    }

    /// Diagnoses of an existing patient, newest first.
    pub fn diagnoses_for_patient(&self, patient_id: &str) -> Result<Vec<Diagnosis>, DatabaseError> {
        let conn = self.connection()?;
        if !repository::patient_exists(&conn, patient_id)? {
            return Err(DatabaseError::UnknownPatient(patient_id.to_string()));
        }
        repository::get_diagnoses_for_patient(&conn, patient_id)
    }

    /// Validate loosely-typed input, then record it.
    pub fn register_diagnosis(&self, input: &DiagnosisInput) -> Result<Diagnosis, DatabaseError> {
        let validated = validate_diagnosis_input(input)?;
        self.record_diagnosis(&validated)
    }

    /// Insert a validated diagnosis under a freshly issued `D` ID.
    ///
    /// Fails with `UnknownPatient` (and inserts nothing) when the patient
    /// does not exist.
    pub fn record_diagnosis(&self, fields: &NewDiagnosis) -> Result<Diagnosis, DatabaseError> {
        check_confidence(fields.confidence)?;

        for attempt in 1..=MAX_ID_RETRIES {
            let mut conn = self.connection()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let diagnosis = match issue_diagnosis(&tx, fields, now()) {
                Ok(diagnosis) => diagnosis,
                Err(e) if is_primary_key_conflict(&e) => {
                    tracing::warn!(attempt, "Diagnosis ID collision, retrying");
                    continue;
                }
                Err(e) => return Err(e),
            };

            tx.commit()?;
            tracing::info!(
                diagnosis_id = %diagnosis.id,
                patient_id = %diagnosis.patient_id,
                classification = %diagnosis.classification,
                priority = %diagnosis.priority,
                "Diagnosis recorded"
            );
            return Ok(diagnosis);
        }

        Err(DatabaseError::IdIssuance {
            entity: SequencedEntity::Diagnosis.label(),
            attempts: MAX_ID_RETRIES,
        })
    }

    // ── Demo data ───────────────────────────────────────────

    /// Insert the demo patients `P001..P005` that are not present yet,
    /// together with their demo diagnoses and history entries.
    ///
    /// Diagnoses and history are only added for patients inserted by this
    /// call, so running it twice changes nothing.
    pub fn seed_demo_data(&self) -> Result<SeedSummary, DatabaseError> {
        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = now();
        let mut summary = SeedSummary::default();
        let mut fresh = Vec::new();

        for (id, name, birth, nid, contact, email, address) in DEMO_PATIENTS {
            if repository::get_patient(&tx, id)?.is_some() {
                continue;
            }
            repository::insert_patient(
                &tx,
                &Patient {
                    id: id.to_string(),
                    name: name.to_string(),
                    birth_date: chrono::NaiveDate::parse_from_str(birth, "%Y-%m-%d").ok(),
                    national_id: Some(nid.to_string()),
                    contact: Some(contact.to_string()),
                    email: Some(email.to_string()),
                    address: Some(address.to_string()),
                    created_at: now,
                    updated_at: now,
                },
            )?;
            fresh.push(id);
            summary.patients += 1;
        }

        for (n, (patient_id, confidence, days_ago, notes)) in DEMO_DIAGNOSES.iter().enumerate() {
            if !fresh.contains(patient_id) {
                continue;
            }
            let assessment = assess(*confidence);
            issue_diagnosis(
                &tx,
                &NewDiagnosis {
                    patient_id: patient_id.to_string(),
                    image_reference: Some(format!("sample_images/xray_{}.png", n + 1)),
                    classification: assessment.classification,
                    confidence: *confidence,
                    priority: assessment.priority,
                    notes: Some(notes.to_string()),
                    created_by: DEFAULT_CREATED_BY.to_string(),
                },
                now - Duration::days(*days_ago),
            )?;
            summary.diagnoses += 1;
        }

        for (patient_id, description, condition_type) in DEMO_HISTORY {
            if !fresh.contains(&patient_id) {
                continue;
            }
            repository::insert_history(
                &tx,
                patient_id,
                description,
                Some(condition_type),
                Some(DEFAULT_CREATED_BY),
                now,
            )?;
            summary.history += 1;
        }

        tx.commit()?;
        tracing::info!(
            patients = summary.patients,
            diagnoses = summary.diagnoses,
            history = summary.history,
            "Demo data seeded"
        );
        Ok(summary)
    }
}

/// What `seed_demo_data` inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub patients: usize,
    pub diagnoses: usize,
    pub history: usize,
}

#[derive(Debug, Clone, Copy)]
enum OnExistingIdentity {
    Reject,
    Reuse,
}

type DemoPatient = (
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
);

const DEMO_PATIENTS: [DemoPatient; 5] = [
    ("P001", "Helena Moraes", "1985-03-15", "100.200.300-01", "+1 555 0101", "helena.moraes@example.org", "12 Orchard Lane, Springfield"),
    ("P002", "Tomas Keller", "1972-08-22", "100.200.300-02", "+1 555 0102", "tomas.keller@example.org", "48 Harbor Road, Riverton"),
    ("P003", "Amara Okafor", "1990-11-08", "100.200.300-03", "+1 555 0103", "amara.okafor@example.org", "7 Hillcrest Ave, Lakeside"),
    ("P004", "Lucas Brandt", "1965-05-30", "100.200.300-04", "+1 555 0104", "lucas.brandt@example.org", "310 Market St, Fairview"),
    ("P005", "Ines Duarte", "1998-02-14", "100.200.300-05", "+1 555 0105", "ines.duarte@example.org", "91 Willow Court, Brookfield"),
];

/// Patient, pneumonia probability, age in days, notes.
const DEMO_DIAGNOSES: [(&str, f64, i64, &str); 5] = [
    ("P001", 0.08, 21, "Routine exam, no findings"),
    ("P002", 0.62, 14, "Opacity in the right lung"),
    ("P003", 0.47, 9, "Inconclusive, re-evaluation advised"),
    ("P004", 0.95, 5, "High pneumonia probability, referred to ICU"),
    ("P001", 0.12, 2, "Routine follow-up"),
];

/// Patient, description, condition type.
const DEMO_HISTORY: [(&str, &str, &str); 5] = [
    ("P001", "Penicillin allergy", "allergy"),
    ("P002", "Controlled arterial hypertension", "chronic"),
    ("P002", "Type 2 diabetes", "chronic"),
    ("P004", "Former smoker, quit five years ago", "history"),
    ("P004", "Mild COPD", "chronic"),
];

/// Issue the next `D` ID and insert inside the caller's write transaction.
fn issue_diagnosis(
    conn: &Connection,
    fields: &NewDiagnosis,
    timestamp: NaiveDateTime,
) -> Result<Diagnosis, DatabaseError> {
    if !repository::patient_exists(conn, &fields.patient_id)? {
        return Err(DatabaseError::UnknownPatient(fields.patient_id.clone()));
    }
    let diagnosis = Diagnosis {
        id: next_sequential_id(conn, SequencedEntity::Diagnosis)?,
        patient_id: fields.patient_id.clone(),
        image_reference: fields.image_reference.clone(),
        classification: fields.classification,
        confidence: fields.confidence,
        priority: fields.priority,
        notes: fields.notes.clone(),
        timestamp,
        created_by: fields.created_by.clone(),
    };
    repository::insert_diagnosis(conn, &diagnosis)?;
    Ok(diagnosis)
}

/// Parse and range-check the loosely-typed diagnosis fields.
///
/// Classification is checked first, then priority, then confidence.
pub fn validate_diagnosis_input(input: &DiagnosisInput) -> Result<NewDiagnosis, DatabaseError> {
    let classification = Classification::parse_loose(&input.classification)?;
    let priority = Priority::parse_localized(&input.priority)?;
    let confidence = normalize_confidence(&input.confidence)?;
    let patient_id = input.patient_id.trim();
    if patient_id.is_empty() {
        return Err(DatabaseError::UnknownPatient(String::new()));
    }

    Ok(NewDiagnosis {
        patient_id: patient_id.to_string(),
        image_reference: clean(&input.image_reference),
        classification,
        confidence,
        priority,
        notes: clean(&input.notes),
        created_by: clean(&input.created_by).unwrap_or_else(|| DEFAULT_CREATED_BY.to_string()),
    })
}

/// Accepts `0.82`, `82`, `"82%"` or `"0.82"`; values above 1 are percentages.
pub fn normalize_confidence(input: &ConfidenceInput) -> Result<f64, DatabaseError> {
    let raw = match input {
        ConfidenceInput::Value(v) => *v,
        ConfidenceInput::Text(text) => text
            .trim()
            .trim_end_matches('%')
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .map_err(|_| DatabaseError::InvalidConfidence(text.clone()))?,
    };
    let value = if raw > 1.0 { raw / 100.0 } else { raw };
    check_confidence(value)?;
    Ok(value)
}

fn check_confidence(value: f64) -> Result<(), DatabaseError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(DatabaseError::InvalidConfidence(value.to_string()))
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Trimmed value, `None` when blank.
fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn constraint_code(err: &DatabaseError) -> Option<i32> {
    match err {
        DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(failure, _)) => {
            Some(failure.extended_code)
        }
        _ => None,
    }
}

fn is_primary_key_conflict(err: &DatabaseError) -> bool {
    constraint_code(err) == Some(rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
}

fn is_unique_conflict(err: &DatabaseError) -> bool {
    constraint_code(err) == Some(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("triage.db")).unwrap();
        (dir, store)
    }

    fn diagnosis_input(patient_id: &str, classification: &str, priority: &str) -> DiagnosisInput {
        DiagnosisInput {
            patient_id: patient_id.into(),
            classification: classification.into(),
            confidence: ConfidenceInput::Value(0.82),
            priority: priority.into(),
            image_reference: None,
            notes: None,
            created_by: None,
        }
    }

    fn diagnosis_count(store: &SqliteStore) -> i64 {
        store
            .connection()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM diagnoses", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn register_patient_issues_sequential_ids() {
        let (_dir, store) = test_store();
        let a = store.register_patient(&NewPatient::named("Jane Doe")).unwrap();
        let b = store.register_patient(&NewPatient::named("John Roe")).unwrap();
        assert_eq!(a.id, "P001");
        assert_eq!(b.id, "P002");
        assert_eq!(store.get_patient("P002").unwrap().name, "John Roe");
    }

    #[test]
    fn register_patient_requires_name() {
        let (_dir, store) = test_store();
        let err = store.register_patient(&NewPatient::named("   ")).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidField { field: "name", .. }));
    }

    #[test]
    fn register_patient_rejects_duplicate_national_id() {
        let (_dir, store) = test_store();
        let mut fields = NewPatient::named("Jane Doe");
        fields.national_id = Some("123.456.789-00".into());
        store.register_patient(&fields).unwrap();

        fields.name = "Someone Else".into();
        fields.national_id = Some(" 123.456.789-00 ".into());
        let err = store.register_patient(&fields).unwrap_err();
        match err {
            DatabaseError::DuplicateIdentity { national_id, existing_id } => {
                assert_eq!(national_id, "123.456.789-00");
                assert_eq!(existing_id, "P001");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.list_patients().unwrap().len(), 1);
    }

    #[test]
    fn blank_optional_fields_are_stored_as_null() {
        let (_dir, store) = test_store();
        let mut fields = NewPatient::named("Jane Doe");
        fields.email = Some("  ".into());
        fields.national_id = Some(String::new());
        let patient = store.register_patient(&fields).unwrap();
        assert!(patient.email.is_none());
        assert!(patient.national_id.is_none());
    }

    #[test]
    fn unknown_patient_lookup_fails() {
        let (_dir, store) = test_store();
        let err = store.get_patient("P404").unwrap_err();
        assert!(matches!(err, DatabaseError::UnknownPatient(id) if id == "P404"));
        assert!(store.find_patient("P404").unwrap().is_none());
    }

    #[test]
    fn update_patient_changes_fields_in_place() {
        let (_dir, store) = test_store();
        let created = store.register_patient(&NewPatient::named("Jane Doe")).unwrap();
        let update = PatientUpdate {
            email: Some("jane@example.org".into()),
            contact: Some("555-0199".into()),
            ..PatientUpdate::default()
        };
        let updated = store.update_patient(&created.id, &update).unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Jane Doe");
        assert_eq!(updated.email.as_deref(), Some("jane@example.org"));
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(store.get_patient(&created.id).unwrap(), updated);
    }

    #[test]
    fn update_patient_rejects_taken_national_id() {
        let (_dir, store) = test_store();
        let mut first = NewPatient::named("Jane Doe");
        first.national_id = Some("111".into());
        store.register_patient(&first).unwrap();
        let second = store.register_patient(&NewPatient::named("John Roe")).unwrap();

        let update = PatientUpdate {
            national_id: Some("111".into()),
            ..PatientUpdate::default()
        };
        let err = store.update_patient(&second.id, &update).unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateIdentity { .. }));
    }

    #[test]
    fn register_diagnosis_for_unknown_patient_inserts_nothing() {
        let (_dir, store) = test_store();
        let err = store
            .register_diagnosis(&diagnosis_input("P999", "PNEUMONIA", "CRITICAL"))
            .unwrap_err();
        assert!(matches!(err, DatabaseError::UnknownPatient(id) if id == "P999"));
        assert_eq!(diagnosis_count(&store), 0);
    }

    #[test]
    fn register_diagnosis_rejects_unknown_classification() {
        let (_dir, store) = test_store();
        store.register_patient(&NewPatient::named("Jane Doe")).unwrap();
        let err = store
            .register_diagnosis(&diagnosis_input("P001", "FLU", "HIGH"))
            .unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { ref field, .. } if field == "Classification"));
        assert_eq!(diagnosis_count(&store), 0);
    }

    #[test]
    fn register_diagnosis_rejects_unknown_priority() {
        let (_dir, store) = test_store();
        store.register_patient(&NewPatient::named("Jane Doe")).unwrap();
        let err = store
            .register_diagnosis(&diagnosis_input("P001", "NORMAL", "SOMEDAY"))
            .unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { ref field, .. } if field == "Priority"));
    }

    #[test]
    fn register_diagnosis_normalizes_localized_priority() {
        let (_dir, store) = test_store();
        store.register_patient(&NewPatient::named("Jane Doe")).unwrap();
        let mut input = diagnosis_input("P001", "pneumonia", "Crítica");
        input.confidence = ConfidenceInput::Text("82%".into());
        let diag = store.register_diagnosis(&input).unwrap();
        assert_eq!(diag.id, "D001");
        assert_eq!(diag.classification, Classification::Pneumonia);
        assert_eq!(diag.priority, Priority::Critical);
        assert!((diag.confidence - 0.82).abs() < 1e-9);
        assert_eq!(diag.created_by, DEFAULT_CREATED_BY);
    }

    #[test]
    fn confidence_normalization() {
        assert_eq!(normalize_confidence(&ConfidenceInput::Value(0.5)).unwrap(), 0.5);
        assert!((normalize_confidence(&ConfidenceInput::Value(45.0)).unwrap() - 0.45).abs() < 1e-9);
        assert!((normalize_confidence(&ConfidenceInput::Text("0,7".into())).unwrap() - 0.7).abs() < 1e-9);
        assert!(normalize_confidence(&ConfidenceInput::Text("high".into())).is_err());
        assert!(normalize_confidence(&ConfidenceInput::Value(-0.1)).is_err());
        assert!(normalize_confidence(&ConfidenceInput::Value(250.0)).is_err());
        assert!(normalize_confidence(&ConfidenceInput::Value(f64::NAN)).is_err());
    }

    #[test]
    fn get_diagnosis_by_id_or_patient() {
        let (_dir, store) = test_store();
        store.register_patient(&NewPatient::named("Jane Doe")).unwrap();
        store.register_diagnosis(&diagnosis_input("P001", "NORMAL", "LOW")).unwrap();
        store.register_diagnosis(&diagnosis_input("P001", "PNEUMONIA", "HIGH")).unwrap();

        match store.get_diagnosis("D001").unwrap() {
            DiagnosisLookup::Diagnosis(d) => assert_eq!(d.id, "D001"),
            other => panic!("expected single diagnosis, got {other:?}"),
        }
        match store.get_diagnosis("P001").unwrap() {
            DiagnosisLookup::Patient(list) => {
                assert_eq!(list.len(), 2);
                assert_eq!(list[0].id, "D002");
            }
            other => panic!("expected patient list, got {other:?}"),
        }
        let err = store.get_diagnosis("D777").unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn history_requires_existing_patient() {
        let (_dir, store) = test_store();
        let entry = NewHistoryEntry {
            description: "Penicillin allergy".into(),
            condition_type: None,
            recorded_by: None,
        };
        let err = store.add_history("P001", &entry).unwrap_err();
        assert!(matches!(err, DatabaseError::UnknownPatient(_)));
        assert!(matches!(store.get_history("P001").unwrap_err(), DatabaseError::UnknownPatient(_)));

        store.register_patient(&NewPatient::named("Jane Doe")).unwrap();
        let record = store.add_history("P001", &entry).unwrap();
        assert_eq!(record.condition_type.as_deref(), Some(DEFAULT_CONDITION_TYPE));
        assert_eq!(store.get_history("P001").unwrap(), vec![record]);
    }

    #[test]
    fn seed_is_idempotent_and_ids_continue_after_it() {
        let (_dir, store) = test_store();
        let first = store.seed_demo_data().unwrap();
        assert_eq!(
            first,
            SeedSummary {
                patients: 5,
                diagnoses: 5,
                history: 5
            }
        );
        assert_eq!(store.seed_demo_data().unwrap(), SeedSummary::default());

        let next = store.register_patient(&NewPatient::named("Jane Doe")).unwrap();
        assert_eq!(next.id, "P006");
        let diag = store.register_diagnosis(&diagnosis_input("P006", "PNEUMONIA", "CRITICAL")).unwrap();
        assert_eq!(diag.id, "D006");
    }

    #[test]
    fn seeded_diagnoses_follow_the_triage_policy() {
        let (_dir, store) = test_store();
        store.seed_demo_data().unwrap();

        let all = store.list_diagnoses().unwrap();
        assert_eq!(all.len(), 5);
        for d in &all {
            let expected = assess(d.confidence);
            assert_eq!(d.classification, expected.classification);
            assert_eq!(d.priority, expected.priority);
        }
        assert_eq!(store.diagnoses_for_patient("P001").unwrap().len(), 2);
        assert_eq!(store.get_history("P002").unwrap().len(), 2);
        assert!(store.get_history("P005").unwrap().is_empty());
    }

    #[test]
    fn find_or_register_reuses_national_id() {
        let (_dir, store) = test_store();
        let mut fields = NewPatient::named("Jane Doe");
        fields.national_id = Some("42".into());

        let (first, created) = store.find_or_register_patient(&fields).unwrap();
        assert!(created);
        fields.name = "J. Doe".into();
        let (again, created) = store.find_or_register_patient(&fields).unwrap();
        assert!(!created);
        assert_eq!(again, first);
        assert_eq!(store.list_patients().unwrap().len(), 1);
    }
}
