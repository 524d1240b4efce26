use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

const DIAGNOSIS_COLUMNS: &str =
    "id, patient_id, image_reference, classification, confidence, priority, notes, timestamp, created_by";

pub fn insert_diagnosis(conn: &Connection, diag: &Diagnosis) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO diagnoses (id, patient_id, image_reference, classification, confidence, priority, notes, timestamp, created_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            diag.id,
            diag.patient_id,
            diag.image_reference,
            diag.classification.as_str(),
            diag.confidence,
            diag.priority.as_str(),
            diag.notes,
            diag.timestamp,
            diag.created_by,
        ],
    )?;
    Ok(())
}

pub fn get_diagnosis_by_id(conn: &Connection, id: &str) -> Result<Option<Diagnosis>, DatabaseError> {
    let sql = format!("SELECT {DIAGNOSIS_COLUMNS} FROM diagnoses WHERE id = ?1");
    let row = conn.query_row(&sql, [id], read_row).optional()?;
    row.map(row_to_diagnosis).transpose()
}

/// Diagnoses of one patient, newest first.
pub fn get_diagnoses_for_patient(
    conn: &Connection,
    patient_id: &str,
) -> Result<Vec<Diagnosis>, DatabaseError> {
    let sql = format!(
        "SELECT {DIAGNOSIS_COLUMNS} FROM diagnoses WHERE patient_id = ?1
         ORDER BY timestamp DESC, CAST(SUBSTR(id, 2) AS INTEGER) DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([patient_id], read_row)?;
    diagnosis_rows_to_vec(rows)
}

/// All diagnoses in ID sequence order.
pub fn get_all_diagnoses(conn: &Connection) -> Result<Vec<Diagnosis>, DatabaseError> {
    let sql = format!(
        "SELECT {DIAGNOSIS_COLUMNS} FROM diagnoses ORDER BY CAST(SUBSTR(id, 2) AS INTEGER), id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], read_row)?;
    diagnosis_rows_to_vec(rows)
}

type DiagnosisRow = (
    String,
    String,
    Option<String>,
    String,
    f64,
    String,
    Option<String>,
    NaiveDateTime,
    String,
);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DiagnosisRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn row_to_diagnosis(row: DiagnosisRow) -> Result<Diagnosis, DatabaseError> {
    let (id, patient_id, image_reference, classification, confidence, priority, notes, timestamp, created_by) = row;
    Ok(Diagnosis {
        id,
        patient_id,
        image_reference,
        classification: Classification::from_str(&classification)?,
        confidence,
        priority: Priority::from_str(&priority)?,
        notes,
        timestamp,
        created_by,
    })
}

fn diagnosis_rows_to_vec(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<DiagnosisRow>>,
) -> Result<Vec<Diagnosis>, DatabaseError> {
    let mut diagnoses = Vec::new();
    for row in rows {
        diagnoses.push(row_to_diagnosis(row?)?);
    }
    Ok(diagnoses)
}
