use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::DatabaseError;
use crate::models::Patient;

const PATIENT_COLUMNS: &str =
    "id, name, birth_date, national_id, contact, email, address, created_at, updated_at";

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, name, birth_date, national_id, contact, email, address, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            patient.id,
            patient.name,
            patient.birth_date,
            patient.national_id,
            patient.contact,
            patient.email,
            patient.address,
            patient.created_at,
            patient.updated_at,
        ],
    )?;
    Ok(())
}

pub fn update_patient_row(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE patients SET name = ?2, birth_date = ?3, national_id = ?4, contact = ?5,
                email = ?6, address = ?7, updated_at = ?8
         WHERE id = ?1",
        params![
            patient.id,
            patient.name,
            patient.birth_date,
            patient.national_id,
            patient.contact,
            patient.email,
            patient.address,
            patient.updated_at,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::UnknownPatient(patient.id.clone()));
    }
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &str) -> Result<Option<Patient>, DatabaseError> {
    let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1");
    let patient = conn.query_row(&sql, [id], patient_from_row).optional()?;
    Ok(patient)
}

pub fn find_patient_by_national_id(
    conn: &Connection,
    national_id: &str,
) -> Result<Option<Patient>, DatabaseError> {
    let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE national_id = ?1");
    let patient = conn
        .query_row(&sql, [national_id], patient_from_row)
        .optional()?;
    Ok(patient)
}

pub fn patient_exists(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM patients WHERE id = ?1",
        [id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// All patients in ID sequence order.
pub fn list_patients(conn: &Connection) -> Result<Vec<Patient>, DatabaseError> {
    let sql = format!(
        "SELECT {PATIENT_COLUMNS} FROM patients ORDER BY CAST(SUBSTR(id, 2) AS INTEGER), id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], patient_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        name: row.get(1)?,
        birth_date: row.get(2)?,
        national_id: row.get(3)?,
        contact: row.get(4)?,
        email: row.get(5)?,
        address: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
