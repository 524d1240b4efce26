use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::MedicalHistory;

/// Append a history entry and return it with its assigned row ID.
pub fn insert_history(
    conn: &Connection,
    patient_id: &str,
    description: &str,
    condition_type: Option<&str>,
    recorded_by: Option<&str>,
    date_recorded: NaiveDateTime,
) -> Result<MedicalHistory, DatabaseError> {
    conn.execute(
        "INSERT INTO medical_history (patient_id, description, condition_type, date_recorded, recorded_by)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![patient_id, description, condition_type, date_recorded, recorded_by],
    )?;
    Ok(MedicalHistory {
        id: conn.last_insert_rowid(),
        patient_id: patient_id.to_string(),
        description: description.to_string(),
        condition_type: condition_type.map(str::to_string),
        date_recorded,
        recorded_by: recorded_by.map(str::to_string),
    })
}

/// History of one patient in recording order.
pub fn get_history_for_patient(
    conn: &Connection,
    patient_id: &str,
) -> Result<Vec<MedicalHistory>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, description, condition_type, date_recorded, recorded_by
         FROM medical_history WHERE patient_id = ?1 ORDER BY date_recorded, id",
    )?;

    let rows = stmt.query_map([patient_id], |row| {
        Ok(MedicalHistory {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            description: row.get(2)?,
            condition_type: row.get(3)?,
            date_recorded: row.get(4)?,
            recorded_by: row.get(5)?,
        })
    })?;

    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}
