//! Sequential record identifiers (`P001`, `D042`, ...).
//!
//! IDs are derived from the highest numeric suffix already stored for the
//! entity, so issuance must run inside the same write transaction as the
//! insert that consumes the ID.

use rusqlite::Connection;

use super::DatabaseError;

/// Minimum number of digits after the prefix.
const ID_DIGITS: usize = 3;

/// Entities whose IDs the store mints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencedEntity {
    Patient,
    Diagnosis,
}

impl SequencedEntity {
    pub fn prefix(&self) -> char {
        match self {
            Self::Patient => 'P',
            Self::Diagnosis => 'D',
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Self::Patient => "patients",
            Self::Diagnosis => "diagnoses",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Diagnosis => "diagnosis",
        }
    }
}

/// Format `prefix` + sequence, zero-padded to at least three digits.
pub fn format_sequential_id(entity: SequencedEntity, sequence: u64) -> String {
    format!("{}{:0width$}", entity.prefix(), sequence, width = ID_DIGITS)
}

/// Highest numeric suffix currently stored (0 when the table is empty).
///
/// Compared numerically so `P1000` sorts after `P999`.
pub fn current_max_sequence(conn: &Connection, entity: SequencedEntity) -> Result<u64, DatabaseError> {
    let sql = format!(
        "SELECT MAX(CAST(SUBSTR(id, 2) AS INTEGER)) FROM {} WHERE id LIKE '{}%'",
        entity.table(),
        entity.prefix()
    );
    let max: Option<i64> = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(max.map(|m| m.max(0) as u64).unwrap_or(0))
}

/// Next free ID for the entity. Call inside the inserting transaction.
pub fn next_sequential_id(conn: &Connection, entity: SequencedEntity) -> Result<String, DatabaseError> {
    let next = current_max_sequence(conn, entity)? + 1;
    Ok(format_sequential_id(entity, next))
}
