pub mod ids;
pub mod sqlite;
pub mod repository;
pub mod store;

pub use sqlite::*;
pub use store::SqliteStore;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Patient {0} not found")]
    UnknownPatient(String),

    #[error("National ID {national_id} is already registered to patient {existing_id}")]
    DuplicateIdentity {
        national_id: String,
        existing_id: String,
    },

    #[error("Invalid confidence value: {0}")]
    InvalidConfidence(String),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Could not issue a unique {entity} ID after {attempts} attempts")]
    IdIssuance { entity: &'static str, attempts: usize },
}
