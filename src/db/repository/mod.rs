//! Repository layer: entity-scoped database operations.
//!
//! Functions here take a borrowed `Connection` (or a transaction, which
//! derefs to one) and do no validation beyond what the schema enforces.
//! Business rules live in `SqliteStore`.

mod diagnosis;
mod history;
mod patient;

pub use diagnosis::*;
pub use history::*;
pub use patient::*;
