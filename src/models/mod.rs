pub mod diagnosis;
pub mod enums;
pub mod history;
pub mod patient;

pub use diagnosis::*;
pub use history::*;
pub use patient::*;
