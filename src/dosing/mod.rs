//! Dosage pattern engine core.
//!
//! Pure computation over snapshots read from the store:
//! 1. Calculator: date to cycle position and dose
//! 2. Resolver: which pattern is effective on a date, and the write plan
//! 3. Validation: hard rules and advisory warnings
//! 4. Schedule: day-by-day projection with summary
//! 5. Variance: expected versus recorded dose

mod calculator;
mod resolver;
mod schedule;
mod validation;
mod variance;

use chrono::NaiveDate;
use thiserror::Error;

use crate::db::DatabaseError;

// ═══════════════════════════════════════════════════════════════════════════
// Error type
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Error, Debug)]
pub enum DosingError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {entity} {id}")]
    NotFound { entity: String, id: String },

    #[error("Date {date} is before pattern start {start}")]
    DateBeforePattern { date: NaiveDate, start: NaiveDate },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for DosingError {
    fn from(e: rusqlite::Error) -> Self {
        DosingError::Database(DatabaseError::Sqlite(e))
    }
}

impl DosingError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        DosingError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code for callers.
    pub fn code(&self) -> &'static str {
        match self {
            DosingError::Validation(_) => "VALIDATION",
            DosingError::Conflict(_) => "CONFLICT",
            DosingError::NotFound { .. } => "NOT_FOUND",
            DosingError::DateBeforePattern { .. } => "INVALID_DATE",
            DosingError::Database(_) => "STORAGE",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports
// ═══════════════════════════════════════════════════════════════════════════

pub use calculator::*;
pub use resolver::*;
pub use schedule::*;
pub use validation::*;
pub use variance::*;
