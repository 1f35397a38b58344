use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::WarningCode;

/// A cyclic dose sequence with a validity window.
///
/// The window is `[start_date, end_date]` with `end_date` inclusive, or
/// open-ended when `end_date` is `None` (the active pattern).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DosagePattern {
    pub id: Uuid,
    pub medication_id: Uuid,
    pub sequence: Vec<Decimal>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

impl DosagePattern {
    pub fn cycle_length(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_active(&self) -> bool {
        self.end_date.is_none()
    }

    /// Whether `date` falls inside this pattern's window.
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.start_date && self.end_date.map_or(true, |end| date <= end)
    }

    /// Whether this window shares at least one day with `[start, end]`.
    pub fn overlaps(&self, start: NaiveDate, end: Option<NaiveDate>) -> bool {
        let starts_before_other_ends = end.map_or(true, |e| self.start_date <= e);
        let other_starts_before_self_ends = self.end_date.map_or(true, |e| start <= e);
        starts_before_other_ends && other_starts_before_self_ends
    }
}

fn default_close_previous() -> bool {
    true
}

/// Request to create a pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPattern {
    pub medication_id: Uuid,
    pub sequence: Vec<Decimal>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Close the current active pattern the day before `start_date`.
    #[serde(default = "default_close_previous")]
    pub close_previous: bool,
}

/// Informational flag returned with a successful validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryWarning {
    pub code: WarningCode,
    pub message: String,
}

/// Result of a successful pattern creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternCreated {
    pub pattern: DosagePattern,
    /// The previously active pattern, as closed by this write.
    pub closed_previous: Option<DosagePattern>,
    pub warnings: Vec<AdvisoryWarning>,
}
