use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::frequency::Frequency;

/// Medication master data as the engine consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub frequency: Frequency,
    /// Day zero for interval frequencies (every other day, weekly).
    pub schedule_anchor: NaiveDate,
    /// Single-dose fallback used when no pattern covers a date.
    pub fixed_dose: Option<Decimal>,
    /// Key into `dose_caps`.
    pub medication_class: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Maximum single dose for a medication class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseCap {
    pub medication_class: String,
    pub max_single_dose: Decimal,
    pub source: String,
}

/// Input for registering a medication with the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMedication {
    pub name: String,
    pub frequency: Frequency,
    pub schedule_anchor: NaiveDate,
    pub fixed_dose: Option<Decimal>,
    pub medication_class: Option<String>,
}
