use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::DoseSource;

/// A recorded dose event. Every derived field is fixed at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationLog {
    pub id: Uuid,
    pub medication_id: Uuid,
    pub dosage: Decimal,
    /// Local wall-clock time; its date selects the pattern.
    pub taken_at: NaiveDateTime,
    pub expected_dosage: Option<Decimal>,
    pub expected_source: DoseSource,
    pub pattern_id: Option<Uuid>,
    pub pattern_day_number: Option<u32>,
    pub has_variance: bool,
    pub variance_amount: Option<Decimal>,
    pub variance_percentage: Option<Decimal>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Input for recording a dose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDoseLog {
    pub medication_id: Uuid,
    pub dosage: Decimal,
    pub taken_at: NaiveDateTime,
    #[serde(default)]
    pub notes: Option<String>,
}
