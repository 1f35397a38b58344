use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dose log query. Dates bound the date component of `taken_at`, inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFilter {
    pub medication_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Only logs whose absolute variance is at least `variance_threshold`.
    pub variance_only: bool,
    pub variance_threshold: Decimal,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            medication_id: None,
            start_date: None,
            end_date: None,
            variance_only: false,
            variance_threshold: Decimal::new(1, 2),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternHistoryFilter {
    pub active_only: bool,
}
