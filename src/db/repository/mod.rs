//! Repository layer: entity-scoped database operations.
//!
//! Free functions over `&Connection`, so the same calls work on a plain
//! connection and inside a `Transaction` (which derefs to one).

mod dose_cap;
mod dose_log;
mod medication;
mod pattern;

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::DatabaseError;

// Re-export all public items from sub-modules
pub use dose_cap::*;
pub use dose_log::*;
pub use medication::*;
pub use pattern::*;

pub(crate) const DATE_FMT: &str = "%Y-%m-%d";
pub(crate) const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub(crate) fn format_datetime(value: &NaiveDateTime) -> String {
    value.format(DATETIME_FMT).to_string()
}

pub(crate) fn parse_uuid(field: &str, value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|_| invalid(field, value))
}

pub(crate) fn parse_date(field: &str, value: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(value, DATE_FMT).map_err(|_| invalid(field, value))
}

pub(crate) fn parse_datetime(field: &str, value: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(value, DATETIME_FMT).map_err(|_| invalid(field, value))
}

pub(crate) fn parse_decimal(field: &str, value: &str) -> Result<Decimal, DatabaseError> {
    Decimal::from_str(value).map_err(|_| invalid(field, value))
}

fn invalid(field: &str, value: &str) -> DatabaseError {
    DatabaseError::InvalidValue {
        field: field.into(),
        value: value.into(),
    }
}
