use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::models::{
    AdvisoryWarning, DoseCap, Frequency, NewDoseLog, NewMedication, NewPattern, PageRequest,
    WarningCode,
};

/// One broken rule. Positions are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Violation {
    SequenceLength { len: usize, min: usize, max: usize },
    DoseOutOfRange { position: usize, value: Decimal, min: Decimal, max: Decimal },
    ExceedsClassCap { position: usize, value: Decimal, class: String, cap: Decimal },
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
    StartTooFarInPast { start: NaiveDate, max_days: i64 },
    NotesTooLong { len: usize, max: usize },
    DosageOutOfRange { value: Decimal, max: Decimal },
    TakenAtInFuture { taken_at: NaiveDateTime, max_days: i64 },
    PageOutOfRange { page: u32 },
    PageSizeOutOfRange { page_size: u32, max: u32 },
    ScheduleDaysOutOfRange { days: u32, max: u32 },
    ScheduleBeyondCalendar { start: NaiveDate, days: u32 },
    MissingName,
    NoWeekdays,
    FixedDoseOutOfRange { value: Decimal, min: Decimal, max: Decimal },
    CapOutOfRange { value: Decimal, min: Decimal, max: Decimal },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::SequenceLength { len, min, max } => {
                write!(f, "sequence has {len} values, must have {min} to {max}")
            }
            Violation::DoseOutOfRange { position, value, min, max } => {
                write!(f, "value {value} at position {position} is outside {min}-{max}")
            }
            Violation::ExceedsClassCap { position, value, class, cap } => write!(
                f,
                "value {value} at position {position} exceeds the {class} maximum single dose of {cap}"
            ),
            Violation::EndBeforeStart { start, end } => {
                write!(f, "end date {end} is before start date {start}")
            }
            Violation::StartTooFarInPast { start, max_days } => {
                write!(f, "start date {start} is more than {max_days} days in the past")
            }
            Violation::NotesTooLong { len, max } => {
                write!(f, "notes are {len} characters, limit is {max}")
            }
            Violation::DosageOutOfRange { value, max } => {
                write!(f, "dosage {value} is outside 0-{max}")
            }
            Violation::TakenAtInFuture { taken_at, max_days } => {
                write!(f, "taken_at {taken_at} is more than {max_days} day(s) in the future")
            }
            Violation::PageOutOfRange { page } => write!(f, "page {page} must be 1 or greater"),
            Violation::PageSizeOutOfRange { page_size, max } => {
                write!(f, "page_size {page_size} must be between 1 and {max}")
            }
            Violation::ScheduleDaysOutOfRange { days, max } => {
                write!(f, "days {days} must be between 1 and {max}")
            }
            Violation::ScheduleBeyondCalendar { start, days } => {
                write!(f, "{days} days from {start} runs past the last supported date")
            }
            Violation::MissingName => f.write_str("medication name is empty"),
            Violation::NoWeekdays => f.write_str("custom frequency lists no weekdays"),
            Violation::FixedDoseOutOfRange { value, min, max } => {
                write!(f, "fixed dose {value} is outside {min}-{max}")
            }
            Violation::CapOutOfRange { value, min, max } => {
                write!(f, "maximum single dose {value} is outside {min}-{max}")
            }
        }
    }
}

/// Every rule a request broke, in a fixed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{}", join_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn into_result(violations: Vec<Violation>) -> Result<(), ValidationError> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { violations })
    }
}

fn check_notes(notes: Option<&str>, config: &EngineConfig, out: &mut Vec<Violation>) {
    if let Some(notes) = notes {
        let len = notes.chars().count();
        if len > config.max_notes_len {
            out.push(Violation::NotesTooLong {
                len,
                max: config.max_notes_len,
            });
        }
    }
}

/// Check a pattern before it is persisted.
///
/// Hard rules reject with every violation listed. On success, returns the
/// advisory warnings for the caller to present.
pub fn validate_pattern(
    input: &NewPattern,
    cap: Option<&DoseCap>,
    config: &EngineConfig,
    today: NaiveDate,
) -> Result<Vec<AdvisoryWarning>, ValidationError> {
    let mut violations = Vec::new();
    let len = input.sequence.len();

    if len < config.min_pattern_length || len > config.max_pattern_length {
        violations.push(Violation::SequenceLength {
            len,
            min: config.min_pattern_length,
            max: config.max_pattern_length,
        });
    }

    for (i, value) in input.sequence.iter().enumerate() {
        if *value < config.min_dose || *value > config.max_dose {
            violations.push(Violation::DoseOutOfRange {
                position: i + 1,
                value: *value,
                min: config.min_dose,
                max: config.max_dose,
            });
        } else if let Some(cap) = cap {
            if *value > cap.max_single_dose {
                violations.push(Violation::ExceedsClassCap {
                    position: i + 1,
                    value: *value,
                    class: cap.medication_class.clone(),
                    cap: cap.max_single_dose,
                });
            }
        }
    }

    if let Some(end) = input.end_date {
        if end < input.start_date {
            violations.push(Violation::EndBeforeStart {
                start: input.start_date,
                end,
            });
        }
    }

    let days_back = (today - input.start_date).num_days();
    if days_back > config.max_backdate_days {
        violations.push(Violation::StartTooFarInPast {
            start: input.start_date,
            max_days: config.max_backdate_days,
        });
    }

    check_notes(input.notes.as_deref(), config, &mut violations);
    into_result(violations)?;

    let mut warnings = Vec::new();
    if len == 1 {
        warnings.push(AdvisoryWarning {
            code: WarningCode::SingleValuePattern,
            message: "Pattern has a single value; a fixed dose may be simpler".into(),
        });
    }
    if len > config.long_pattern_warning {
        warnings.push(AdvisoryWarning {
            code: WarningCode::LongPattern,
            message: format!(
                "Pattern has {len} values (more than {}); check it was entered correctly",
                config.long_pattern_warning
            ),
        });
    }
    if days_back > config.backdate_warning_days {
        warnings.push(AdvisoryWarning {
            code: WarningCode::Backdated,
            message: format!(
                "Pattern starts {days_back} days ago; historical schedules will change"
            ),
        });
    }
    Ok(warnings)
}

/// Check a dose record before variance is computed. Zero records a skipped dose.
pub fn validate_dose_log(
    input: &NewDoseLog,
    config: &EngineConfig,
    now: NaiveDateTime,
) -> Result<(), ValidationError> {
    let mut violations = Vec::new();

    if input.dosage < Decimal::ZERO || input.dosage > config.max_dose {
        violations.push(Violation::DosageOutOfRange {
            value: input.dosage,
            max: config.max_dose,
        });
    }

    // A limit past the end of the calendar means no future stamp is too late
    let latest = Duration::try_days(config.max_future_log_days).and_then(|d| now.checked_add_signed(d));
    if latest.is_some_and(|latest| input.taken_at > latest) {
        violations.push(Violation::TakenAtInFuture {
            taken_at: input.taken_at,
            max_days: config.max_future_log_days,
        });
    }

    check_notes(input.notes.as_deref(), config, &mut violations);
    into_result(violations)
}

pub fn validate_page(page: PageRequest, config: &EngineConfig) -> Result<(), ValidationError> {
    let mut violations = Vec::new();
    if page.page < 1 {
        violations.push(Violation::PageOutOfRange { page: page.page });
    }
    if page.page_size < 1 || page.page_size > config.max_page_size {
        violations.push(Violation::PageSizeOutOfRange {
            page_size: page.page_size,
            max: config.max_page_size,
        });
    }
    into_result(violations)
}

pub fn validate_schedule_days(days: u32, config: &EngineConfig) -> Result<(), ValidationError> {
    if days < 1 || days > config.max_schedule_days {
        return Err(ValidationError {
            violations: vec![Violation::ScheduleDaysOutOfRange {
                days,
                max: config.max_schedule_days,
            }],
        });
    }
    Ok(())
}

pub fn validate_medication(input: &NewMedication, config: &EngineConfig) -> Result<(), ValidationError> {
    let mut violations = Vec::new();
    if input.name.trim().is_empty() {
        violations.push(Violation::MissingName);
    }
    if let Frequency::Custom { weekdays } = &input.frequency {
        if weekdays.is_empty() {
            violations.push(Violation::NoWeekdays);
        }
    }
    if let Some(fixed) = input.fixed_dose {
        if fixed < config.min_dose || fixed > config.max_dose {
            violations.push(Violation::FixedDoseOutOfRange {
                value: fixed,
                min: config.min_dose,
                max: config.max_dose,
            });
        }
    }
    into_result(violations)
}

pub fn validate_dose_cap(max_single_dose: Decimal, config: &EngineConfig) -> Result<(), ValidationError> {
    if max_single_dose < config.min_dose || max_single_dose > config.max_dose {
        return Err(ValidationError {
            violations: vec![Violation::CapOutOfRange {
                value: max_single_dose,
                min: config.min_dose,
                max: config.max_dose,
            }],
        });
    }
    Ok(())
}
