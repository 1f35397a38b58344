use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{resolve_dose, DosingError};
use crate::models::{DosagePattern, DoseSource, Medication};

/// The pattern whose window contains `date`, if any.
pub fn find_pattern_for_date(patterns: &[DosagePattern], date: NaiveDate) -> Option<&DosagePattern> {
    patterns.iter().find(|p| p.covers(date))
}

/// Expected dose for one medication on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedDose {
    pub date: NaiveDate,
    /// `None` when nothing is due or nothing could be resolved.
    pub dose: Option<Decimal>,
    pub source: DoseSource,
    pub pattern_id: Option<Uuid>,
    pub cycle_day: Option<u32>,
    /// False when the medication's frequency skips this date.
    pub scheduled: bool,
}

/// Resolve the dose expected on `date`.
///
/// Looks up the effective pattern first and falls back to the medication's
/// fixed dose when no pattern covers the date. Non-scheduled dates resolve to
/// no dose, whatever the source.
pub fn resolve_expected_dose(
    medication: &Medication,
    patterns: &[DosagePattern],
    date: NaiveDate,
) -> Result<ExpectedDose, DosingError> {
    let scheduled = medication
        .frequency
        .is_scheduled(medication.schedule_anchor, date);

    if let Some(pattern) = find_pattern_for_date(patterns, date) {
        let resolved = resolve_dose(
            pattern,
            date,
            &medication.frequency,
            medication.schedule_anchor,
        )?;
        tracing::debug!(
            medication_id = %medication.id,
            pattern_id = %pattern.id,
            %date,
            cycle_day = ?resolved.map(|r| r.cycle_day),
            "Resolved dose from pattern"
        );
        return Ok(ExpectedDose {
            date,
            dose: resolved.map(|r| r.dose),
            source: DoseSource::Pattern,
            pattern_id: Some(pattern.id),
            cycle_day: resolved.map(|r| r.cycle_day),
            scheduled,
        });
    }

    match medication.fixed_dose {
        Some(fixed) => Ok(ExpectedDose {
            date,
            dose: scheduled.then_some(fixed),
            source: DoseSource::FixedDose,
            pattern_id: None,
            cycle_day: None,
            scheduled,
        }),
        None => Ok(ExpectedDose {
            date,
            dose: None,
            source: DoseSource::Unresolved,
            pattern_id: None,
            cycle_day: None,
            scheduled,
        }),
    }
}

/// What the write path must do before inserting a new pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertionPlan {
    /// Active pattern to close, with its new inclusive end date.
    pub close: Option<(Uuid, NaiveDate)>,
}

/// Decide how a pattern with window `[start, end]` fits into `existing`.
///
/// With `close_previous`, the active pattern ends the day before `start`.
/// Any remaining overlap with an existing window is a conflict.
pub fn plan_insertion(
    existing: &[DosagePattern],
    start: NaiveDate,
    end: Option<NaiveDate>,
    close_previous: bool,
) -> Result<InsertionPlan, DosingError> {
    let mut close = None;

    if close_previous {
        if let Some(active) = existing.iter().find(|p| p.is_active()) {
            if active.start_date >= start {
                return Err(DosingError::Conflict(format!(
                    "active pattern {} starts on {}, cannot close it before {}",
                    active.id, active.start_date, start
                )));
            }
            close = Some((active.id, start - Duration::days(1)));
        }
    }

    for pattern in existing {
        let window_end = match close {
            Some((id, closed_end)) if id == pattern.id => Some(closed_end),
            _ => pattern.end_date,
        };
        let candidate = DosagePattern {
            end_date: window_end,
            ..pattern.clone()
        };
        if candidate.overlaps(start, end) {
            return Err(DosingError::Conflict(format!(
                "pattern window {}..{} overlaps existing pattern {} ({}..{})",
                start,
                end.map_or("open".to_string(), |d| d.to_string()),
                pattern.id,
                pattern.start_date,
                window_end.map_or("open".to_string(), |d| d.to_string()),
            )));
        }
    }

    Ok(InsertionPlan { close })
}
