use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{resolve_expected_dose, validate_schedule_days, DosingError, ValidationError, Violation};
use crate::config::EngineConfig;
use crate::models::{DayStatus, DosagePattern, DoseSource, Medication};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDay {
    pub date: NaiveDate,
    pub dose: Option<Decimal>,
    pub status: DayStatus,
    pub source: DoseSource,
    pub pattern_id: Option<Uuid>,
    pub cycle_day: Option<u32>,
    pub is_transition: bool,
    pub transition_note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub total_dose: Decimal,
    /// Mean over dosed days, 2 dp.
    pub mean_dose: Option<Decimal>,
    pub min_dose: Option<Decimal>,
    pub max_dose: Option<Decimal>,
    pub dosed_days: u32,
    pub unscheduled_days: u32,
    pub unresolved_days: u32,
    pub transitions: u32,
    /// In order of first appearance.
    pub patterns_encountered: Vec<Uuid>,
    /// Completed cycles across all patterns in range, 2 dp.
    pub cycle_count: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleResult {
    pub medication_id: Uuid,
    pub start_date: NaiveDate,
    /// Last day in the schedule, inclusive.
    pub end_date: NaiveDate,
    pub days: Vec<ScheduleDay>,
    pub summary: ScheduleSummary,
}

/// Indefinite article for a cycle length read aloud: "an 8-day", "an 11-day", "a 3-day".
fn article(len: usize) -> &'static str {
    let digits = len.to_string();
    // Leading group of thousands decides how the number is spoken
    let lead = match digits.len() % 3 {
        0 => 3,
        rem => rem,
    };
    let head = &digits[..lead];
    if head.starts_with('8') || head == "11" || head == "18" {
        "an"
    } else {
        "a"
    }
}

fn describe(pattern_id: Option<Uuid>, source: DoseSource, lengths: &HashMap<Uuid, usize>) -> String {
    match pattern_id.and_then(|id| lengths.get(&id)) {
        Some(len) => format!("{} {len}-day cycle", article(*len)),
        None if source == DoseSource::FixedDose => "the fixed dose".to_string(),
        None => "no defined dose".to_string(),
    }
}

/// Project `days` consecutive dates from `start` into a dose schedule.
///
/// A day is a transition when its pattern differs from the previous day's;
/// the first day never is. Fails with `NotFound` when no day resolves to
/// either a pattern or a fixed dose.
pub fn generate_schedule(
    medication: &Medication,
    patterns: &[DosagePattern],
    start: NaiveDate,
    days: u32,
    config: &EngineConfig,
) -> Result<ScheduleResult, DosingError> {
    validate_schedule_days(days, config)?;
    let end = start
        .checked_add_days(Days::new(u64::from(days) - 1))
        .ok_or_else(|| ValidationError {
            violations: vec![Violation::ScheduleBeyondCalendar { start, days }],
        })?;

    let lengths: HashMap<Uuid, usize> = patterns.iter().map(|p| (p.id, p.cycle_length())).collect();
    let mut schedule = Vec::with_capacity(days as usize);
    let mut previous: Option<(Option<Uuid>, DoseSource)> = None;

    let mut total = Decimal::ZERO;
    let mut min_dose: Option<Decimal> = None;
    let mut max_dose: Option<Decimal> = None;
    let mut dosed_days = 0u32;
    let mut unscheduled_days = 0u32;
    let mut unresolved_days = 0u32;
    let mut transitions = 0u32;
    let mut patterns_encountered: Vec<Uuid> = Vec::new();
    let mut covered: HashMap<Uuid, u32> = HashMap::new();

    for date in start.iter_days().take_while(|d| *d <= end) {
        let expected = resolve_expected_dose(medication, patterns, date)?;

        let status = match (expected.source, expected.dose) {
            (DoseSource::Unresolved, _) => DayStatus::NotFound,
            (_, Some(_)) => DayStatus::Dosed,
            (_, None) => DayStatus::NotScheduled,
        };

        let (is_transition, transition_note) = match previous {
            Some((prev_id, prev_source))
                if prev_id != expected.pattern_id || prev_source != expected.source =>
            {
                let note = format!(
                    "pattern changed from {} to {}",
                    describe(prev_id, prev_source, &lengths),
                    describe(expected.pattern_id, expected.source, &lengths)
                );
                (true, Some(note))
            }
            _ => (false, None),
        };
        previous = Some((expected.pattern_id, expected.source));

        if is_transition {
            transitions += 1;
        }
        if let Some(id) = expected.pattern_id {
            if !patterns_encountered.contains(&id) {
                patterns_encountered.push(id);
            }
        }

        match status {
            DayStatus::Dosed => {
                dosed_days += 1;
                if let Some(dose) = expected.dose {
                    total += dose;
                    min_dose = Some(min_dose.map_or(dose, |m| m.min(dose)));
                    max_dose = Some(max_dose.map_or(dose, |m| m.max(dose)));
                }
                if let Some(id) = expected.pattern_id {
                    *covered.entry(id).or_insert(0) += 1;
                }
            }
            DayStatus::NotScheduled => unscheduled_days += 1,
            DayStatus::NotFound => unresolved_days += 1,
        }

        schedule.push(ScheduleDay {
            date,
            dose: expected.dose,
            status,
            source: expected.source,
            pattern_id: expected.pattern_id,
            cycle_day: expected.cycle_day,
            is_transition,
            transition_note,
        });
    }

    if unresolved_days == days {
        tracing::warn!(medication_id = %medication.id, %start, days, "No dose defined for any day in range");
        return Err(DosingError::not_found("DosagePattern", medication.id));
    }

    let cycle_count = patterns_encountered
        .iter()
        .filter_map(|id| {
            let len = *lengths.get(id)?;
            let dosed = *covered.get(id)?;
            (len > 0).then(|| Decimal::from(dosed) / Decimal::from(len))
        })
        .sum::<Decimal>()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    let mean_dose = (dosed_days > 0).then(|| {
        (total / Decimal::from(dosed_days)).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    });

    tracing::debug!(
        medication_id = %medication.id,
        %start,
        days,
        dosed_days,
        transitions,
        "Generated schedule"
    );

    Ok(ScheduleResult {
        medication_id: medication.id,
        start_date: start,
        end_date: end,
        days: schedule,
        summary: ScheduleSummary {
            total_dose: total,
            mean_dose,
            min_dose,
            max_dose,
            dosed_days,
            unscheduled_days,
            unresolved_days,
            transitions,
            patterns_encountered,
            cycle_count,
        },
    })
}
