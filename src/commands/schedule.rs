use chrono::NaiveDate;
use rusqlite::Connection;
use uuid::Uuid;

use super::state::EngineContext;
use crate::db::repository::get_patterns_for_medication;
use crate::dosing::{self, DosingError, ScheduleResult};

/// Day-by-day schedule for `days` dates starting at `start_date`.
pub fn generate_schedule(
    conn: &Connection,
    ctx: &EngineContext,
    medication_id: &Uuid,
    start_date: NaiveDate,
    days: u32,
) -> Result<ScheduleResult, DosingError> {
    let medication = ctx.owned_medication(conn, medication_id)?;
    let patterns = get_patterns_for_medication(conn, &medication.id)?;
    dosing::generate_schedule(&medication, &patterns, start_date, days, &ctx.config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{create_pattern, register_medication};
    use crate::config::EngineConfig;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{Frequency, NewMedication, NewPattern};
    use rust_decimal::Decimal;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn ctx(owner: &str) -> EngineContext {
        EngineContext::new(
            owner,
            date("2025-01-20").and_hms_opt(9, 0, 0).unwrap(),
            EngineConfig::default(),
        )
    }

    fn add_pattern(conn: &Connection, medication_id: Uuid, values: &[i64], start: &str) {
        create_pattern(
            conn,
            &ctx("user-1"),
            NewPattern {
                medication_id,
                sequence: values.iter().map(|v| Decimal::from(*v)).collect(),
                start_date: date(start),
                end_date: None,
                notes: None,
                close_previous: true,
            },
        )
        .unwrap();
    }

    #[test]
    fn schedule_spans_pattern_change() {
        let conn = open_memory_database().unwrap();
        let med = register_medication(
            &conn,
            &ctx("user-1"),
            NewMedication {
                name: "Warfarin".into(),
                frequency: Frequency::Daily,
                schedule_anchor: date("2024-12-01"),
                fixed_dose: None,
                medication_class: None,
            },
        )
        .unwrap();
        add_pattern(&conn, med.id, &[4, 3, 3], "2024-12-01");
        add_pattern(&conn, med.id, &[4, 4, 3, 4, 3, 3], "2025-01-15");

        let result = generate_schedule(&conn, &ctx("user-1"), &med.id, date("2025-01-10"), 11).unwrap();
        let transitions: Vec<NaiveDate> = result
            .days
            .iter()
            .filter(|d| d.is_transition)
            .map(|d| d.date)
            .collect();
        assert_eq!(transitions, vec![date("2025-01-15")]);
        assert_eq!(result.days[10].cycle_day, Some(6));

        let err = generate_schedule(&conn, &ctx("user-2"), &med.id, date("2025-01-10"), 11).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
