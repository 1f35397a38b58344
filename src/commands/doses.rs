//! Dose recording with frozen variance, log queries, single-date lookup.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rusqlite::Connection;
use uuid::Uuid;

use super::state::EngineContext;
use crate::db::repository::{get_patterns_for_medication, insert_dose_log, query_dose_logs};
use crate::dosing::{
    compute_variance, resolve_expected_dose, validate_dose_log, validate_page, DosingError,
    ExpectedDose,
};
use crate::models::{DoseSource, LogFilter, MedicationLog, NewDoseLog, PageRequest, PagedList};

/// Expected dose for one date, from the pattern effective on it or the fixed dose.
pub fn get_expected_dose(
    conn: &Connection,
    ctx: &EngineContext,
    medication_id: &Uuid,
    date: NaiveDate,
) -> Result<ExpectedDose, DosingError> {
    let medication = ctx.owned_medication(conn, medication_id)?;
    let patterns = get_patterns_for_medication(conn, &medication.id)?;
    resolve_expected_dose(&medication, &patterns, date)
}

/// Record a dose and freeze its variance against the dose due that day.
///
/// Later pattern changes never touch a stored log.
pub fn record_dose(
    conn: &Connection,
    ctx: &EngineContext,
    input: NewDoseLog,
) -> Result<MedicationLog, DosingError> {
    validate_dose_log(&input, &ctx.config, ctx.now)?;

    let medication = ctx.owned_medication(conn, &input.medication_id)?;
    let patterns = get_patterns_for_medication(conn, &medication.id)?;
    let expected = resolve_expected_dose(&medication, &patterns, input.taken_at.date())?;

    // Nothing was due on an unscheduled day
    let expected_dosage = match expected.source {
        DoseSource::Unresolved => None,
        _ => Some(expected.dose.unwrap_or(Decimal::ZERO)),
    };
    let variance = compute_variance(expected_dosage, input.dosage, ctx.config.variance_tolerance);

    let log = MedicationLog {
        id: Uuid::new_v4(),
        medication_id: medication.id,
        dosage: input.dosage,
        taken_at: input.taken_at,
        expected_dosage,
        expected_source: expected.source,
        pattern_id: expected.pattern_id,
        pattern_day_number: expected.cycle_day,
        has_variance: variance.has_variance,
        variance_amount: variance.amount,
        variance_percentage: variance.percentage,
        notes: input.notes,
        created_at: ctx.now,
    };
    insert_dose_log(conn, &log)?;

    tracing::info!(
        log_id = %log.id,
        medication_id = %log.medication_id,
        source = %log.expected_source,
        has_variance = log.has_variance,
        "Recorded dose"
    );
    Ok(log)
}

/// Logs visible to the caller, newest first, one page at a time.
pub fn get_logs(
    conn: &Connection,
    ctx: &EngineContext,
    filter: &LogFilter,
    page: PageRequest,
) -> Result<PagedList<MedicationLog>, DosingError> {
    validate_page(page, &ctx.config)?;
    if let Some(medication_id) = &filter.medication_id {
        ctx.owned_medication(conn, medication_id)?;
    }

    Ok(query_dose_logs(conn, &ctx.owner_id, filter, page)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{create_pattern, register_medication};
    use crate::config::EngineConfig;
    use crate::db::repository::get_dose_log;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{Frequency, NewMedication, NewPattern};
    use chrono::NaiveDateTime;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn ctx(owner: &str) -> EngineContext {
        EngineContext::new(owner, at("2025-01-25 09:00"), EngineConfig::default())
    }

    fn seed(conn: &Connection, frequency: Frequency, fixed: Option<&str>) -> Uuid {
        register_medication(
            conn,
            &ctx("user-1"),
            NewMedication {
                name: "Warfarin".into(),
                frequency,
                schedule_anchor: date("2025-01-15"),
                fixed_dose: fixed.map(dec),
                medication_class: None,
            },
        )
        .unwrap()
        .id
    }

    fn add_pattern(conn: &Connection, medication_id: Uuid, values: &[&str], start: &str) -> Uuid {
        create_pattern(
            conn,
            &ctx("user-1"),
            NewPattern {
                medication_id,
                sequence: values.iter().map(|v| dec(v)).collect(),
                start_date: date(start),
                end_date: None,
                notes: None,
                close_previous: true,
            },
        )
        .unwrap()
        .pattern
        .id
    }

    fn dose(medication_id: Uuid, amount: &str, taken_at: &str) -> NewDoseLog {
        NewDoseLog {
            medication_id,
            dosage: dec(amount),
            taken_at: at(taken_at),
            notes: None,
        }
    }

    #[test]
    fn under_dose_against_pattern() {
        let conn = open_memory_database().unwrap();
        let med_id = seed(&conn, Frequency::Daily, None);
        let pattern_id = add_pattern(&conn, med_id, &["4.0", "4.0", "3.0", "4.0", "3.0", "3.0"], "2025-01-15");

        let log = record_dose(&conn, &ctx("user-1"), dose(med_id, "3.0", "2025-01-15 08:00")).unwrap();
        assert_eq!(log.expected_dosage, Some(dec("4.0")));
        assert_eq!(log.expected_source, DoseSource::Pattern);
        assert_eq!(log.pattern_id, Some(pattern_id));
        assert_eq!(log.pattern_day_number, Some(1));
        assert_eq!(log.variance_amount, Some(dec("-1.0")));
        assert_eq!(log.variance_percentage, Some(dec("-25")));
        assert!(log.has_variance);

        let exact = record_dose(&conn, &ctx("user-1"), dose(med_id, "3.0", "2025-01-20 21:00")).unwrap();
        assert_eq!(exact.pattern_day_number, Some(6));
        assert!(!exact.has_variance);
    }

    #[test]
    fn backdated_correction_keeps_stored_variance() {
        let conn = open_memory_database().unwrap();
        let med_id = seed(&conn, Frequency::Daily, None);
        add_pattern(&conn, med_id, &["4"], "2025-01-10");

        let log = record_dose(&conn, &ctx("user-1"), dose(med_id, "3", "2025-01-20 08:00")).unwrap();
        assert!(log.has_variance);

        // Correction starting before the logged date
        add_pattern(&conn, med_id, &["3"], "2025-01-18");

        let stored = get_dose_log(&conn, &log.id).unwrap().unwrap();
        assert_eq!(stored, log);
        assert_eq!(stored.expected_dosage, Some(dec("4")));

        // New logs see the correction
        let next = record_dose(&conn, &ctx("user-1"), dose(med_id, "3", "2025-01-21 08:00")).unwrap();
        assert!(!next.has_variance);
    }

    #[test]
    fn unscheduled_day_expects_nothing() {
        let conn = open_memory_database().unwrap();
        let med_id = seed(&conn, Frequency::EveryOtherDay, None);
        add_pattern(&conn, med_id, &["4", "3", "3"], "2025-01-15");

        let log = record_dose(&conn, &ctx("user-1"), dose(med_id, "4", "2025-01-16 08:00")).unwrap();
        assert_eq!(log.expected_dosage, Some(Decimal::ZERO));
        assert_eq!(log.variance_amount, Some(dec("4")));
        assert!(log.variance_percentage.is_none());
        assert!(log.pattern_day_number.is_none());
        assert!(log.has_variance);
    }

    #[test]
    fn fixed_dose_fallback_and_unresolved() {
        let conn = open_memory_database().unwrap();
        let fixed = seed(&conn, Frequency::Daily, Some("5"));
        let log = record_dose(&conn, &ctx("user-1"), dose(fixed, "5", "2025-01-20 08:00")).unwrap();
        assert_eq!(log.expected_source, DoseSource::FixedDose);
        assert!(!log.has_variance);

        let bare = seed(&conn, Frequency::Daily, None);
        let log = record_dose(&conn, &ctx("user-1"), dose(bare, "5", "2025-01-20 08:00")).unwrap();
        assert_eq!(log.expected_source, DoseSource::Unresolved);
        assert!(log.expected_dosage.is_none());
        assert!(log.variance_amount.is_none());
        assert!(!log.has_variance);
    }

    #[test]
    fn invalid_dose_is_rejected_before_lookup() {
        let conn = open_memory_database().unwrap();
        let err = record_dose(&conn, &ctx("user-1"), dose(Uuid::new_v4(), "-2", "2025-01-20 08:00")).unwrap_err();
        assert_eq!(err.code(), "VALIDATION");

        let err = record_dose(&conn, &ctx("user-1"), dose(Uuid::new_v4(), "2", "2025-01-20 08:00")).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn expected_dose_for_a_date() {
        let conn = open_memory_database().unwrap();
        let med_id = seed(&conn, Frequency::Daily, None);
        add_pattern(&conn, med_id, &["4", "4", "3", "4", "3", "3"], "2025-01-15");

        let expected = get_expected_dose(&conn, &ctx("user-1"), &med_id, date("2025-01-21")).unwrap();
        assert_eq!(expected.dose, Some(dec("4")));
        assert_eq!(expected.cycle_day, Some(1));

        let err = get_expected_dose(&conn, &ctx("user-2"), &med_id, date("2025-01-21")).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn logs_filter_by_variance_threshold() {
        let conn = open_memory_database().unwrap();
        let med_id = seed(&conn, Frequency::Daily, None);
        add_pattern(&conn, med_id, &["4"], "2025-01-15");

        record_dose(&conn, &ctx("user-1"), dose(med_id, "4", "2025-01-16 08:00")).unwrap();
        record_dose(&conn, &ctx("user-1"), dose(med_id, "3.5", "2025-01-17 08:00")).unwrap();
        record_dose(&conn, &ctx("user-1"), dose(med_id, "2", "2025-01-18 08:00")).unwrap();

        let all = get_logs(&conn, &ctx("user-1"), &LogFilter::default(), PageRequest::default()).unwrap();
        assert_eq!(all.total_count, 3);
        assert_eq!(all.items[0].taken_at, at("2025-01-18 08:00"));

        let filter = LogFilter {
            variance_only: true,
            variance_threshold: dec("1"),
            ..LogFilter::default()
        };
        let flagged = get_logs(&conn, &ctx("user-1"), &filter, PageRequest::default()).unwrap();
        assert_eq!(flagged.total_count, 1);
        assert_eq!(flagged.items[0].dosage, dec("2"));
    }

    #[test]
    fn threshold_below_tolerance_is_honored() {
        let conn = open_memory_database().unwrap();
        let med_id = seed(&conn, Frequency::Daily, None);
        add_pattern(&conn, med_id, &["4"], "2025-01-15");

        let log = record_dose(&conn, &ctx("user-1"), dose(med_id, "4.01", "2025-01-16 08:00")).unwrap();
        assert_eq!(log.variance_amount, Some(dec("0.01")));

        let filter = LogFilter {
            variance_only: true,
            variance_threshold: dec("0.005"),
            ..LogFilter::default()
        };
        let flagged = get_logs(&conn, &ctx("user-1"), &filter, PageRequest::default()).unwrap();
        assert_eq!(flagged.total_count, 1);
        assert_eq!(flagged.items[0].id, log.id);
    }

    #[test]
    fn logs_page_and_scope() {
        let conn = open_memory_database().unwrap();
        let med_id = seed(&conn, Frequency::Daily, Some("4"));
        for day in 16..=20 {
            record_dose(&conn, &ctx("user-1"), dose(med_id, "4", &format!("2025-01-{day} 08:00"))).unwrap();
        }

        let page = get_logs(&conn, &ctx("user-1"), &LogFilter::default(), PageRequest::new(2, 2)).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items[0].taken_at, at("2025-01-18 08:00"));

        assert!(get_logs(&conn, &ctx("user-2"), &LogFilter::default(), PageRequest::default())
            .unwrap()
            .items
            .is_empty());

        let foreign = LogFilter {
            medication_id: Some(med_id),
            ..LogFilter::default()
        };
        let err = get_logs(&conn, &ctx("user-2"), &foreign, PageRequest::default()).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");

        let err = get_logs(&conn, &ctx("user-1"), &LogFilter::default(), PageRequest::new(0, 10)).unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
    }
}
