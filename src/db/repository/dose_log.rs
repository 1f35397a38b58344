use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_decimal, parse_uuid, DATE_FMT};
use crate::db::DatabaseError;
use crate::models::{DoseSource, LogFilter, MedicationLog, PageRequest, PagedList};

const LOG_COLUMNS: &str = "l.id, l.medication_id, l.dosage, l.taken_at, l.expected_dosage,
     l.expected_source, l.pattern_id, l.pattern_day_number, l.has_variance,
     l.variance_amount, l.variance_percentage, l.notes, l.created_at";

/// Comparable magnitude of a decimal amount. Normalized first so `0.10` and
/// `0.1` map to the same float.
fn magnitude(value: Decimal) -> Option<f64> {
    value.abs().normalize().to_f64()
}

/// Persist a dose log exactly as computed. Logs are never updated afterwards.
pub fn insert_dose_log(conn: &Connection, log: &MedicationLog) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medication_logs (id, medication_id, dosage, taken_at, taken_date,
         expected_dosage, expected_source, pattern_id, pattern_day_number, has_variance,
         variance_amount, variance_magnitude, variance_percentage, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            log.id.to_string(),
            log.medication_id.to_string(),
            log.dosage.to_string(),
            format_datetime(&log.taken_at),
            log.taken_at.date().format(DATE_FMT).to_string(),
            log.expected_dosage.map(|d| d.to_string()),
            log.expected_source.as_str(),
            log.pattern_id.map(|id| id.to_string()),
            log.pattern_day_number,
            log.has_variance as i32,
            log.variance_amount.map(|d| d.to_string()),
            log.variance_amount.and_then(magnitude),
            log.variance_percentage.map(|d| d.to_string()),
            log.notes,
            format_datetime(&log.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_dose_log(conn: &Connection, log_id: &Uuid) -> Result<Option<MedicationLog>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {LOG_COLUMNS} FROM medication_logs l WHERE l.id = ?1"),
            params![log_id.to_string()],
            log_row_from_rusqlite,
        )
        .optional()?;
    row.map(log_from_row).transpose()
}

/// One page of the logs of medications owned by `owner_id`, newest first.
///
/// With `variance_only`, keeps logs whose absolute variance is at least
/// `variance_threshold`. Logs without an expected dose never match.
pub fn query_dose_logs(
    conn: &Connection,
    owner_id: &str,
    filter: &LogFilter,
    page: PageRequest,
) -> Result<PagedList<MedicationLog>, DatabaseError> {
    let mut where_clause = String::from("WHERE m.owner_id = ?1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(owner_id.to_string())];
    let mut param_idx = 2;

    if let Some(medication_id) = &filter.medication_id {
        where_clause.push_str(&format!(" AND l.medication_id = ?{param_idx}"));
        params_vec.push(Box::new(medication_id.to_string()));
        param_idx += 1;
    }

    if let Some(from) = &filter.start_date {
        where_clause.push_str(&format!(" AND l.taken_date >= ?{param_idx}"));
        params_vec.push(Box::new(from.format(DATE_FMT).to_string()));
        param_idx += 1;
    }

    if let Some(to) = &filter.end_date {
        where_clause.push_str(&format!(" AND l.taken_date <= ?{param_idx}"));
        params_vec.push(Box::new(to.format(DATE_FMT).to_string()));
        param_idx += 1;
    }

    if filter.variance_only {
        let threshold = magnitude(filter.variance_threshold).unwrap_or(0.0);
        where_clause.push_str(&format!(" AND l.variance_magnitude >= ?{param_idx}"));
        params_vec.push(Box::new(threshold));
        param_idx += 1;
    }

    let from_clause = "FROM medication_logs l INNER JOIN medications m ON l.medication_id = m.id";

    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) {from_clause} {where_clause}"),
        params_refs.as_slice(),
        |row| row.get(0),
    )?;

    params_vec.push(Box::new(i64::from(page.page_size)));
    params_vec.push(Box::new(i64::try_from(page.offset()).unwrap_or(i64::MAX)));
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&format!(
        "SELECT {LOG_COLUMNS} {from_clause} {where_clause}
         ORDER BY l.taken_at DESC, l.created_at DESC
         LIMIT ?{param_idx} OFFSET ?{}",
        param_idx + 1
    ))?;
    let rows = stmt.query_map(params_refs.as_slice(), log_row_from_rusqlite)?;

    let mut logs = Vec::new();
    for row in rows {
        logs.push(log_from_row(row?)?);
    }
    Ok(PagedList::new(logs, page, u64::try_from(total).unwrap_or(0)))
}

// Internal row type for MedicationLog mapping
struct LogRow {
    id: String,
    medication_id: String,
    dosage: String,
    taken_at: String,
    expected_dosage: Option<String>,
    expected_source: String,
    pattern_id: Option<String>,
    pattern_day_number: Option<u32>,
    has_variance: i32,
    variance_amount: Option<String>,
    variance_percentage: Option<String>,
    notes: Option<String>,
    created_at: String,
}

fn log_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<LogRow, rusqlite::Error> {
    Ok(LogRow {
        id: row.get(0)?,
        medication_id: row.get(1)?,
        dosage: row.get(2)?,
        taken_at: row.get(3)?,
        expected_dosage: row.get(4)?,
        expected_source: row.get(5)?,
        pattern_id: row.get(6)?,
        pattern_day_number: row.get(7)?,
        has_variance: row.get(8)?,
        variance_amount: row.get(9)?,
        variance_percentage: row.get(10)?,
        notes: row.get(11)?,
        created_at: row.get(12)?,
    })
}

fn log_from_row(row: LogRow) -> Result<MedicationLog, DatabaseError> {
    Ok(MedicationLog {
        id: parse_uuid("medication_logs.id", &row.id)?,
        medication_id: parse_uuid("medication_logs.medication_id", &row.medication_id)?,
        dosage: parse_decimal("medication_logs.dosage", &row.dosage)?,
        taken_at: parse_datetime("medication_logs.taken_at", &row.taken_at)?,
        expected_dosage: row
            .expected_dosage
            .map(|d| parse_decimal("medication_logs.expected_dosage", &d))
            .transpose()?,
        expected_source: DoseSource::from_str(&row.expected_source)?,
        pattern_id: row
            .pattern_id
            .map(|id| parse_uuid("medication_logs.pattern_id", &id))
            .transpose()?,
        pattern_day_number: row.pattern_day_number,
        has_variance: row.has_variance != 0,
        variance_amount: row
            .variance_amount
            .map(|d| parse_decimal("medication_logs.variance_amount", &d))
            .transpose()?,
        variance_percentage: row
            .variance_percentage
            .map(|d| parse_decimal("medication_logs.variance_percentage", &d))
            .transpose()?,
        notes: row.notes,
        created_at: parse_datetime("medication_logs.created_at", &row.created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::insert_medication;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{Frequency, Medication};
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn seed_medication(conn: &Connection, owner: &str) -> Uuid {
        let anchor = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let med = Medication {
            id: Uuid::new_v4(),
            owner_id: owner.into(),
            name: "Warfarin".into(),
            frequency: Frequency::Daily,
            schedule_anchor: anchor,
            fixed_dose: Some(Decimal::from(4)),
            medication_class: None,
            created_at: anchor.and_hms_opt(0, 0, 0).unwrap(),
        };
        insert_medication(conn, &med).unwrap();
        med.id
    }

    fn make_log(medication_id: Uuid, taken_at: &str, dosage: &str, variance: Option<&str>) -> MedicationLog {
        let variance_amount: Option<Decimal> = variance.map(|v| v.parse().unwrap());
        MedicationLog {
            id: Uuid::new_v4(),
            medication_id,
            dosage: dosage.parse().unwrap(),
            taken_at: at(taken_at),
            expected_dosage: Some(Decimal::from(4)),
            expected_source: DoseSource::FixedDose,
            pattern_id: None,
            pattern_day_number: None,
            has_variance: variance_amount.is_some(),
            variance_amount,
            variance_percentage: None,
            notes: None,
            created_at: at(taken_at),
        }
    }

    #[test]
    fn insert_and_fetch_log() {
        let conn = open_memory_database().unwrap();
        let med_id = seed_medication(&conn, "user-1");
        let mut log = make_log(med_id, "2025-01-20 08:00", "3.0", Some("-1.0"));
        log.variance_percentage = Some(Decimal::from(-25));
        log.pattern_day_number = Some(6);
        insert_dose_log(&conn, &log).unwrap();

        let fetched = get_dose_log(&conn, &log.id).unwrap().unwrap();
        assert_eq!(fetched, log);
    }

    #[test]
    fn query_filters_by_date_range_inclusive() {
        let conn = open_memory_database().unwrap();
        let med_id = seed_medication(&conn, "user-1");
        for day in ["2025-01-10 08:00", "2025-01-15 21:30", "2025-01-20 08:00", "2025-01-25 08:00"] {
            insert_dose_log(&conn, &make_log(med_id, day, "4", None)).unwrap();
        }

        let filter = LogFilter {
            start_date: NaiveDate::from_ymd_opt(2025, 1, 15),
            end_date: NaiveDate::from_ymd_opt(2025, 1, 20),
            ..LogFilter::default()
        };
        let logs = query_dose_logs(&conn, "user-1", &filter, PageRequest::default()).unwrap();
        assert_eq!(logs.total_count, 2);
        // Newest first
        assert_eq!(logs.items[0].taken_at, at("2025-01-20 08:00"));
        assert_eq!(logs.items[1].taken_at, at("2025-01-15 21:30"));
    }

    #[test]
    fn query_variance_only_compares_magnitude_to_threshold() {
        let conn = open_memory_database().unwrap();
        let med_id = seed_medication(&conn, "user-1");
        insert_dose_log(&conn, &make_log(med_id, "2025-01-10 08:00", "4", None)).unwrap();
        insert_dose_log(&conn, &make_log(med_id, "2025-01-11 08:00", "3", Some("-1"))).unwrap();
        insert_dose_log(&conn, &make_log(med_id, "2025-01-12 08:00", "4.01", Some("0.01"))).unwrap();
        insert_dose_log(&conn, &make_log(med_id, "2025-01-13 08:00", "4.5", Some("0.50"))).unwrap();

        let with_threshold = |threshold: &str| LogFilter {
            variance_only: true,
            variance_threshold: threshold.parse().unwrap(),
            ..LogFilter::default()
        };

        let logs = query_dose_logs(&conn, "user-1", &with_threshold("0.005"), PageRequest::default()).unwrap();
        assert_eq!(logs.total_count, 3);

        // Equal to the threshold counts, in either scale
        let logs = query_dose_logs(&conn, "user-1", &with_threshold("0.5"), PageRequest::default()).unwrap();
        assert_eq!(logs.total_count, 2);

        let logs = query_dose_logs(&conn, "user-1", &with_threshold("1.00"), PageRequest::default()).unwrap();
        assert_eq!(logs.total_count, 1);
        assert_eq!(logs.items[0].variance_amount, Some(Decimal::from(-1)));
    }

    #[test]
    fn query_pages_in_sql() {
        let conn = open_memory_database().unwrap();
        let med_id = seed_medication(&conn, "user-1");
        for day in 10..=16 {
            insert_dose_log(&conn, &make_log(med_id, &format!("2025-01-{day} 08:00"), "4", None)).unwrap();
        }

        let page = query_dose_logs(&conn, "user-1", &LogFilter::default(), PageRequest::new(2, 3)).unwrap();
        assert_eq!(page.total_count, 7);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.items[0].taken_at, at("2025-01-13 08:00"));

        let past_end = query_dose_logs(&conn, "user-1", &LogFilter::default(), PageRequest::new(4, 3)).unwrap();
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.total_count, 7);
    }

    #[test]
    fn query_is_owner_scoped() {
        let conn = open_memory_database().unwrap();
        let mine = seed_medication(&conn, "user-1");
        let theirs = seed_medication(&conn, "user-2");
        insert_dose_log(&conn, &make_log(mine, "2025-01-10 08:00", "4", None)).unwrap();
        insert_dose_log(&conn, &make_log(theirs, "2025-01-10 08:00", "4", None)).unwrap();

        let logs = query_dose_logs(&conn, "user-1", &LogFilter::default(), PageRequest::default()).unwrap();
        assert_eq!(logs.items.len(), 1);
        assert_eq!(logs.items[0].medication_id, mine);

        let filter = LogFilter {
            medication_id: Some(theirs),
            ..LogFilter::default()
        };
        assert!(query_dose_logs(&conn, "user-1", &filter, PageRequest::default())
            .unwrap()
            .items
            .is_empty());
    }
}
