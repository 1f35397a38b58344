use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{format_datetime, parse_date, parse_datetime, parse_decimal, parse_uuid, DATE_FMT};
use crate::db::DatabaseError;
use crate::models::{DosagePattern, PageRequest, PagedList, PatternHistoryFilter};

const PATTERN_COLUMNS: &str = "id, medication_id, sequence, start_date, end_date, notes, created_at";

pub fn insert_pattern(conn: &Connection, pattern: &DosagePattern) -> Result<(), DatabaseError> {
    let sequence: Vec<String> = pattern.sequence.iter().map(Decimal::to_string).collect();
    conn.execute(
        "INSERT INTO dosage_patterns (id, medication_id, sequence, start_date, end_date, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            pattern.id.to_string(),
            pattern.medication_id.to_string(),
            serde_json::to_string(&sequence)?,
            pattern.start_date.format(DATE_FMT).to_string(),
            pattern.end_date.map(|d| d.format(DATE_FMT).to_string()),
            pattern.notes,
            format_datetime(&pattern.created_at),
        ],
    )?;
    Ok(())
}

/// Set the end date of an open-ended pattern. Closed patterns are never reopened or moved.
pub fn close_pattern(
    conn: &Connection,
    pattern_id: &Uuid,
    end_date: chrono::NaiveDate,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE dosage_patterns SET end_date = ?1 WHERE id = ?2 AND end_date IS NULL",
        params![end_date.format(DATE_FMT).to_string(), pattern_id.to_string()],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "ActiveDosagePattern".into(),
            id: pattern_id.to_string(),
        });
    }
    Ok(())
}

pub fn get_pattern(conn: &Connection, pattern_id: &Uuid) -> Result<Option<DosagePattern>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PATTERN_COLUMNS} FROM dosage_patterns WHERE id = ?1"),
            params![pattern_id.to_string()],
            pattern_row_from_rusqlite,
        )
        .optional()?;
    row.map(pattern_from_row).transpose()
}

/// All patterns of a medication, oldest window first.
pub fn get_patterns_for_medication(
    conn: &Connection,
    medication_id: &Uuid,
) -> Result<Vec<DosagePattern>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATTERN_COLUMNS} FROM dosage_patterns
         WHERE medication_id = ?1
         ORDER BY start_date ASC, created_at ASC"
    ))?;
    let rows = stmt.query_map(params![medication_id.to_string()], pattern_row_from_rusqlite)?;

    let mut patterns = Vec::new();
    for row in rows {
        patterns.push(pattern_from_row(row?)?);
    }
    Ok(patterns)
}

/// The open-ended pattern of a medication, if any.
pub fn get_active_pattern(
    conn: &Connection,
    medication_id: &Uuid,
) -> Result<Option<DosagePattern>, DatabaseError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {PATTERN_COLUMNS} FROM dosage_patterns
                 WHERE medication_id = ?1 AND end_date IS NULL"
            ),
            params![medication_id.to_string()],
            pattern_row_from_rusqlite,
        )
        .optional()?;
    row.map(pattern_from_row).transpose()
}

/// One page of a medication's pattern history, newest window first.
pub fn get_pattern_history(
    conn: &Connection,
    medication_id: &Uuid,
    filter: &PatternHistoryFilter,
    page: PageRequest,
) -> Result<PagedList<DosagePattern>, DatabaseError> {
    let active_clause = if filter.active_only {
        " AND end_date IS NULL"
    } else {
        ""
    };

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM dosage_patterns WHERE medication_id = ?1{active_clause}"),
        params![medication_id.to_string()],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {PATTERN_COLUMNS} FROM dosage_patterns
         WHERE medication_id = ?1{active_clause}
         ORDER BY start_date DESC, created_at DESC
         LIMIT ?2 OFFSET ?3"
    ))?;
    let rows = stmt.query_map(
        params![
            medication_id.to_string(),
            i64::from(page.page_size),
            i64::try_from(page.offset()).unwrap_or(i64::MAX),
        ],
        pattern_row_from_rusqlite,
    )?;

    let mut items = Vec::new();
    for row in rows {
        items.push(pattern_from_row(row?)?);
    }
    Ok(PagedList::new(items, page, u64::try_from(total).unwrap_or(0)))
}

// Internal row type for DosagePattern mapping
struct PatternRow {
    id: String,
    medication_id: String,
    sequence: String,
    start_date: String,
    end_date: Option<String>,
    notes: Option<String>,
    created_at: String,
}

fn pattern_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<PatternRow, rusqlite::Error> {
    Ok(PatternRow {
        id: row.get(0)?,
        medication_id: row.get(1)?,
        sequence: row.get(2)?,
        start_date: row.get(3)?,
        end_date: row.get(4)?,
        notes: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn pattern_from_row(row: PatternRow) -> Result<DosagePattern, DatabaseError> {
    let raw: Vec<String> = serde_json::from_str(&row.sequence)?;
    let sequence = raw
        .iter()
        .map(|v| parse_decimal("dosage_patterns.sequence", v))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DosagePattern {
        id: parse_uuid("dosage_patterns.id", &row.id)?,
        medication_id: parse_uuid("dosage_patterns.medication_id", &row.medication_id)?,
        sequence,
        start_date: parse_date("dosage_patterns.start_date", &row.start_date)?,
        end_date: row
            .end_date
            .map(|d| parse_date("dosage_patterns.end_date", &d))
            .transpose()?,
        notes: row.notes,
        created_at: parse_datetime("dosage_patterns.created_at", &row.created_at)?,
    })
}
