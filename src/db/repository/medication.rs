use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{format_datetime, parse_date, parse_datetime, parse_decimal, parse_uuid, DATE_FMT};
use crate::db::DatabaseError;
use crate::models::{Frequency, Medication};

const MEDICATION_COLUMNS: &str = "id, owner_id, name, frequency, schedule_anchor, fixed_dose,
     medication_class, created_at";

pub fn insert_medication(conn: &Connection, med: &Medication) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medications (id, owner_id, name, frequency, schedule_anchor, fixed_dose,
         medication_class, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            med.id.to_string(),
            med.owner_id,
            med.name,
            med.frequency.to_string(),
            med.schedule_anchor.format(DATE_FMT).to_string(),
            med.fixed_dose.map(|d| d.to_string()),
            med.medication_class,
            format_datetime(&med.created_at),
        ],
    )?;
    Ok(())
}

/// Fetch a medication only if it belongs to `owner_id`.
pub fn get_owned_medication(
    conn: &Connection,
    id: &Uuid,
    owner_id: &str,
) -> Result<Option<Medication>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {MEDICATION_COLUMNS} FROM medications WHERE id = ?1 AND owner_id = ?2"),
            params![id.to_string(), owner_id],
            medication_row_from_rusqlite,
        )
        .optional()?;
    row.map(medication_from_row).transpose()
}

pub fn list_medications(conn: &Connection, owner_id: &str) -> Result<Vec<Medication>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MEDICATION_COLUMNS} FROM medications WHERE owner_id = ?1 ORDER BY name ASC"
    ))?;

    let rows = stmt.query_map(params![owner_id], medication_row_from_rusqlite)?;

    let mut meds = Vec::new();
    for row in rows {
        meds.push(medication_from_row(row?)?);
    }
    Ok(meds)
}

// Internal row type for Medication mapping
struct MedicationRow {
    id: String,
    owner_id: String,
    name: String,
    frequency: String,
    schedule_anchor: String,
    fixed_dose: Option<String>,
    medication_class: Option<String>,
    created_at: String,
}

fn medication_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<MedicationRow, rusqlite::Error> {
    Ok(MedicationRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        frequency: row.get(3)?,
        schedule_anchor: row.get(4)?,
        fixed_dose: row.get(5)?,
        medication_class: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn medication_from_row(row: MedicationRow) -> Result<Medication, DatabaseError> {
    Ok(Medication {
        id: parse_uuid("medications.id", &row.id)?,
        owner_id: row.owner_id,
        name: row.name,
        frequency: Frequency::from_str(&row.frequency)?,
        schedule_anchor: parse_date("medications.schedule_anchor", &row.schedule_anchor)?,
        fixed_dose: row
            .fixed_dose
            .map(|d| parse_decimal("medications.fixed_dose", &d))
            .transpose()?,
        medication_class: row.medication_class,
        created_at: parse_datetime("medications.created_at", &row.created_at)?,
    })
}
