use rusqlite::{params, Connection, OptionalExtension};

use super::parse_decimal;
use crate::db::DatabaseError;
use crate::models::DoseCap;

/// Insert or replace the cap for a medication class.
pub fn upsert_dose_cap(conn: &Connection, cap: &DoseCap) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO dose_caps (medication_class, max_single_dose, source)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(medication_class) DO UPDATE SET
            max_single_dose = excluded.max_single_dose,
            source = excluded.source",
        params![
            cap.medication_class.trim().to_lowercase(),
            cap.max_single_dose.to_string(),
            cap.source,
        ],
    )?;
    Ok(())
}

/// Look up the cap for a class. Class keys are matched case-insensitively.
pub fn get_dose_cap(conn: &Connection, medication_class: &str) -> Result<Option<DoseCap>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT medication_class, max_single_dose, source
             FROM dose_caps WHERE medication_class = ?1",
            params![medication_class.trim().to_lowercase()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    row.map(|(medication_class, max, source)| {
        Ok(DoseCap {
            medication_class,
            max_single_dose: parse_decimal("dose_caps.max_single_dose", &max)?,
            source,
        })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use rust_decimal::Decimal;

    fn cap(class: &str, max: i64) -> DoseCap {
        DoseCap {
            medication_class: class.into(),
            max_single_dose: Decimal::from(max),
            source: "configured".into(),
        }
    }

    #[test]
    fn lookup_ignores_case() {
        let conn = open_memory_database().unwrap();
        upsert_dose_cap(&conn, &cap("Anticoagulant", 15)).unwrap();

        let found = get_dose_cap(&conn, "ANTICOAGULANT").unwrap().unwrap();
        assert_eq!(found.medication_class, "anticoagulant");
        assert_eq!(found.max_single_dose, Decimal::from(15));
    }

    #[test]
    fn upsert_replaces_existing_cap() {
        let conn = open_memory_database().unwrap();
        upsert_dose_cap(&conn, &cap("anticoagulant", 15)).unwrap();
        upsert_dose_cap(&conn, &cap("anticoagulant", 10)).unwrap();

        let found = get_dose_cap(&conn, "anticoagulant").unwrap().unwrap();
        assert_eq!(found.max_single_dose, Decimal::from(10));
    }

    #[test]
    fn unknown_class_has_no_cap() {
        let conn = open_memory_database().unwrap();
        assert!(get_dose_cap(&conn, "statin").unwrap().is_none());
    }
}
