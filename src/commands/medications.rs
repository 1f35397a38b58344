//! Medication master data: registration and class dose caps.

use rust_decimal::Decimal;
use rusqlite::Connection;
use uuid::Uuid;

use super::state::EngineContext;
use crate::db::repository::{insert_medication, list_medications, upsert_dose_cap as store_dose_cap};
use crate::dosing::{validate_dose_cap, validate_medication, DosingError};
use crate::models::{DoseCap, Medication, NewMedication};

/// Register a medication for the calling owner.
pub fn register_medication(
    conn: &Connection,
    ctx: &EngineContext,
    input: NewMedication,
) -> Result<Medication, DosingError> {
    validate_medication(&input, &ctx.config)?;

    let medication = Medication {
        id: Uuid::new_v4(),
        owner_id: ctx.owner_id.clone(),
        name: input.name.trim().to_string(),
        frequency: input.frequency,
        schedule_anchor: input.schedule_anchor,
        fixed_dose: input.fixed_dose,
        medication_class: input
            .medication_class
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty()),
        created_at: ctx.now,
    };
    insert_medication(conn, &medication)?;

    tracing::info!(
        medication_id = %medication.id,
        frequency = %medication.frequency,
        "Registered medication"
    );
    Ok(medication)
}

pub fn get_medications(conn: &Connection, ctx: &EngineContext) -> Result<Vec<Medication>, DosingError> {
    Ok(list_medications(conn, &ctx.owner_id)?)
}

/// Set the maximum single dose for a medication class.
pub fn upsert_dose_cap(
    conn: &Connection,
    ctx: &EngineContext,
    medication_class: &str,
    max_single_dose: Decimal,
) -> Result<DoseCap, DosingError> {
    validate_dose_cap(max_single_dose, &ctx.config)?;

    let cap = DoseCap {
        medication_class: medication_class.trim().to_lowercase(),
        max_single_dose,
        source: "configured".into(),
    };
    store_dose_cap(conn, &cap)?;

    tracing::info!(class = %cap.medication_class, max = %cap.max_single_dose, "Dose cap set");
    Ok(cap)
}
