//! Pattern lifecycle: create (with optional close of the active pattern),
//! active lookup, paged history.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use uuid::Uuid;

use super::state::EngineContext;
use crate::db::repository::{
    close_pattern, get_active_pattern as fetch_active_pattern, get_dose_cap,
    get_pattern_history as fetch_pattern_history, get_patterns_for_medication, insert_pattern,
};
use crate::db::DatabaseError;
use crate::dosing::{plan_insertion, validate_page, validate_pattern, DosingError};
use crate::models::{
    DosagePattern, NewPattern, PageRequest, PagedList, PatternCreated, PatternHistoryFilter,
};

fn conflict_on_constraint(err: DatabaseError) -> DosingError {
    if err.is_constraint_violation() {
        DosingError::Conflict(format!("pattern write rejected by store: {err}"))
    } else {
        DosingError::Database(err)
    }
}

/// Create a pattern, closing the active one first when asked to.
///
/// Runs in a single `BEGIN IMMEDIATE` transaction: the snapshot read, the
/// overlap decision, the close and the insert either all land or none do.
pub fn create_pattern(
    conn: &Connection,
    ctx: &EngineContext,
    input: NewPattern,
) -> Result<PatternCreated, DosingError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let medication = ctx.owned_medication(&tx, &input.medication_id)?;
    let cap = match medication.medication_class.as_deref() {
        Some(class) => get_dose_cap(&tx, class)?,
        None => None,
    };

    let warnings = validate_pattern(&input, cap.as_ref(), &ctx.config, ctx.today()).map_err(|e| {
        tracing::warn!(medication_id = %medication.id, error = %e, "Pattern rejected");
        e
    })?;

    let existing = get_patterns_for_medication(&tx, &medication.id)?;
    let plan = plan_insertion(&existing, input.start_date, input.end_date, input.close_previous)
        .map_err(|e| {
            tracing::warn!(medication_id = %medication.id, error = %e, "Pattern conflicts with history");
            e
        })?;

    let mut closed_previous = None;
    if let Some((closing_id, end_date)) = plan.close {
        close_pattern(&tx, &closing_id, end_date).map_err(conflict_on_constraint)?;
        closed_previous = existing
            .iter()
            .find(|p| p.id == closing_id)
            .map(|p| DosagePattern {
                end_date: Some(end_date),
                ..p.clone()
            });
        tracing::info!(pattern_id = %closing_id, %end_date, "Closed active pattern");
    }

    let pattern = DosagePattern {
        id: Uuid::new_v4(),
        medication_id: medication.id,
        sequence: input.sequence,
        start_date: input.start_date,
        end_date: input.end_date,
        notes: input.notes,
        created_at: ctx.now,
    };
    insert_pattern(&tx, &pattern).map_err(conflict_on_constraint)?;
    tx.commit()?;

    tracing::info!(
        pattern_id = %pattern.id,
        medication_id = %pattern.medication_id,
        start_date = %pattern.start_date,
        cycle_length = pattern.cycle_length(),
        warnings = warnings.len(),
        "Created dosage pattern"
    );

    Ok(PatternCreated {
        pattern,
        closed_previous,
        warnings,
    })
}

pub fn get_active_pattern(
    conn: &Connection,
    ctx: &EngineContext,
    medication_id: &Uuid,
) -> Result<DosagePattern, DosingError> {
    let medication = ctx.owned_medication(conn, medication_id)?;
    fetch_active_pattern(conn, &medication.id)?
        .ok_or_else(|| DosingError::not_found("ActiveDosagePattern", medication.id))
}

/// One page of patterns, newest window first.
pub fn get_pattern_history(
    conn: &Connection,
    ctx: &EngineContext,
    medication_id: &Uuid,
    filter: &PatternHistoryFilter,
    page: PageRequest,
) -> Result<PagedList<DosagePattern>, DosingError> {
    validate_page(page, &ctx.config)?;
    let medication = ctx.owned_medication(conn, medication_id)?;
    Ok(fetch_pattern_history(conn, &medication.id, filter, page)?)
}
