use chrono::{Local, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::db::repository::get_owned_medication;
use crate::dosing::DosingError;
use crate::models::Medication;

/// Per-call scope: who is asking, what time it is, and the engine bounds.
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub owner_id: String,
    /// Local wall-clock reading used for "today" and backdating checks.
    pub now: NaiveDateTime,
    pub config: EngineConfig,
}

impl EngineContext {
    pub fn new(owner_id: impl Into<String>, now: NaiveDateTime, config: EngineConfig) -> Self {
        Self {
            owner_id: owner_id.into(),
            now,
            config,
        }
    }

    /// Context stamped with the current local time.
    pub fn for_owner(owner_id: impl Into<String>, config: EngineConfig) -> Self {
        Self::new(owner_id, Local::now().naive_local(), config)
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date()
    }

    /// Load a medication owned by this caller. Other owners' records are `NotFound`.
    pub(crate) fn owned_medication(
        &self,
        conn: &Connection,
        medication_id: &Uuid,
    ) -> Result<Medication, DosingError> {
        get_owned_medication(conn, medication_id, &self.owner_id)?
            .ok_or_else(|| DosingError::not_found("Medication", medication_id))
    }
}
