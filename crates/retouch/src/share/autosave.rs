use super::storage::{KeyValueStore, read_json, write_json};
use crate::entities::Entity;
use crate::error::StorageError;
use crate::overlay::OverlaySet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CURRENT_WORK_KEY: &str = "current_work";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoSaveRecord {
    pub code: String,
    #[serde(default)]
    pub participants: Vec<Entity>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_saved: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifications: Option<OverlaySet>,
}

/// The single "work in progress" record.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoSave;

impl AutoSave {
    /// Saves unless `code` is blank. Returns whether anything was written.
    pub fn save(
        &self,
        store: &mut dyn KeyValueStore,
        code: &str,
        participants: &[Entity],
        modifications: &OverlaySet,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        if code.trim().is_empty() {
            return Ok(false);
        }
        let record = AutoSaveRecord {
            code: code.to_string(),
            participants: participants.to_vec(),
            last_saved: now,
            modifications: (!modifications.is_empty()).then(|| modifications.clone()),
        };
        write_json(store, CURRENT_WORK_KEY, &record)?;
        tracing::debug!("work auto-saved");
        Ok(true)
    }

    pub fn restore(&self, store: &dyn KeyValueStore) -> Result<Option<AutoSaveRecord>, StorageError> {
        read_json(store, CURRENT_WORK_KEY)
    }

    pub fn clear(&self, store: &mut dyn KeyValueStore) -> Result<(), StorageError> {
        store.remove(CURRENT_WORK_KEY)
    }
}
