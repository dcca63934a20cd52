use super::storage::{KeyValueStore, read_json, write_json};
use super::{Result, ShareSnapshot};
use crate::error::ShareError;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const LINKS_INDEX_KEY: &str = "diagram_links";
const RECORD_PREFIX: &str = "diagram_";
const SHORT_ID_LEN: usize = 8;
const UNTITLED: &str = "Untitled Diagram";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShortId(String);

impl ShortId {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(
            (0..SHORT_ID_LEN)
                .map(|_| char::from(rng.sample(Alphanumeric)))
                .collect(),
        )
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.len() == SHORT_ID_LEN && raw.chars().all(|c| c.is_ascii_alphanumeric()) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ShareError::InvalidShortId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn record_key(&self) -> String {
        format!("{RECORD_PREFIX}{}", self.0)
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored share: the snapshot plus bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredShare {
    #[serde(flatten)]
    pub snapshot: ShareSnapshot,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub accessed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    pub id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created: DateTime<Utc>,
    pub title: String,
}

/// First source line, or a placeholder for blank sources.
fn title_of(code: &str) -> String {
    let first = code.split('\n').next().unwrap_or_default().trim();
    if first.is_empty() {
        UNTITLED.to_string()
    } else {
        first.to_string()
    }
}

/// Short-link registry over a [`KeyValueStore`]: one record per link plus an index list.
#[derive(Debug, Clone)]
pub struct ShortLinks {
    retention: Duration,
}

impl Default for ShortLinks {
    fn default() -> Self {
        Self::new(30)
    }
}

impl ShortLinks {
    pub fn new(retention_days: u32) -> Self {
        Self {
            retention: Duration::days(i64::from(retention_days)),
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    fn index(&self, store: &dyn KeyValueStore) -> Result<Vec<LinkEntry>> {
        Ok(read_json(store, LINKS_INDEX_KEY)?.unwrap_or_default())
    }

    pub fn create<R: Rng + ?Sized>(
        &self,
        store: &mut dyn KeyValueStore,
        snapshot: &ShareSnapshot,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<ShortId> {
        snapshot.validate()?;
        let mut index = self.index(store)?;
        let id = loop {
            let candidate = ShortId::generate(rng);
            if !index.iter().any(|e| e.id == candidate.0) {
                break candidate;
            }
        };

        let record = StoredShare {
            snapshot: snapshot.clone(),
            created: now,
            accessed: 0,
        };
        write_json(store, &id.record_key(), &record)?;
        index.push(LinkEntry {
            id: id.0.clone(),
            created: now,
            title: title_of(&snapshot.code),
        });
        write_json(store, LINKS_INDEX_KEY, &index)?;
        tracing::info!(id = %id, "short link created");
        Ok(id)
    }

    /// Loads a stored share and bumps its access counter.
    pub fn load(&self, store: &mut dyn KeyValueStore, id: &ShortId) -> Result<ShareSnapshot> {
        let key = id.record_key();
        let Some(mut record) = read_json::<StoredShare>(store, &key)? else {
            return Err(ShareError::NotFound);
        };
        record.accessed += 1;
        if let Err(err) = write_json(store, &key, &record) {
            tracing::warn!(id = %id, error = %err, "could not update access count");
        }
        Ok(record.snapshot)
    }

    /// Every indexed link, newest first.
    pub fn list(&self, store: &dyn KeyValueStore) -> Result<Vec<LinkEntry>> {
        let mut index = self.index(store)?;
        index.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(index)
    }

    pub fn delete(&self, store: &mut dyn KeyValueStore, id: &ShortId) -> Result<bool> {
        store.remove(&id.record_key())?;
        let mut index = self.index(store)?;
        let before = index.len();
        index.retain(|e| e.id != id.0);
        let removed = index.len() != before;
        write_json(store, LINKS_INDEX_KEY, &index)?;
        Ok(removed)
    }

    /// Drops links created more than the retention window before `now`, records included.
    pub fn purge_expired(&self, store: &mut dyn KeyValueStore, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - self.retention;
        let index = self.index(store)?;
        let (expired, kept): (Vec<LinkEntry>, Vec<LinkEntry>) =
            index.into_iter().partition(|e| e.created < cutoff);
        for entry in &expired {
            store.remove(&format!("{RECORD_PREFIX}{}", entry.id))?;
        }
        write_json(store, LINKS_INDEX_KEY, &kept)?;
        if !expired.is_empty() {
            tracing::info!(purged = expired.len(), "expired short links removed");
        }
        Ok(expired.len())
    }
}
