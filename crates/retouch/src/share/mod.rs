//! Sharing snapshots.
//!
//! A snapshot is the source text plus the entity list (and, when present, the recorded edits).
//! It travels either inline in a `data` query parameter as URL-safe base64 JSON, or through a
//! short `id` parameter naming a record in local storage.

mod autosave;
mod links;
mod storage;

pub use autosave::{AutoSave, AutoSaveRecord, CURRENT_WORK_KEY};
pub use links::{LINKS_INDEX_KEY, LinkEntry, ShortId, ShortLinks, StoredShare};
pub use storage::{DirStore, KeyValueStore, MemoryStore, read_json, write_json};

use crate::entities::Entity;
use crate::error::ShareError;
use crate::overlay::OverlaySet;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use url::Url;

pub type Result<T> = std::result::Result<T, ShareError>;

pub const SNAPSHOT_VERSION: &str = "1.0";

fn default_version() -> String {
    SNAPSHOT_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareSnapshot {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub participants: Vec<Entity>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifications: Option<OverlaySet>,
}

impl ShareSnapshot {
    pub fn new(code: impl Into<String>, participants: Vec<Entity>) -> Self {
        Self {
            code: code.into(),
            participants,
            version: default_version(),
            modifications: None,
        }
    }

    /// Attaches recorded edits; an empty set is dropped so plain snapshots stay plain.
    pub fn with_modifications(mut self, set: OverlaySet) -> Self {
        self.modifications = (!set.is_empty()).then_some(set);
        self
    }

    /// Rejects snapshots this version cannot read or that carry no source.
    pub fn validate(&self) -> Result<()> {
        let major = self.version.split('.').next().unwrap_or_default();
        if major != "1" {
            return Err(ShareError::UnsupportedVersion(self.version.clone()));
        }
        if self.code.trim().is_empty() {
            return Err(ShareError::MissingCode);
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

/// URL-safe base64 (no padding) of the snapshot's JSON.
pub fn encode_inline(snapshot: &ShareSnapshot) -> Result<String> {
    Ok(URL_SAFE_NO_PAD.encode(snapshot.to_json()?))
}

/// Inverse of [`encode_inline`]. Padded input and standard-alphabet characters are tolerated.
pub fn decode_inline(data: &str) -> Result<ShareSnapshot> {
    let normalized: String = data
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    let bytes = URL_SAFE_NO_PAD.decode(normalized.as_bytes())?;
    let json = String::from_utf8(bytes)?;
    ShareSnapshot::from_json(&json)
}

/// What a share URL asks to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareRequest {
    ShortId(String),
    Inline(String),
}

pub const ID_PARAM: &str = "id";
pub const DATA_PARAM: &str = "data";

/// Reads the share parameters of `url`. A short `id` wins over inline `data`.
pub fn parse_share_url(url: &Url) -> Option<ShareRequest> {
    let mut id = None;
    let mut data = None;
    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            ID_PARAM if !v.is_empty() => id = Some(v.into_owned()),
            DATA_PARAM if !v.is_empty() => data = Some(v.into_owned()),
            _ => {}
        }
    }
    id.map(ShareRequest::ShortId)
        .or_else(|| data.map(ShareRequest::Inline))
}

/// `base` with its query replaced by the share parameter.
pub fn share_url(base: &Url, request: &ShareRequest) -> Url {
    let mut url = base.clone();
    url.set_fragment(None);
    url.set_query(None);
    {
        let mut pairs = url.query_pairs_mut();
        match request {
            ShareRequest::ShortId(id) => pairs.append_pair(ID_PARAM, id),
            ShareRequest::Inline(data) => pairs.append_pair(DATA_PARAM, data),
        };
    }
    url
}

/// `url` without query or fragment, the address shown after a share has been loaded.
pub fn clean_url(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_query(None);
    url.set_fragment(None);
    url
}
