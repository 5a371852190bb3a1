//! The game database: canonical Dreamcast game records keyed by serial.
//!
//! A catalog is loaded wholesale from a local file and replaced wholesale on
//! each refresh. Records are never edited in place.

pub mod cache;
pub mod csv_source;
pub mod fetch;
pub mod loader;
pub mod pipe;
pub mod search;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub use loader::{load_local, refresh, RefreshOutcome};
pub use search::SearchHit;

/// One canonical game entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    #[serde(rename = "gameid")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub languages: Option<String>,
    /// Database-internal `GID###` alias for the same game, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<String>,
}

impl GameRecord {
    pub fn new(id: &str, title: &str, region: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            region: region.to_string(),
            version: None,
            languages: None,
            gid: None,
        }
    }

    /// Stand-in for a user-chosen id that is not (or no longer) in the catalog.
    pub fn unlisted(id: &str) -> Self {
        Self::new(id, id, "?")
    }
}

/// Upper-case alphanumerics only: `t-1201n` and `T1201N` compare equal.
pub fn normalize_id(id: &str) -> String {
    id.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// `id` without `-` and `_`.
pub fn strip_separators(id: &str) -> String {
    id.chars().filter(|c| *c != '-' && *c != '_').collect()
}

#[derive(Debug, Clone, Default)]
pub struct GameCatalog {
    records: BTreeMap<String, GameRecord>,
    gid_aliases: HashMap<String, String>,
    /// id with `-` and `_` removed -> smallest id with that form
    stripped_index: HashMap<String, String>,
    source: String,
    last_updated: Option<String>,
}

impl GameCatalog {
    /// Build a catalog from records in file order. The first record for an id wins.
    pub fn from_records(records: Vec<GameRecord>, source: &str) -> Self {
        let mut catalog = GameCatalog {
            source: source.to_string(),
            ..Default::default()
        };
        for record in records {
            if let Some(gid) = &record.gid {
                catalog
                    .gid_aliases
                    .entry(gid.clone())
                    .or_insert_with(|| record.id.clone());
            }
            catalog.records.entry(record.id.clone()).or_insert(record);
        }
        for id in catalog.records.keys() {
            catalog
                .stripped_index
                .entry(strip_separators(id))
                .or_insert_with(|| id.clone());
        }
        catalog
    }

    /// Replace the GID aliases taken from the records with explicit links.
    pub fn with_gid_aliases(mut self, links: BTreeMap<String, String>) -> Self {
        self.gid_aliases = links.into_iter().collect();
        self
    }

    pub fn with_last_updated(mut self, last_updated: Option<String>) -> Self {
        self.last_updated = last_updated;
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&GameRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Records in id order.
    pub fn records(&self) -> impl Iterator<Item = &GameRecord> {
        self.records.values()
    }

    /// Traditional serial for a `GID###` alias.
    pub fn resolve_gid(&self, gid: &str) -> Option<&str> {
        self.gid_aliases.get(gid).map(|s| s.as_str())
    }

    /// Id that equals `stripped` once separators are removed from both.
    pub fn find_stripped(&self, stripped: &str) -> Option<&str> {
        self.stripped_index.get(stripped).map(|s| s.as_str())
    }

    pub fn gid_alias_count(&self) -> usize {
        self.gid_aliases.len()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn last_updated(&self) -> Option<&str> {
        self.last_updated.as_deref()
    }

    /// Record for `id`, or an unlisted stand-in when the catalog has no such id.
    pub fn record_or_unlisted(&self, id: &str) -> GameRecord {
        self.get(id)
            .cloned()
            .unwrap_or_else(|| GameRecord::unlisted(id))
    }

    /// Replace every record with the contents of `other`.
    pub fn replace_all(&mut self, other: GameCatalog) {
        *self = other;
    }
}
