//! Manual matching of saves the matcher could not identify.
//!
//! Unmatched saves are grouped by signature and handed to a [`Resolver`]
//! one group at a time. Each accepted answer is written to the store before
//! the next group is shown, so an interrupted session keeps its progress.

use crate::catalog::GameCatalog;
use crate::error::Error;
use crate::identify::serial;
use crate::model::{MatchStatus, SaveFile, SaveSignature};
use crate::storage::{Database, UpsertOutcome};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Every unmatched save sharing one signature.
#[derive(Debug, Clone)]
pub struct UnmatchedGroup {
    pub signature: SaveSignature,
    pub folder_path: PathBuf,
    pub files: Vec<String>,
}

impl UnmatchedGroup {
    pub fn folder_name(&self) -> &str {
        self.signature.folder_name()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Accept(String),
    Skip,
    /// Stop reconciling; the remaining groups stay unmatched.
    SkipAll,
}

/// Supplies the user's answer for each unmatched group.
pub trait Resolver {
    fn resolve(&mut self, group: &UnmatchedGroup, catalog: &GameCatalog) -> Result<Resolution, Error>;

    /// Called when an accepted id is not in the catalog. The group is asked again.
    fn rejected(&mut self, _group: &UnmatchedGroup, _game_id: &str) {}
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub groups: usize,
    pub resolved: usize,
    pub skipped: usize,
    pub stopped_early: bool,
}

/// Unmatched saves grouped by signature, ordered by signature.
pub fn unmatched_groups(saves: &[SaveFile]) -> Vec<UnmatchedGroup> {
    let mut groups: BTreeMap<&SaveSignature, UnmatchedGroup> = BTreeMap::new();
    for save in saves.iter().filter(|s| s.status.is_unmatched()) {
        groups
            .entry(&save.signature)
            .or_insert_with(|| UnmatchedGroup {
                signature: save.signature.clone(),
                folder_path: save.folder().to_path_buf(),
                files: Vec::new(),
            })
            .files
            .push(save.file_name.clone());
    }
    groups.into_values().collect()
}

/// Initial search text for a group: the folder name with punctuation turned into spaces.
pub fn suggest_query(signature: &SaveSignature) -> String {
    signature
        .folder_name()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Catalog id for user input, tolerating case and missing hyphens.
pub fn canonical_id(catalog: &GameCatalog, input: &str) -> Option<String> {
    let input = input.trim();
    if catalog.contains(input) {
        return Some(input.to_string());
    }
    serial::resolve_candidate(catalog, input)
}

/// Ask `resolver` about every unmatched group in `saves`, persisting each
/// answer and marking the group's saves as user-resolved.
pub fn run_reconciliation(
    db: &Database,
    catalog: &GameCatalog,
    saves: &mut [SaveFile],
    resolver: &mut dyn Resolver,
) -> Result<ReconcileSummary, Error> {
    let groups = unmatched_groups(saves);
    let mut summary = ReconcileSummary {
        groups: groups.len(),
        ..Default::default()
    };
    info!("Reconciling {} unmatched save folders", groups.len());

    'groups: for group in &groups {
        let game_id = loop {
            match resolver.resolve(group, catalog)? {
                Resolution::Accept(input) => match canonical_id(catalog, &input) {
                    Some(id) => break id,
                    None => {
                        warn!("'{}' is not in the game database", input.trim());
                        resolver.rejected(group, input.trim());
                    }
                },
                Resolution::Skip => {
                    summary.skipped += 1;
                    continue 'groups;
                }
                Resolution::SkipAll => {
                    summary.stopped_early = true;
                    summary.skipped += summary.groups - summary.resolved - summary.skipped;
                    break 'groups;
                }
            }
        };

        db.upsert_entry(group.signature.as_str(), &game_id)?;
        let record = catalog.record_or_unlisted(&game_id);
        for save in saves.iter_mut().filter(|s| s.signature == group.signature) {
            save.status = MatchStatus::UserResolved(record.clone());
        }
        summary.resolved += 1;
        debug!("{} resolved to {}", group.signature, game_id);
    }

    info!(
        "Reconciliation finished: {} resolved, {} skipped",
        summary.resolved, summary.skipped
    );
    Ok(summary)
}

/// Set the game for `signature` directly. An id outside the catalog needs `allow_unlisted`.
pub fn map_signature(
    db: &Database,
    catalog: &GameCatalog,
    signature: &str,
    game_id: &str,
    allow_unlisted: bool,
) -> Result<(String, UpsertOutcome), Error> {
    let signature = signature.trim().trim_matches('/').replace('\\', "/");
    if signature.is_empty() {
        return Err(Error::Other("signature must not be empty".to_string()));
    }
    let game_id = match canonical_id(catalog, game_id) {
        Some(id) => id,
        None if allow_unlisted && !game_id.trim().is_empty() => game_id.trim().to_string(),
        None => return Err(Error::UnknownGame(game_id.trim().to_string())),
    };
    let outcome = db.upsert_entry(&signature, &game_id)?;
    Ok((game_id, outcome))
}

/// Remap every save detected as `detected_id` to `game_id`. An id outside the
/// catalog needs `allow_unlisted`.
pub fn map_detected_id(
    db: &Database,
    catalog: &GameCatalog,
    detected_id: &str,
    game_id: &str,
    allow_unlisted: bool,
) -> Result<(String, UpsertOutcome), Error> {
    let detected_id =
        canonical_id(catalog, detected_id).unwrap_or_else(|| detected_id.trim().to_string());
    if detected_id.is_empty() {
        return Err(Error::Other("detected id must not be empty".to_string()));
    }
    let game_id = match canonical_id(catalog, game_id) {
        Some(id) => id,
        None if allow_unlisted && !game_id.trim().is_empty() => game_id.trim().to_string(),
        None => return Err(Error::UnknownGame(game_id.trim().to_string())),
    };
    let outcome = db.upsert_detected_override(&detected_id, &game_id)?;
    Ok((game_id, outcome))
}
