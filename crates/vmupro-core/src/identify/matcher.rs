use super::metadata::{self, FolderMetadata};
use super::serial;
use crate::catalog::{GameCatalog, GameRecord};
use crate::model::{DetectionSource, MatchStatus, SaveFile, SaveSignature};
use dashmap::DashMap;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// Title matches below this score are not trusted.
pub const TITLE_MATCH_THRESHOLD: u32 = 500;

const TITLE_STOP_WORDS: &[&str] = &["the", "and", "for"];

/// Identifies saves against the catalog, with manual overrides taking precedence.
///
/// Lookup order: reconciliation entry for the signature, then serials in the
/// folder path, the file name, metadata serials, and finally metadata titles.
/// An automatically detected id with a detected-id override is replaced by
/// the override's game.
pub struct Matcher<'a> {
    catalog: &'a GameCatalog,
    overrides: &'a HashMap<String, String>,
    detected_overrides: Option<&'a HashMap<String, String>>,
    folder_metadata: DashMap<PathBuf, Arc<FolderMetadata>>,
}

impl<'a> Matcher<'a> {
    pub fn new(catalog: &'a GameCatalog, overrides: &'a HashMap<String, String>) -> Self {
        Self {
            catalog,
            overrides,
            detected_overrides: None,
            folder_metadata: DashMap::new(),
        }
    }

    /// Remap detected ids (detected id -> game id) after automatic detection.
    pub fn with_detected_overrides(mut self, detected_overrides: &'a HashMap<String, String>) -> Self {
        self.detected_overrides = Some(detected_overrides);
        self
    }

    pub fn match_save(&self, save: &SaveFile) -> MatchStatus {
        if let Some(status) = self.reconciled(&save.signature) {
            return status;
        }
        match self.detect(save) {
            MatchStatus::Matched(record, source) => match self.remapped(&record.id) {
                Some(status) => status,
                None => MatchStatus::Matched(record, source),
            },
            status => status,
        }
    }

    /// Set the status of every save. Scan order is preserved.
    pub fn match_all(&self, saves: &mut [SaveFile]) {
        saves
            .par_iter_mut()
            .for_each(|save| save.status = self.match_save(save));

        let matched = saves.iter().filter(|s| !s.status.is_unmatched()).count();
        debug!(
            "Matched {} of {} saves ({} folders analyzed for metadata)",
            matched,
            saves.len(),
            self.folder_metadata.len()
        );
    }

    fn reconciled(&self, signature: &SaveSignature) -> Option<MatchStatus> {
        let game_id = self.overrides.get(signature.as_str())?;
        trace!("{} reconciled to {}", signature, game_id);
        Some(MatchStatus::UserResolved(
            self.catalog.record_or_unlisted(game_id),
        ))
    }

    fn remapped(&self, detected_id: &str) -> Option<MatchStatus> {
        let game_id = self.detected_overrides?.get(detected_id)?;
        trace!("Detected id {} remapped to {}", detected_id, game_id);
        Some(MatchStatus::UserResolved(
            self.catalog.record_or_unlisted(game_id),
        ))
    }

    fn detect(&self, save: &SaveFile) -> MatchStatus {
        if let Some(folder) = save.rel_path.parent() {
            if let Some(id) = serial::extract_from_path(self.catalog, folder) {
                return self.matched(&id, DetectionSource::FolderPath);
            }
        }

        if let Some(id) = serial::extract_game_id(self.catalog, &save.file_name) {
            return self.matched(&id, DetectionSource::FileName);
        }

        let metadata = self.metadata_for(save.folder());

        for hint in &metadata.serial_hints {
            if self.catalog.contains(hint) {
                return self.matched(hint, DetectionSource::MetadataSerial);
            }
            if let Some(id) = serial::extract_game_id(self.catalog, hint) {
                return self.matched(&id, DetectionSource::MetadataSerial);
            }
        }

        if let Some((id, score)) = best_title_match(self.catalog, &metadata.title_hints) {
            if score >= TITLE_MATCH_THRESHOLD {
                trace!("{} matched by title to {} (score {})", save.path.display(), id, score);
                return self.matched(&id, DetectionSource::TitleMatch);
            }
        }

        MatchStatus::Unmatched
    }

    fn matched(&self, id: &str, source: DetectionSource) -> MatchStatus {
        let record = self
            .catalog
            .get(id)
            .cloned()
            .unwrap_or_else(|| GameRecord::unlisted(id));
        MatchStatus::Matched(record, source)
    }

    fn metadata_for(&self, folder: &Path) -> Arc<FolderMetadata> {
        if let Some(cached) = self.folder_metadata.get(folder) {
            return Arc::clone(cached.value());
        }
        let analyzed = Arc::new(metadata::analyze_folder(folder));
        self.folder_metadata
            .entry(folder.to_path_buf())
            .or_insert(analyzed)
            .value()
            .clone()
    }
}

/// Score a metadata title hint against a catalog title.
pub fn title_score(hint: &str, title: &str) -> u32 {
    let hint = hint.to_lowercase();
    let title = title.to_lowercase();

    if hint == title {
        1000
    } else if title.contains(&hint) {
        800
    } else if hint.contains(&title) {
        700
    } else {
        let hint_words: HashSet<&str> = hint.split_whitespace().collect();
        let title_words: HashSet<&str> = title.split_whitespace().collect();
        let common = hint_words
            .intersection(&title_words)
            .filter(|w| w.len() > 3 && !TITLE_STOP_WORDS.contains(*w))
            .count();
        common as u32 * 100
    }
}

/// Highest-scoring catalog id over all hints. The first id reaching the best
/// score (hint order, then id order) wins.
pub fn best_title_match(catalog: &GameCatalog, hints: &[String]) -> Option<(String, u32)> {
    let mut best: Option<(&str, u32)> = None;
    for hint in hints {
        for record in catalog.records() {
            let score = title_score(hint, &record.title);
            if score > best.map(|(_, s)| s).unwrap_or(0) {
                best = Some((record.id.as_str(), score));
            }
        }
    }
    best.map(|(id, score)| (id.to_string(), score))
}
