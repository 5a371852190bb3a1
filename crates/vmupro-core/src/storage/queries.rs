use super::models::*;
use super::sqlite::Database;
use crate::error::Error;
use rusqlite::{params, OptionalExtension, Result, Row};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

fn override_from_row(row: &Row<'_>) -> Result<DetectedIdOverride> {
    Ok(DetectedIdOverride {
        detected_id: row.get(0)?,
        game_id: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

fn entry_from_row(row: &Row<'_>) -> Result<ReconciliationEntry> {
    Ok(ReconciliationEntry {
        signature: row.get(0)?,
        game_id: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

impl Database {
    // ── Reconciliation entries ───────────────────────────────────

    /// Insert or replace the choice for `signature`. Last write wins.
    pub fn upsert_entry(&self, signature: &str, game_id: &str) -> Result<UpsertOutcome> {
        let existing = self.get_entry(signature)?;
        let outcome = match &existing {
            Some(entry) if entry.game_id == game_id => return Ok(UpsertOutcome::Unchanged),
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        };

        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "INSERT INTO reconciliation_entry (signature, game_id, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?3) \
             ON CONFLICT(signature) DO UPDATE SET \
               game_id = excluded.game_id, \
               updated_at = excluded.updated_at",
            params![signature, game_id, now],
        )?;
        debug!("{:?} reconciliation {} -> {}", outcome, signature, game_id);
        Ok(outcome)
    }

    pub fn get_entry(&self, signature: &str) -> Result<Option<ReconciliationEntry>> {
        self.connection()
            .query_row(
                "SELECT signature, game_id, created_at, updated_at \
                 FROM reconciliation_entry WHERE signature = ?1",
                params![signature],
                entry_from_row,
            )
            .optional()
    }

    /// All entries ordered by signature.
    pub fn list_entries(&self) -> Result<Vec<ReconciliationEntry>> {
        let mut stmt = self.connection().prepare(
            "SELECT signature, game_id, created_at, updated_at \
             FROM reconciliation_entry ORDER BY signature",
        )?;
        let entries = stmt
            .query_map([], entry_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Returns whether an entry existed.
    pub fn delete_entry(&self, signature: &str) -> Result<bool> {
        let deleted = self.connection().execute(
            "DELETE FROM reconciliation_entry WHERE signature = ?1",
            params![signature],
        )?;
        Ok(deleted > 0)
    }

    pub fn count_entries(&self) -> Result<i64> {
        self.connection()
            .query_row("SELECT COUNT(*) FROM reconciliation_entry", [], |row| row.get(0))
    }

    /// Every entry as signature -> game id, for the matcher.
    pub fn load_overrides(&self) -> Result<HashMap<String, String>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT signature, game_id FROM reconciliation_entry")?;
        let overrides = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<HashMap<String, String>>>()?;
        Ok(overrides)
    }

    // ── Detected-id overrides ────────────────────────────────────

    /// Remap saves detected as `detected_id` to `game_id`. Last write wins.
    pub fn upsert_detected_override(&self, detected_id: &str, game_id: &str) -> Result<UpsertOutcome> {
        let existing = self.get_detected_override(detected_id)?;
        let outcome = match &existing {
            Some(entry) if entry.game_id == game_id => return Ok(UpsertOutcome::Unchanged),
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        };

        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "INSERT INTO detected_id_override (detected_id, game_id, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?3) \
             ON CONFLICT(detected_id) DO UPDATE SET \
               game_id = excluded.game_id, \
               updated_at = excluded.updated_at",
            params![detected_id, game_id, now],
        )?;
        debug!("{:?} detected-id override {} -> {}", outcome, detected_id, game_id);
        Ok(outcome)
    }

    pub fn get_detected_override(&self, detected_id: &str) -> Result<Option<DetectedIdOverride>> {
        self.connection()
            .query_row(
                "SELECT detected_id, game_id, created_at, updated_at \
                 FROM detected_id_override WHERE detected_id = ?1",
                params![detected_id],
                override_from_row,
            )
            .optional()
    }

    /// All overrides ordered by detected id.
    pub fn list_detected_overrides(&self) -> Result<Vec<DetectedIdOverride>> {
        let mut stmt = self.connection().prepare(
            "SELECT detected_id, game_id, created_at, updated_at \
             FROM detected_id_override ORDER BY detected_id",
        )?;
        let overrides = stmt
            .query_map([], override_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(overrides)
    }

    pub fn delete_detected_override(&self, detected_id: &str) -> Result<bool> {
        let deleted = self.connection().execute(
            "DELETE FROM detected_id_override WHERE detected_id = ?1",
            params![detected_id],
        )?;
        Ok(deleted > 0)
    }

    /// Every override as detected id -> game id, for the matcher.
    pub fn load_detected_overrides(&self) -> Result<HashMap<String, String>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT detected_id, game_id FROM detected_id_override")?;
        let overrides = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<HashMap<String, String>>>()?;
        Ok(overrides)
    }

    // ── Legacy import ────────────────────────────────────────────

    /// Import a legacy `manual_mappings.json` object in one transaction.
    ///
    /// `unknown_<folder name>_<absolute folder path>` keys become reconciliation
    /// entries when the folder lies under `source_root`. Keys without a path
    /// separator are detected ids and become overrides. Keys holding a relative
    /// path are taken as signatures.
    pub fn import_legacy_json(
        &self,
        path: &Path,
        source_root: Option<&Path>,
    ) -> std::result::Result<ImportSummary, Error> {
        let content = fs::read_to_string(path)?;
        let mappings: BTreeMap<String, serde_json::Value> = serde_json::from_str(&content)?;

        let tx = self.connection().unchecked_transaction()?;
        let mut summary = ImportSummary::default();
        for (key, value) in &mappings {
            let Some(game_id) = value.as_str().map(str::trim).filter(|id| !id.is_empty()) else {
                warn!("Skipping mapping for '{}': game id is not a string", key);
                summary.unresolved.push(key.clone());
                continue;
            };
            let outcome = match classify_legacy_key(key, source_root) {
                LegacyKey::Signature(signature) => {
                    let outcome = self.upsert_entry(&signature, game_id)?;
                    if outcome != UpsertOutcome::Unchanged {
                        summary.signatures += 1;
                    }
                    outcome
                }
                LegacyKey::DetectedId(detected_id) => {
                    let outcome = self.upsert_detected_override(&detected_id, game_id)?;
                    if outcome != UpsertOutcome::Unchanged {
                        summary.detected_ids += 1;
                    }
                    outcome
                }
                LegacyKey::Unresolved => {
                    warn!("Skipping mapping for '{}': no folder under the source directory matches", key);
                    summary.unresolved.push(key.clone());
                    continue;
                }
            };
            if outcome == UpsertOutcome::Unchanged {
                summary.unchanged += 1;
            }
        }
        tx.commit()?;

        info!(
            "Imported {} signatures and {} detected-id overrides from {} ({} unchanged, {} skipped)",
            summary.signatures,
            summary.detected_ids,
            path.display(),
            summary.unchanged,
            summary.unresolved.len()
        );
        Ok(summary)
    }
}

const LEGACY_UNKNOWN_PREFIX: &str = "unknown_";

#[derive(Debug, PartialEq, Eq)]
enum LegacyKey {
    Signature(String),
    DetectedId(String),
    Unresolved,
}

fn classify_legacy_key(key: &str, source_root: Option<&Path>) -> LegacyKey {
    let key = key.trim();
    if key.starts_with(LEGACY_UNKNOWN_PREFIX) {
        return source_root
            .and_then(|root| signature_from_legacy_key(key, root))
            .map_or(LegacyKey::Unresolved, LegacyKey::Signature);
    }
    if key.contains('/') || key.contains('\\') {
        let signature = key.replace('\\', "/").trim_matches('/').to_string();
        if signature.is_empty() {
            return LegacyKey::Unresolved;
        }
        return LegacyKey::Signature(signature);
    }
    if key.is_empty() {
        return LegacyKey::Unresolved;
    }
    LegacyKey::DetectedId(key.to_string())
}

/// Signature for an `unknown_<folder name>_<absolute folder path>` key, when
/// the folder lies strictly below `source_root`.
pub fn signature_from_legacy_key(key: &str, source_root: &Path) -> Option<String> {
    let rest = key.strip_prefix(LEGACY_UNKNOWN_PREFIX)?;
    let root = normalize_slashes(&source_root.to_string_lossy());

    // Folder names may contain `_`, so every split point is tried.
    for (split, _) in rest.match_indices('_') {
        let name = &rest[..split];
        let folder = normalize_slashes(&rest[split + 1..]);
        if folder.rsplit('/').next() != Some(name) {
            continue;
        }
        let relative = folder
            .strip_prefix(root.as_str())
            .and_then(|r| r.strip_prefix('/'));
        if let Some(relative) = relative.filter(|r| !r.is_empty()) {
            return Some(relative.to_string());
        }
    }
    None
}

fn normalize_slashes(path: &str) -> String {
    path.replace('\\', "/").trim_end_matches('/').to_string()
}
