use super::{GameCatalog, GameRecord};
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

pub const CACHE_FORMAT_VERSION: u32 = 3;

/// On-disk JSON form of the downloaded database.
#[derive(Debug, Serialize, Deserialize)]
pub struct CachedDatabase {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub total_games: usize,
    pub games: BTreeMap<String, GameRecord>,
    #[serde(default)]
    pub source: String,
}

pub fn write_cache(catalog: &GameCatalog, path: &Path) -> Result<(), Error> {
    let games: BTreeMap<String, GameRecord> = catalog
        .records()
        .map(|r| (r.id.clone(), r.clone()))
        .collect();
    let cached = CachedDatabase {
        version: CACHE_FORMAT_VERSION,
        last_updated: Some(chrono::Local::now().to_rfc3339()),
        total_games: games.len(),
        games,
        source: catalog.source().to_string(),
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    // A failed write leaves the previous cache in place.
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, serde_json::to_string_pretty(&cached)?)?;
    fs::rename(&tmp_path, path)?;
    debug!("Wrote {} games to {}", cached.total_games, path.display());
    Ok(())
}

pub fn read_cache(path: &Path) -> Result<GameCatalog, Error> {
    let data = fs::read_to_string(path)?;
    let cached: CachedDatabase = serde_json::from_str(&data)?;
    let source = if cached.source.is_empty() {
        path.display().to_string()
    } else {
        cached.source
    };
    // Keys take precedence over the embedded ids for older files.
    let records = cached
        .games
        .into_iter()
        .map(|(key, mut record)| {
            record.id = key;
            record
        })
        .collect();
    Ok(GameCatalog::from_records(records, &source).with_last_updated(cached.last_updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_cache_preserves_records_and_aliases() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vmupro_gamedb.json");

        let mut aliased = GameRecord::new("HDR-0178", "VMU Games", "JPN");
        aliased.gid = Some("GID028".to_string());
        let catalog = GameCatalog::from_records(
            vec![GameRecord::new("T-1201N", "Power Stone", "USA"), aliased],
            "K3zter/vmu-save-splitter",
        );
        write_cache(&catalog, &path).unwrap();

        let loaded = read_cache(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.source(), "K3zter/vmu-save-splitter");
        assert_eq!(loaded.resolve_gid("GID028"), Some("HDR-0178"));
        assert!(loaded.last_updated().is_some());
        assert!(!dir.path().join("vmupro_gamedb.json.tmp").exists());
    }

    #[test]
    fn test_read_legacy_file_without_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("redump_dreamcast.json");
        fs::write(
            &path,
            r#"{"games": {"MK-51000": {"gameid": "MK-51000", "title": "Sonic Adventure"}}}"#,
        )
        .unwrap();

        let loaded = read_cache(&path).unwrap();
        let record = loaded.get("MK-51000").unwrap();
        assert_eq!(record.title, "Sonic Adventure");
        assert_eq!(record.region, "");
        assert!(loaded.last_updated().is_none());
    }
}
