use super::{cache, csv_source, fetch, pipe, GameCatalog};
use crate::config::{AppConfig, CATALOG_JSON_FILE, CATALOG_LEGACY_FILE, CATALOG_PIPE_FILE};
use crate::error::Error;
use crate::progress::ProgressReporter;
use std::fs;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const DOWNLOAD_SOURCE: &str = "K3zter/vmu-save-splitter";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A fresh copy was downloaded and written to the cache.
    Downloaded { games: usize },
    /// The download failed; the previously cached database is in use.
    KeptCache { reason: String },
}

/// Load the local database: pipe-delimited file, then JSON cache, then the legacy JSON.
pub fn load_local(config: &AppConfig) -> Result<GameCatalog, Error> {
    let pipe_path = config.data_path(CATALOG_PIPE_FILE);
    if pipe_path.exists() {
        match fs::read_to_string(&pipe_path) {
            Ok(content) => {
                let catalog =
                    pipe::parse_catalog(&content, &pipe_path.display().to_string());
                info!(
                    "Loaded {} games from {} ({} GID links)",
                    catalog.len(),
                    pipe_path.display(),
                    catalog.gid_alias_count()
                );
                return Ok(catalog);
            }
            Err(e) => error!("Error loading {}: {}", pipe_path.display(), e),
        }
    }

    for file_name in [CATALOG_JSON_FILE, CATALOG_LEGACY_FILE] {
        let path = config.data_path(file_name);
        if !path.exists() {
            continue;
        }
        match cache::read_cache(&path) {
            Ok(catalog) => {
                info!("Loaded {} games from {}", catalog.len(), path.display());
                return Ok(catalog);
            }
            Err(e) => error!("Error loading database {}: {}", path.display(), e),
        }
    }

    Err(Error::DatabaseUnavailable(format!(
        "no game database found in '{}'; run `vmupro download` first",
        config.data_dir
    )))
}

/// Download a fresh database, replacing the cache. Falls back to the cache on failure.
pub fn refresh(
    config: &AppConfig,
    reporter: &dyn ProgressReporter,
) -> Result<(GameCatalog, RefreshOutcome), Error> {
    let timeout = Duration::from_secs(config.download_timeout_secs);
    refresh_with(config, reporter, || {
        fetch::download_csv(&config.database_url, timeout)
    })
}

/// `refresh` with the transport supplied by the caller.
pub fn refresh_with<F>(
    config: &AppConfig,
    reporter: &dyn ProgressReporter,
    fetch_csv: F,
) -> Result<(GameCatalog, RefreshOutcome), Error>
where
    F: FnOnce() -> Result<String, Error>,
{
    reporter.on_download_start(&config.database_url);
    let start = Instant::now();

    match fetch_csv().and_then(|text| install(config, &text)) {
        Ok(catalog) => {
            let games = catalog.len();
            reporter.on_download_complete(games, start.elapsed().as_secs_f64());
            info!("Game database refreshed: {} unique games", games);
            Ok((catalog, RefreshOutcome::Downloaded { games }))
        }
        Err(e) => {
            warn!("Database refresh failed: {}", e);
            let reason = e.to_string();
            match load_local(config) {
                Ok(catalog) => Ok((catalog, RefreshOutcome::KeptCache { reason })),
                Err(_) => Err(Error::DatabaseUnavailable(format!(
                    "download failed ({}) and no cached database exists",
                    reason
                ))),
            }
        }
    }
}

fn install(config: &AppConfig, text: &str) -> Result<GameCatalog, Error> {
    let records = csv_source::parse_csv(text)?;
    if records.is_empty() {
        return Err(Error::DatabaseUnavailable(
            "downloaded database contains no games".to_string(),
        ));
    }
    let catalog = GameCatalog::from_records(records, DOWNLOAD_SOURCE);
    let path = config.data_path(CATALOG_JSON_FILE);
    cache::write_cache(&catalog, &path)?;
    debug!("Cached database at {}", path.display());
    Ok(catalog)
}
