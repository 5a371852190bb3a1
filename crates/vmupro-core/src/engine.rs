use crate::catalog::{self, GameCatalog, RefreshOutcome};
use crate::config::AppConfig;
use crate::convert::{self, ConversionReport, Passthrough, SaveTransform, Selection};
use crate::error::Error;
use crate::identify::Matcher;
use crate::model::SaveFile;
use crate::progress::ProgressReporter;
use crate::scanner::{self, ScanOptions};
use crate::storage::Database;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Runs the scan, match and convert phases against one data directory.
pub struct SaveEngine {
    config: AppConfig,
    db_path: String,
    cancel: Arc<AtomicBool>,
}

#[derive(Debug)]
pub struct ScanResult {
    pub saves: Vec<SaveFile>,
    pub scan_duration: Duration,
    pub match_duration: Duration,
    pub matched: usize,
    pub unmatched: usize,
}

impl ScanResult {
    pub fn total(&self) -> usize {
        self.saves.len()
    }
}

impl SaveEngine {
    pub fn new(config: AppConfig) -> Self {
        let db_path = config.store_path().to_string_lossy().into_owned();
        Self {
            config,
            db_path,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_db_path(mut self, path: &str) -> Self {
        self.db_path = path.to_string();
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Setting the token stops a running conversion before its next file.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn open_store(&self) -> Result<Database, Error> {
        if let Some(parent) = Path::new(&self.db_path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Database::open(&self.db_path)?)
    }

    pub fn load_catalog(&self) -> Result<GameCatalog, Error> {
        catalog::load_local(&self.config)
    }

    pub fn refresh_catalog(
        &self,
        reporter: &dyn ProgressReporter,
    ) -> Result<(GameCatalog, RefreshOutcome), Error> {
        fs::create_dir_all(&self.config.data_dir)?;
        catalog::refresh(&self.config, reporter)
    }

    /// List the saves under `source` and identify each one.
    pub fn scan(
        &self,
        source: &Path,
        catalog: &GameCatalog,
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanResult, Error> {
        let db = self.open_store()?;
        let overrides = db.load_overrides()?;
        let detected_overrides = db.load_detected_overrides()?;
        debug!(
            "Loaded {} reconciliation entries and {} detected-id overrides",
            overrides.len(),
            detected_overrides.len()
        );

        info!("Scanning {} for saves...", source.display());
        reporter.on_scan_start();
        let scan_start = Instant::now();
        let options = ScanOptions::new(&self.config.save_extensions, &self.config.ignore_patterns);
        let mut saves = scanner::collect_saves(source, &options, reporter)?;
        let scan_duration = scan_start.elapsed();
        reporter.on_scan_complete(saves.len(), scan_duration.as_secs_f64());

        info!("Identifying {} saves...", saves.len());
        reporter.on_match_start(saves.len());
        let match_start = Instant::now();
        Matcher::new(catalog, &overrides)
            .with_detected_overrides(&detected_overrides)
            .match_all(&mut saves);
        let match_duration = match_start.elapsed();

        let unmatched = saves.iter().filter(|s| s.status.is_unmatched()).count();
        let matched = saves.len() - unmatched;
        reporter.on_match_complete(matched, unmatched, match_duration.as_secs_f64());
        debug!(
            "Scan {:.2}s, match {:.2}s: {} matched, {} unmatched",
            scan_duration.as_secs_f64(),
            match_duration.as_secs_f64(),
            matched,
            unmatched
        );

        Ok(ScanResult {
            saves,
            scan_duration,
            match_duration,
            matched,
            unmatched,
        })
    }

    pub fn convert(
        &self,
        saves: &[SaveFile],
        selection: &Selection,
        output_root: &Path,
        reporter: &dyn ProgressReporter,
    ) -> Result<ConversionReport, Error> {
        self.convert_with(saves, selection, output_root, &Passthrough, reporter)
    }

    pub fn convert_with(
        &self,
        saves: &[SaveFile],
        selection: &Selection,
        output_root: &Path,
        transform: &dyn SaveTransform,
        reporter: &dyn ProgressReporter,
    ) -> Result<ConversionReport, Error> {
        let selected = selection.apply(saves);
        if !selected.is_empty() {
            fs::create_dir_all(output_root.join(convert::PLATFORM_DIR))?;
        }
        Ok(convert::convert_batch(
            &selected,
            output_root,
            transform,
            &self.cancel,
            reporter,
        ))
    }

    pub fn source_dir(&self, override_dir: Option<&str>) -> Result<PathBuf, Error> {
        override_dir
            .map(str::to_string)
            .or_else(|| self.config.source_dir.clone())
            .map(PathBuf::from)
            .ok_or_else(|| Error::Other("no source directory given (use --source or source_dir)".to_string()))
    }

    pub fn output_dir(&self, override_dir: Option<&str>) -> Result<PathBuf, Error> {
        override_dir
            .map(str::to_string)
            .or_else(|| self.config.output_dir.clone())
            .map(PathBuf::from)
            .ok_or_else(|| Error::Other("no output directory given (use --output or output_dir)".to_string()))
    }
}
