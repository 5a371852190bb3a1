use std::borrow::Cow;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

use vmupro_core::reconcile::{self, Resolution, Resolver, UnmatchedGroup};
use vmupro_core::{
    AppConfig, Confidence, Error, GameCatalog, MatchStatus, SaveEngine, SaveFile, SaveTransform,
    Selection, SilentReporter,
};

/// Game database with records A (`T-1201N`) and B (`MK-51000`).
fn write_database(data_dir: &Path) {
    fs::write(
        data_dir.join("vmupro_gamedb.txt"),
        "# region|title|id\n|USA|Power Stone|T-1201N|\n|USA|Sonic Adventure|MK-51000|\n",
    )
    .unwrap();
}

/// Layout:
///   root/
///     card1/
///       MYSTERY/
///         save.vmu        (no serial anywhere)
///       T1201N/
///         1.vmu           (identified by folder)
///         2.VMU
///       readme.txt        (ignored, not a save)
fn create_source_tree(root: &Path) {
    let mystery = root.join("card1/MYSTERY");
    let known = root.join("card1/T1201N");
    fs::create_dir_all(&mystery).unwrap();
    fs::create_dir_all(&known).unwrap();
    fs::write(mystery.join("save.vmu"), vec![0x11u8; 512]).unwrap();
    fs::write(known.join("1.vmu"), vec![0x22u8; 512]).unwrap();
    fs::write(known.join("2.VMU"), vec![0x33u8; 512]).unwrap();
    fs::write(root.join("card1/readme.txt"), "backup of my VM2").unwrap();
}

fn engine_in(data_dir: &Path) -> SaveEngine {
    let config = AppConfig {
        data_dir: data_dir.to_string_lossy().into_owned(),
        ..Default::default()
    };
    SaveEngine::new(config)
}

struct AlwaysAccept {
    game_id: String,
    asked: usize,
}

impl Resolver for AlwaysAccept {
    fn resolve(&mut self, _: &UnmatchedGroup, _: &GameCatalog) -> Result<Resolution, Error> {
        self.asked += 1;
        Ok(Resolution::Accept(self.game_id.clone()))
    }
}

struct FailFirstBytes(u8);

impl SaveTransform for FailFirstBytes {
    fn name(&self) -> &str {
        "fail-first-bytes"
    }

    fn transform<'a>(&self, _save: &SaveFile, input: &'a [u8]) -> Result<Cow<'a, [u8]>, Error> {
        if input.first() == Some(&self.0) {
            Err(Error::Other("unsupported save".to_string()))
        } else {
            Ok(Cow::Borrowed(input))
        }
    }
}

#[test]
fn test_resolution_survives_restart() {
    let data = tempdir().unwrap();
    let source = tempdir().unwrap();
    write_database(data.path());
    create_source_tree(source.path());

    let engine = engine_in(data.path());
    let catalog = engine.load_catalog().unwrap();
    let mut result = engine.scan(source.path(), &catalog, &SilentReporter).unwrap();
    assert_eq!(result.total(), 3);
    assert_eq!(result.unmatched, 1);
    let mystery = result
        .saves
        .iter()
        .find(|s| s.signature.as_str() == "card1/MYSTERY")
        .unwrap();
    assert_eq!(mystery.status, MatchStatus::Unmatched);

    let db = engine.open_store().unwrap();
    let mut resolver = AlwaysAccept {
        game_id: "MK-51000".to_string(),
        asked: 0,
    };
    let summary =
        reconcile::run_reconciliation(&db, &catalog, &mut result.saves, &mut resolver).unwrap();
    assert_eq!(summary.resolved, 1);
    drop(db);
    drop(engine);

    // Fresh engine over the same data directory.
    let engine = engine_in(data.path());
    let catalog = engine.load_catalog().unwrap();
    let result = engine.scan(source.path(), &catalog, &SilentReporter).unwrap();
    assert_eq!(result.unmatched, 0);
    let mystery = result
        .saves
        .iter()
        .find(|s| s.signature.as_str() == "card1/MYSTERY")
        .unwrap();
    assert_eq!(mystery.game_id(), Some("MK-51000"));
    assert_eq!(mystery.status.confidence(), Some(Confidence::Manual));
    assert!(reconcile::unmatched_groups(&result.saves).is_empty());
    assert_eq!(resolver.asked, 1);
}

#[test]
fn test_manual_entry_overrides_detection() {
    let data = tempdir().unwrap();
    let source = tempdir().unwrap();
    write_database(data.path());
    create_source_tree(source.path());

    let engine = engine_in(data.path());
    engine
        .open_store()
        .unwrap()
        .upsert_entry("card1/T1201N", "MK-51000")
        .unwrap();

    let catalog = engine.load_catalog().unwrap();
    let result = engine.scan(source.path(), &catalog, &SilentReporter).unwrap();
    let overridden: Vec<&SaveFile> = result
        .saves
        .iter()
        .filter(|s| s.signature.as_str() == "card1/T1201N")
        .collect();
    assert_eq!(overridden.len(), 2);
    for save in overridden {
        assert_eq!(
            save.status,
            MatchStatus::UserResolved(catalog.get("MK-51000").unwrap().clone())
        );
    }
}

#[test]
fn test_convert_writes_vmupro_layout() {
    let data = tempdir().unwrap();
    let source = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_database(data.path());
    create_source_tree(source.path());

    let engine = engine_in(data.path());
    let catalog = engine.load_catalog().unwrap();
    let result = engine.scan(source.path(), &catalog, &SilentReporter).unwrap();
    let report = engine
        .convert(&result.saves, &Selection::All, output.path(), &SilentReporter)
        .unwrap();

    assert_eq!(report.converted(), 2);
    assert_eq!(report.unmatched(), 1);
    assert_eq!(report.failed(), 0);
    let game_dir = output.path().join("Dreamcast/T-1201N");
    assert_eq!(fs::read(game_dir.join("T-1201N-1.vmu")).unwrap(), vec![0x22u8; 512]);
    assert_eq!(fs::read(game_dir.join("T-1201N-2.vmu")).unwrap(), vec![0x33u8; 512]);

    // Running again finds everything in place.
    let again = engine
        .convert(&result.saves, &Selection::All, output.path(), &SilentReporter)
        .unwrap();
    assert_eq!(again.converted(), 0);
    assert_eq!(again.already_present(), 2);
    assert_eq!(fs::read_dir(&game_dir).unwrap().count(), 2);

    let inventory = vmupro_core::output::list_output(output.path(), Some(&catalog)).unwrap();
    assert_eq!(inventory.len(), 1);
    assert_eq!(inventory[0].title.as_deref(), Some("Power Stone"));
}

#[test]
fn test_batch_reports_each_failure() {
    let data = tempdir().unwrap();
    let source = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_database(data.path());

    // Five saves for one game, two of which the transform rejects.
    let folder = source.path().join("MK51000");
    fs::create_dir_all(&folder).unwrap();
    for (i, first) in [1u8, 0xFF, 2, 0xFF, 3].iter().enumerate() {
        fs::write(folder.join(format!("{}.vmu", i)), [*first, i as u8]).unwrap();
    }

    let engine = engine_in(data.path());
    let catalog = engine.load_catalog().unwrap();
    let result = engine.scan(source.path(), &catalog, &SilentReporter).unwrap();
    assert_eq!(result.matched, 5);

    let report = engine
        .convert_with(
            &result.saves,
            &Selection::All,
            output.path(),
            &FailFirstBytes(0xFF),
            &SilentReporter,
        )
        .unwrap();
    assert_eq!(report.files.len(), 5);
    assert_eq!(report.failed(), 2);
    assert_eq!(report.converted(), 3);
    assert!(!report.cancelled);
    assert_eq!(
        fs::read_dir(output.path().join("Dreamcast/MK-51000")).unwrap().count(),
        3
    );
}

#[test]
fn test_empty_source_converts_nothing() {
    let data = tempdir().unwrap();
    let source = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_database(data.path());

    let engine = engine_in(data.path());
    let catalog = engine.load_catalog().unwrap();
    let result = engine.scan(source.path(), &catalog, &SilentReporter).unwrap();
    assert_eq!(result.total(), 0);

    let report = engine
        .convert(&result.saves, &Selection::All, output.path(), &SilentReporter)
        .unwrap();
    assert!(report.files.is_empty());
    assert_eq!(report.failed(), 0);
    assert!(!report.cancelled);
}

#[test]
fn test_scan_without_database_fails() {
    let data = tempdir().unwrap();
    let engine = engine_in(data.path());
    assert!(matches!(
        engine.load_catalog(),
        Err(Error::DatabaseUnavailable(_))
    ));
}

#[test]
fn test_cancel_token_stops_conversion() {
    let data = tempdir().unwrap();
    let source = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_database(data.path());
    create_source_tree(source.path());

    let engine = engine_in(data.path());
    let catalog = engine.load_catalog().unwrap();
    let result = engine.scan(source.path(), &catalog, &SilentReporter).unwrap();

    engine
        .cancel_token()
        .store(true, std::sync::atomic::Ordering::Relaxed);
    let report = engine
        .convert(&result.saves, &Selection::All, output.path(), &SilentReporter)
        .unwrap();
    assert!(report.cancelled);
    assert!(report.files.is_empty());
}

#[test]
fn test_legacy_mappings_apply_on_scan() {
    let data = tempdir().unwrap();
    let source = tempdir().unwrap();
    write_database(data.path());
    create_source_tree(source.path());

    let mapping_file = data.path().join("manual_mappings.json");
    let mut mappings = std::collections::BTreeMap::new();
    mappings.insert(
        format!(
            "unknown_MYSTERY_{}",
            source.path().join("card1").join("MYSTERY").display()
        ),
        "MK-51000",
    );
    mappings.insert("T-1201N".to_string(), "MK-51000");
    fs::write(&mapping_file, serde_json::to_string(&mappings).unwrap()).unwrap();

    // Store outside the data directory.
    let store_dir = tempdir().unwrap();
    let store_path = store_dir.path().join("state").join("mappings.db");
    let engine = engine_in(data.path()).with_db_path(store_path.to_str().unwrap());
    let summary = engine
        .open_store()
        .unwrap()
        .import_legacy_json(&mapping_file, Some(source.path()))
        .unwrap();
    assert_eq!(summary.signatures, 1);
    assert_eq!(summary.detected_ids, 1);
    assert!(summary.unresolved.is_empty());
    assert!(store_path.exists());
    assert!(!data.path().join("vmupro.db").exists());

    let catalog = engine.load_catalog().unwrap();
    let result = engine.scan(source.path(), &catalog, &SilentReporter).unwrap();
    assert_eq!(result.unmatched, 0);
    let sonic = catalog.get("MK-51000").unwrap().clone();
    for save in &result.saves {
        assert_eq!(save.status, MatchStatus::UserResolved(sonic.clone()));
    }
    assert_eq!(result.saves.len(), 3);
}
