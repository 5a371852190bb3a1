mod commands;
mod logging;
mod progress;
mod resolver;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use progress::CliReporter;
use resolver::PromptResolver;
use tracing::{error, info, warn};
use vmupro_core::catalog::{GameCatalog, RefreshOutcome};
use vmupro_core::config::LEGACY_MAPPINGS_FILE;
use vmupro_core::storage::UpsertOutcome;
use vmupro_core::{
    convert, output, reconcile, AppConfig, ConvertOutcome, Error, MatchStatus, SaveEngine,
    Selection,
};

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match vmupro_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();
    let Some(command) = args.command else {
        let _ = Cli::command().print_long_help();
        return;
    };

    let engine = SaveEngine::new(config);
    let source = args.source.as_deref();
    let output = args.output.as_deref();

    let result = match command {
        Commands::Download => run_download(&engine),
        Commands::Scan { unmatched } => run_scan(&engine, source, unmatched),
        Commands::Reconcile => run_reconcile(&engine, source),
        Commands::Map {
            signature,
            game_id,
            force,
            detected,
        } => run_map(&engine, &signature, &game_id, force, detected),
        Commands::Unmap {
            signature,
            detected,
        } => run_unmap(&engine, &signature, detected),
        Commands::Mappings => run_mappings(&engine),
        Commands::ImportMappings { path } => run_import(&engine, source, path),
        Commands::Search { query, limit } => run_search(&engine, &query.join(" "), limit),
        Commands::Similar { game_id } => run_similar(&engine, &game_id),
        Commands::Convert {
            games,
            signatures,
            skip_unmatched,
            yes,
        } => {
            let selection = if !games.is_empty() {
                Selection::Games(games)
            } else if !signatures.is_empty() {
                Selection::Signatures(signatures)
            } else {
                Selection::All
            };
            run_convert(&engine, source, output, &selection, skip_unmatched, yes)
        }
        Commands::Output => run_output(&engine, output),
        Commands::PrintConfig => {
            print_config(engine.config());
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("Error: {:#}", err);
        process::exit(1);
    }
}

fn run_download(engine: &SaveEngine) -> anyhow::Result<()> {
    let reporter = CliReporter::new();
    let (catalog, outcome) = engine.refresh_catalog(&reporter)?;
    match outcome {
        RefreshOutcome::Downloaded { games } => info!(
            "Game database updated: {} games",
            format!("{}", games).green()
        ),
        RefreshOutcome::KeptCache { reason } => warn!(
            "Download failed ({}); keeping cached database with {} games",
            reason,
            format!("{}", catalog.len()).yellow()
        ),
    }
    Ok(())
}

fn run_scan(engine: &SaveEngine, source: Option<&str>, only_unmatched: bool) -> anyhow::Result<()> {
    let catalog = engine.load_catalog()?;
    let source = engine.source_dir(source)?;
    let result = engine.scan(&source, &catalog, &CliReporter::new())?;

    for save in &result.saves {
        if only_unmatched && !save.status.is_unmatched() {
            continue;
        }
        let rel = vmupro_core::model::path_to_slashes(&save.rel_path);
        match save.status.record() {
            Some(record) => println!(
                "{:<14} {:<13} {} ({})  {}",
                record.id.cyan(),
                save.status.label().color(status_color(&save.status)),
                record.title,
                record.region,
                rel.dimmed()
            ),
            None => println!(
                "{:<14} {:<13} {}",
                "?".red(),
                save.status.label().color(status_color(&save.status)),
                rel
            ),
        }
    }

    println!();
    info!(
        "{} saves: {} identified, {} unmatched",
        result.total(),
        format!("{}", result.matched).green(),
        format!("{}", result.unmatched).red(),
    );
    if result.unmatched > 0 {
        info!("Run `vmupro reconcile` to pick games for unmatched saves");
    }
    Ok(())
}

fn run_reconcile(engine: &SaveEngine, source: Option<&str>) -> anyhow::Result<()> {
    let catalog = engine.load_catalog()?;
    let source = engine.source_dir(source)?;
    let mut result = engine.scan(&source, &catalog, &CliReporter::new())?;

    let groups = reconcile::unmatched_groups(&result.saves);
    if groups.is_empty() {
        info!("All {} saves are identified, nothing to reconcile", result.total());
        return Ok(());
    }

    let db = engine.open_store()?;
    let mut resolver = PromptResolver::new(groups.len());
    let summary = reconcile::run_reconciliation(&db, &catalog, &mut result.saves, &mut resolver)?;

    println!();
    info!(
        "{} folders resolved, {} skipped",
        format!("{}", summary.resolved).green(),
        format!("{}", summary.skipped).yellow(),
    );
    Ok(())
}

/// The map command can store ids outside the catalog, so a missing catalog is not fatal there.
fn catalog_or_empty(engine: &SaveEngine, force: bool) -> anyhow::Result<GameCatalog> {
    match engine.load_catalog() {
        Ok(catalog) => Ok(catalog),
        Err(Error::DatabaseUnavailable(reason)) if force => {
            warn!("{}", reason);
            Ok(GameCatalog::default())
        }
        Err(e) => Err(e.into()),
    }
}

fn run_map(
    engine: &SaveEngine,
    signature: &str,
    game_id: &str,
    force: bool,
    detected: bool,
) -> anyhow::Result<()> {
    let catalog = catalog_or_empty(engine, force)?;
    let db = engine.open_store()?;
    let mapped = if detected {
        reconcile::map_detected_id(&db, &catalog, signature, game_id, force)
    } else {
        reconcile::map_signature(&db, &catalog, signature, game_id, force)
    };
    let (game_id, outcome) = mapped
        .map_err(|e| match e {
            Error::UnknownGame(id) => anyhow::anyhow!(
                "'{}' is not in the game database (try `vmupro similar {}` or pass --force)",
                id,
                id
            ),
            e => e.into(),
        })?;
    let title = catalog.record_or_unlisted(&game_id).title;
    match outcome {
        UpsertOutcome::Inserted => info!("Mapped {} -> {} ({})", signature, game_id.cyan(), title),
        UpsertOutcome::Updated => info!("Remapped {} -> {} ({})", signature, game_id.cyan(), title),
        UpsertOutcome::Unchanged => info!("{} already maps to {}", signature, game_id.cyan()),
    }
    Ok(())
}

fn run_unmap(engine: &SaveEngine, key: &str, detected: bool) -> anyhow::Result<()> {
    let db = engine.open_store()?;
    if detected {
        let detected_id = key.trim();
        if db.delete_detected_override(detected_id)? {
            info!("Removed override for detected id {}", detected_id);
        } else {
            warn!("No override for detected id {}", detected_id);
        }
        return Ok(());
    }
    let signature = key.trim_matches('/').replace('\\', "/");
    if db.delete_entry(&signature)? {
        info!("Removed mapping for {}", signature);
    } else {
        warn!("No mapping for {}", signature);
    }
    Ok(())
}

fn run_mappings(engine: &SaveEngine) -> anyhow::Result<()> {
    let db = engine.open_store()?;
    let entries = db.list_entries()?;
    let detected = db.list_detected_overrides()?;
    let catalog = engine.load_catalog().ok();
    let title_of = |game_id: &str| -> String {
        catalog
            .as_ref()
            .and_then(|c| c.get(game_id))
            .map(|r| r.title.clone())
            .unwrap_or_else(|| "(not in database)".to_string())
    };

    for entry in &entries {
        println!(
            "{:<40} {:<14} {}  {}",
            entry.signature,
            entry.game_id.cyan(),
            title_of(&entry.game_id),
            entry.updated_at.dimmed()
        );
    }
    if !detected.is_empty() {
        println!("\n{}", "Detected-id overrides".bold());
        for entry in &detected {
            println!(
                "{:<40} {:<14} {}  {}",
                entry.detected_id,
                entry.game_id.cyan(),
                title_of(&entry.game_id),
                entry.updated_at.dimmed()
            );
        }
    }
    info!(
        "{} manual mappings, {} detected-id overrides",
        format!("{}", entries.len()).green(),
        format!("{}", detected.len()).green()
    );
    Ok(())
}

fn run_import(engine: &SaveEngine, source: Option<&str>, path: Option<String>) -> anyhow::Result<()> {
    let path = path
        .map(PathBuf::from)
        .unwrap_or_else(|| engine.config().data_path(LEGACY_MAPPINGS_FILE));
    let source_root = engine.source_dir(source).ok();
    if source_root.is_none() {
        warn!("No source directory given; folder mappings cannot be resolved");
    }
    let db = engine.open_store()?;
    let summary = db
        .import_legacy_json(&path, source_root.as_deref())
        .with_context(|| format!("importing {}", path.display()))?;
    info!(
        "Imported {} folder mappings and {} detected-id overrides from {} ({} unchanged)",
        format!("{}", summary.signatures).green(),
        format!("{}", summary.detected_ids).green(),
        path.display(),
        summary.unchanged
    );
    for key in &summary.unresolved {
        warn!("Not imported: {}", key.yellow());
    }
    Ok(())
}

fn run_search(engine: &SaveEngine, query: &str, limit: usize) -> anyhow::Result<()> {
    let catalog = engine.load_catalog()?;
    let hits = catalog.search(query, limit);
    for hit in &hits {
        println!(
            "{:<14} {} ({})  {}",
            hit.record.id.cyan(),
            hit.record.title,
            hit.record.region,
            format!("{}", hit.score).dimmed()
        );
    }
    info!("{} of {} games shown", hits.len(), catalog.len());
    Ok(())
}

fn run_similar(engine: &SaveEngine, game_id: &str) -> anyhow::Result<()> {
    let catalog = engine.load_catalog()?;
    let similar = catalog.similar_ids(game_id);
    if similar.is_empty() {
        warn!("No ids resemble {}", game_id);
    }
    for record in similar {
        println!("{:<14} {} ({})", record.id.cyan(), record.title, record.region);
    }
    Ok(())
}

fn run_convert(
    engine: &SaveEngine,
    source: Option<&str>,
    output: Option<&str>,
    selection: &Selection,
    skip_unmatched: bool,
    assume_yes: bool,
) -> anyhow::Result<()> {
    let catalog = engine.load_catalog()?;
    let source = engine.source_dir(source)?;
    let output = engine.output_dir(output)?;
    let result = engine.scan(&source, &catalog, &CliReporter::new())?;

    let selected = selection.apply(&result.saves);
    let unmatched = selected.iter().filter(|s| s.status.is_unmatched()).count();
    if unmatched > 0 && !skip_unmatched {
        bail!(
            "{} selected saves are unmatched; run `vmupro reconcile` or pass --skip-unmatched",
            unmatched
        );
    }
    if selected.is_empty() {
        info!("No saves selected, nothing to convert");
    } else if !assume_yes {
        let prompt = format!(
            "Convert {} saves into {}?",
            selected.len() - unmatched,
            output.join(convert::PLATFORM_DIR).display()
        );
        if !prompt_confirm(&prompt, Some(true))? {
            return Ok(());
        }
    }

    let report = engine.convert(&result.saves, selection, &output, &CliReporter::new())?;

    for file in &report.files {
        if let ConvertOutcome::Failed(reason) = &file.outcome {
            println!("{} {}: {}", "✗".red(), file.source.display(), reason);
        }
    }
    println!();
    info!(
        "{} converted into {} games, {} already present, {} unmatched skipped, {} failed",
        format!("{}", report.converted()).green(),
        convert::touched_games(&report).len(),
        format!("{}", report.already_present()).cyan(),
        format!("{}", report.unmatched()).yellow(),
        format!("{}", report.failed()).red(),
    );
    if report.cancelled {
        warn!("Conversion was cancelled before all saves were processed");
    }
    Ok(())
}

fn run_output(engine: &SaveEngine, output: Option<&str>) -> anyhow::Result<()> {
    let output = engine.output_dir(output)?;
    let catalog = engine.load_catalog().ok();
    let games = output::list_output(&output, catalog.as_ref())?;

    let mut total = 0;
    for game in &games {
        total += game.files.len();
        println!(
            "{:<14} {:<40} {} files, {} bytes",
            game.game_id.cyan(),
            game.title.as_deref().unwrap_or("?"),
            game.files.len(),
            game.total_bytes
        );
    }
    info!(
        "{} saves for {} games in {}",
        format!("{}", total).green(),
        games.len(),
        output.join(convert::PLATFORM_DIR).display()
    );
    Ok(())
}

fn print_config(config: &AppConfig) {
    println!("Configuration: {:#?}", config);
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(default.unwrap_or(false));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}

fn status_color(status: &MatchStatus) -> Color {
    match status {
        MatchStatus::Unmatched => Color::Red,
        MatchStatus::Matched(..) => Color::Green,
        MatchStatus::UserResolved(_) => Color::Cyan,
    }
}
