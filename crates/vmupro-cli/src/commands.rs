use clap::{Parser, Subcommand};
use vmupro_core::catalog::search::DEFAULT_SEARCH_LIMIT;

#[derive(Debug, Parser)]
#[command(name = "vmupro")]
#[command(about = "Convert VM2 Dreamcast saves into the VMUPro layout", long_about = None)]
pub struct Cli {
    /// Source directory with VM2 saves (overrides source_dir)
    #[arg(long, global = true)]
    pub source: Option<String>,

    /// Output directory for the VMUPro layout (overrides output_dir)
    #[arg(long, global = true)]
    pub output: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download the game database and replace the local copy
    Download,
    /// Scan the source directory and show how each save was identified
    Scan {
        /// Only list saves that could not be identified
        #[arg(long)]
        unmatched: bool,
    },
    /// Pick the game for every unidentified save folder
    Reconcile,
    /// Set the game for a save signature directly
    Map {
        signature: String,
        game_id: String,
        /// Accept an id that is not in the game database
        #[arg(long)]
        force: bool,
        /// Treat the first argument as a detected game id to remap
        #[arg(long)]
        detected: bool,
    },
    /// Remove a manual mapping
    Unmap {
        signature: String,
        /// Remove a detected-id override instead
        #[arg(long)]
        detected: bool,
    },
    /// List manual mappings
    Mappings,
    /// Import mappings from a manual_mappings.json file. Folder keys are
    /// resolved against --source (or source_dir)
    ImportMappings {
        /// Defaults to manual_mappings.json in the data directory
        path: Option<String>,
    },
    /// Search the game database by id, title or region
    Search {
        query: Vec<String>,
        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },
    /// List ids that look like the given one
    Similar { game_id: String },
    /// Convert identified saves into the output directory
    Convert {
        /// Only convert these game ids
        #[arg(long = "game", conflicts_with = "signatures")]
        games: Vec<String>,
        /// Only convert saves with these signatures
        #[arg(long = "signature")]
        signatures: Vec<String>,
        /// Convert the identified saves even when others are unidentified
        #[arg(long)]
        skip_unmatched: bool,
        /// Do not ask before converting
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// List saves already in the output directory
    Output,
    /// Print configuration values
    PrintConfig,
}
