pub mod catalog;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod identify;
pub mod model;
pub mod output;
pub mod progress;
pub mod reconcile;
pub mod scanner;
pub mod storage;

pub use catalog::{GameCatalog, GameRecord};
pub use config::AppConfig;
pub use convert::{ConversionReport, ConvertOutcome, Passthrough, SaveTransform, Selection};
pub use engine::{SaveEngine, ScanResult};
pub use error::Error;
pub use model::{Confidence, DetectionSource, MatchStatus, SaveFile, SaveSignature};
pub use progress::{ProgressReporter, SilentReporter};
pub use reconcile::{Resolution, Resolver, UnmatchedGroup};
