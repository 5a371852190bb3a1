pub mod models;
pub mod queries;
pub mod sqlite;

pub use models::{DetectedIdOverride, ImportSummary, ReconciliationEntry, UpsertOutcome};
pub use sqlite::Database;
