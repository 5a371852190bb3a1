/// A persisted manual choice: every save with `signature` belongs to `game_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationEntry {
    pub signature: String,
    pub game_id: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// The signature pointed at another game before.
    Updated,
    Unchanged,
}

/// A persisted remap: saves detected as `detected_id` belong to `game_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedIdOverride {
    pub detected_id: String,
    pub game_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// What a legacy mappings import changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    /// Reconciliation entries inserted or changed.
    pub signatures: usize,
    /// Detected-id overrides inserted or changed.
    pub detected_ids: usize,
    pub unchanged: usize,
    /// Keys that could not be turned into a signature or an id.
    pub unresolved: Vec<String>,
}
