use crate::catalog::GameRecord;
use std::fmt;
use std::path::{Path, PathBuf};

/// Key that ties a save to a manual reconciliation choice.
///
/// The relative path of the folder holding the save, `/`-separated. Saves at
/// the top of the source tree use their file stem instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SaveSignature(String);

impl SaveSignature {
    pub fn new(value: &str) -> Self {
        SaveSignature(value.to_string())
    }

    /// Signature for a save given its path relative to the source root.
    pub fn from_relative_path(rel_path: &Path) -> Self {
        let folder = rel_path.parent().map(path_to_slashes).unwrap_or_default();
        if folder.is_empty() {
            let stem = rel_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            SaveSignature(stem)
        } else {
            SaveSignature(folder)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, used to seed a search when reconciling.
    pub fn folder_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for SaveSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn path_to_slashes(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Where an automatic identification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionSource {
    FolderPath,
    FileName,
    MetadataSerial,
    TitleMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    Medium,
    High,
    Manual,
}

impl DetectionSource {
    pub fn confidence(self) -> Confidence {
        match self {
            DetectionSource::TitleMatch => Confidence::Medium,
            _ => Confidence::High,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DetectionSource::FolderPath => "Path",
            DetectionSource::FileName => "Filename",
            DetectionSource::MetadataSerial => "Metadata File",
            DetectionSource::TitleMatch => "Title Match",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchStatus {
    Unmatched,
    Matched(GameRecord, DetectionSource),
    UserResolved(GameRecord),
}

impl MatchStatus {
    pub fn record(&self) -> Option<&GameRecord> {
        match self {
            MatchStatus::Unmatched => None,
            MatchStatus::Matched(record, _) | MatchStatus::UserResolved(record) => Some(record),
        }
    }

    pub fn is_unmatched(&self) -> bool {
        matches!(self, MatchStatus::Unmatched)
    }

    pub fn confidence(&self) -> Option<Confidence> {
        match self {
            MatchStatus::Unmatched => None,
            MatchStatus::Matched(_, source) => Some(source.confidence()),
            MatchStatus::UserResolved(_) => Some(Confidence::Manual),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MatchStatus::Unmatched => "Unmatched",
            MatchStatus::Matched(_, source) => source.label(),
            MatchStatus::UserResolved(_) => "User Set",
        }
    }
}

/// A source save discovered during one run.
#[derive(Debug, Clone)]
pub struct SaveFile {
    pub path: PathBuf,
    pub rel_path: PathBuf,
    pub file_name: String,
    pub size: u64,
    pub signature: SaveSignature,
    pub status: MatchStatus,
}

impl SaveFile {
    /// Folder containing the save.
    pub fn folder(&self) -> &Path {
        self.path.parent().unwrap_or(&self.path)
    }

    pub fn game_id(&self) -> Option<&str> {
        self.status.record().map(|r| r.id.as_str())
    }
}
