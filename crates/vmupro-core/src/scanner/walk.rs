use crate::error::Error;
use crate::model::{MatchStatus, SaveFile, SaveSignature};
use crate::progress::ProgressReporter;
use glob::Pattern;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

/// What the walk keeps.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Extensions without the dot, compared case-insensitively.
    pub extensions: Vec<String>,
    pub ignore_patterns: Vec<Pattern>,
}

impl ScanOptions {
    pub fn new(extensions: &[String], ignore_globs: &[String]) -> Self {
        let ignore_patterns = ignore_globs
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();
        Self {
            extensions: extensions.iter().map(|e| e.trim_start_matches('.').to_lowercase()).collect(),
            ignore_patterns,
        }
    }

    fn wants(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .map_or(false, |ext| self.extensions.iter().any(|e| *e == ext))
    }

    fn ignores(&self, path: &Path) -> bool {
        self.ignore_patterns.iter().any(|p| p.matches_path(path))
    }
}

/// Walk `root` recursively and return every save file, sorted by path.
///
/// Symlinks are not followed. Unreadable directories are logged and skipped;
/// a missing or unreadable root is an error.
pub fn collect_saves(
    root: &Path,
    options: &ScanOptions,
    reporter: &dyn ProgressReporter,
) -> Result<Vec<SaveFile>, Error> {
    if !root.is_dir() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Source directory {} does not exist", root.display()),
        )));
    }

    let mut saves = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !options.ignores(entry.path()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                if err.depth() == 0 {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::Other,
                        format!("Error reading directory {}: {}", path.display(), err),
                    )));
                }
                if err.io_error().map(|e| e.kind()) == Some(io::ErrorKind::PermissionDenied) {
                    error!("Access denied reading directory {}: {}", path.display(), err);
                } else {
                    warn!("Skipping {}: {}", path.display(), err);
                }
                continue;
            }
        };

        if !entry.file_type().is_file() || !options.wants(entry.path()) {
            continue;
        }

        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(err) => {
                warn!("Error getting metadata for {}: {}", entry.path().display(), err);
                continue;
            }
        };

        let path = entry.path().to_path_buf();
        let rel_path = path.strip_prefix(root).map(PathBuf::from).unwrap_or_else(|_| path.clone());
        let file_name = entry.file_name().to_string_lossy().into_owned();
        reporter.on_scan_progress(saves.len() + 1, &path.to_string_lossy());

        saves.push(SaveFile {
            signature: SaveSignature::from_relative_path(&rel_path),
            path,
            rel_path,
            file_name,
            size,
            status: MatchStatus::Unmatched,
        });
    }

    debug!("Found {} save files under {}", saves.len(), root.display());
    Ok(saves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentReporter;
    use std::fs;
    use tempfile::tempdir;

    fn options(ignore: &[&str]) -> ScanOptions {
        let ignore: Vec<String> = ignore.iter().map(|s| s.to_string()).collect();
        ScanOptions::new(&["vmu".to_string()], &ignore)
    }

    #[test]
    fn test_collects_sorted_saves() {
        let dir = tempdir().unwrap();
        // Layout: root/
        //   B/save.VMU
        //   A/save.vmu
        //   A/notes.txt
        //   top.vmu
        fs::create_dir_all(dir.path().join("A")).unwrap();
        fs::create_dir_all(dir.path().join("B")).unwrap();
        fs::write(dir.path().join("B/save.VMU"), b"b").unwrap();
        fs::write(dir.path().join("A/save.vmu"), b"a").unwrap();
        fs::write(dir.path().join("A/notes.txt"), b"n").unwrap();
        fs::write(dir.path().join("top.vmu"), b"t").unwrap();

        let saves = collect_saves(dir.path(), &options(&[]), &SilentReporter).unwrap();
        let rel: Vec<String> = saves
            .iter()
            .map(|s| crate::model::path_to_slashes(&s.rel_path))
            .collect();
        assert_eq!(rel, vec!["A/save.vmu", "B/save.VMU", "top.vmu"]);
        assert_eq!(saves[0].signature.as_str(), "A");
        assert_eq!(saves[2].signature.as_str(), "top");
        assert!(saves.iter().all(|s| s.status.is_unmatched()));
    }

    #[test]
    fn test_ignore_patterns_prune_directories() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("backup")).unwrap();
        fs::create_dir_all(dir.path().join("keep")).unwrap();
        fs::write(dir.path().join("backup/old.vmu"), b"o").unwrap();
        fs::write(dir.path().join("keep/new.vmu"), b"n").unwrap();

        let saves = collect_saves(dir.path(), &options(&["*/backup"]), &SilentReporter).unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].file_name, "new.vmu");
    }

    #[test]
    fn test_empty_root() {
        let dir = tempdir().unwrap();
        assert!(collect_saves(dir.path(), &options(&[]), &SilentReporter)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_missing_root_is_error() {
        let dir = tempdir().unwrap();
        let result = collect_saves(&dir.path().join("nope"), &options(&[]), &SilentReporter);
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
