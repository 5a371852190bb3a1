use crate::catalog::GameCatalog;
use crate::convert::{PLATFORM_DIR, SAVE_EXTENSION};
use crate::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

/// Saves already in the output tree for one game folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputGame {
    pub game_id: String,
    pub title: Option<String>,
    pub files: Vec<PathBuf>,
    pub total_bytes: u64,
}

/// Inventory of `<output>/Dreamcast`, sorted by game id. A missing tree is empty.
pub fn list_output(output_root: &Path, catalog: Option<&GameCatalog>) -> Result<Vec<OutputGame>, Error> {
    let platform_dir = output_root.join(PLATFORM_DIR);
    if !platform_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut games = Vec::new();
    for entry in fs::read_dir(&platform_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let game_id = entry.file_name().to_string_lossy().into_owned();

        let mut files = Vec::new();
        let mut total_bytes = 0;
        for file in fs::read_dir(entry.path())? {
            let path = file?.path();
            let is_save = path
                .extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case(SAVE_EXTENSION));
            if path.is_file() && is_save {
                total_bytes += fs::metadata(&path)?.len();
                files.push(path);
            }
        }
        if files.is_empty() {
            continue;
        }
        files.sort();

        let title = catalog
            .and_then(|c| c.get(&game_id))
            .map(|record| record.title.clone());
        games.push(OutputGame {
            game_id,
            title,
            files,
            total_bytes,
        });
    }

    games.sort_by(|a, b| a.game_id.cmp(&b.game_id));
    Ok(games)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::GameRecord;
    use tempfile::tempdir;

    #[test]
    fn test_missing_output_is_empty() {
        let dir = tempdir().unwrap();
        assert!(list_output(dir.path(), None).unwrap().is_empty());
    }

    #[test]
    fn test_lists_games_with_titles() {
        let dir = tempdir().unwrap();
        let dc = dir.path().join(PLATFORM_DIR);
        fs::create_dir_all(dc.join("T-1201N")).unwrap();
        fs::create_dir_all(dc.join("EMPTY")).unwrap();
        fs::create_dir_all(dc.join("HB-0001")).unwrap();
        fs::write(dc.join("T-1201N/T-1201N-2.vmu"), [0u8; 4]).unwrap();
        fs::write(dc.join("T-1201N/T-1201N-1.vmu"), [0u8; 6]).unwrap();
        fs::write(dc.join("T-1201N/readme.txt"), "x").unwrap();
        fs::write(dc.join("HB-0001/HB-0001-1.VMU"), [0u8; 1]).unwrap();

        let catalog = GameCatalog::from_records(
            vec![GameRecord::new("T-1201N", "Power Stone", "USA")],
            "test",
        );
        let games = list_output(dir.path(), Some(&catalog)).unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].game_id, "HB-0001");
        assert_eq!(games[0].title, None);
        assert_eq!(games[1].title.as_deref(), Some("Power Stone"));
        assert_eq!(games[1].total_bytes, 10);
        assert!(games[1].files[0].ends_with("T-1201N-1.vmu"));
    }
}
