//! Writing identified saves into the VMUPro layout,
//! `<output>/Dreamcast/<game id>/<game id>-<n>.vmu`.

pub mod transform;

pub use transform::{Passthrough, SaveTransform};

use crate::catalog::normalize_id;
use crate::model::SaveFile;
use crate::progress::ProgressReporter;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::hash::Hasher as _;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use twox_hash::XxHash64;

pub const PLATFORM_DIR: &str = "Dreamcast";
pub const SAVE_EXTENSION: &str = "vmu";

/// Which saves a batch should cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    /// Game ids, compared without case or separators.
    Games(Vec<String>),
    Signatures(Vec<String>),
}

impl Selection {
    pub fn includes(&self, save: &SaveFile) -> bool {
        match self {
            Selection::All => true,
            Selection::Games(ids) => save.game_id().map_or(false, |game_id| {
                let wanted = normalize_id(game_id);
                ids.iter().any(|id| normalize_id(id) == wanted)
            }),
            Selection::Signatures(signatures) => signatures
                .iter()
                .any(|s| s.trim_matches('/').replace('\\', "/") == save.signature.as_str()),
        }
    }

    pub fn apply<'a>(&self, saves: &'a [SaveFile]) -> Vec<&'a SaveFile> {
        saves.iter().filter(|s| self.includes(s)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertOutcome {
    Converted(PathBuf),
    /// Identical content already sits in the game folder at this path.
    AlreadyPresent(PathBuf),
    /// The save has no game and was left alone.
    Unmatched,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub source: PathBuf,
    pub game_id: Option<String>,
    pub outcome: ConvertOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct ConversionReport {
    pub files: Vec<FileReport>,
    pub cancelled: bool,
    pub duration: Duration,
}

impl ConversionReport {
    fn count(&self, pred: impl Fn(&ConvertOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }

    pub fn converted(&self) -> usize {
        self.count(|o| matches!(o, ConvertOutcome::Converted(_)))
    }

    pub fn already_present(&self) -> usize {
        self.count(|o| matches!(o, ConvertOutcome::AlreadyPresent(_)))
    }

    pub fn unmatched(&self) -> usize {
        self.count(|o| matches!(o, ConvertOutcome::Unmatched))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ConvertOutcome::Failed(_)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.files.iter().filter_map(|f| match &f.outcome {
            ConvertOutcome::Failed(reason) => Some((f.source.as_path(), reason.as_str())),
            _ => None,
        })
    }
}

/// Directory name for a game id. Path separators and characters Windows
/// rejects become `_`.
pub fn game_dir_name(game_id: &str) -> String {
    game_id
        .trim()
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

pub fn game_dir(output_root: &Path, game_id: &str) -> PathBuf {
    output_root.join(PLATFORM_DIR).join(game_dir_name(game_id))
}

pub fn hash_data(data: &[u8]) -> u64 {
    let mut hasher = XxHash64::default();
    hasher.write(data);
    hasher.finish()
}

/// Per-game state for one batch: contents already in the folder, and the
/// next channel number to try.
struct GameFolder {
    dir: PathBuf,
    prefix: String,
    next_channel: u32,
    /// content hash -> files with that hash
    existing: HashMap<u64, Vec<PathBuf>>,
}

impl GameFolder {
    fn open(output_root: &Path, game_id: &str) -> Self {
        let dir = game_dir(output_root, game_id);
        let mut existing: HashMap<u64, Vec<PathBuf>> = HashMap::new();
        if let Ok(entries) = fs::read_dir(&dir) {
            let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
            paths.sort();
            for path in paths.into_iter().filter(|p| p.is_file()) {
                match fs::read(&path) {
                    Ok(data) => {
                        existing.entry(hash_data(&data)).or_default().push(path);
                    }
                    Err(e) => warn!("Error reading existing save {}: {}", path.display(), e),
                }
            }
        }
        Self {
            prefix: game_dir_name(game_id),
            dir,
            next_channel: 1,
            existing,
        }
    }

    /// A file in the folder holding exactly `data`. The hash only picks the
    /// candidates; their bytes decide.
    fn identical(&self, hash: u64, data: &[u8]) -> Option<&PathBuf> {
        self.existing.get(&hash)?.iter().find(|path| match fs::read(path) {
            Ok(existing) => existing == data,
            Err(e) => {
                warn!("Error reading existing save {}: {}", path.display(), e);
                false
            }
        })
    }

    /// First `<id>-<n>.vmu` that does not exist yet.
    fn next_free_path(&mut self) -> PathBuf {
        loop {
            let path = self.dir.join(format!(
                "{}-{}.{}",
                self.prefix, self.next_channel, SAVE_EXTENSION
            ));
            self.next_channel += 1;
            if !path.exists() {
                return path;
            }
        }
    }
}

/// Convert `saves` one after another. Failures are recorded per file and
/// never stop the batch; `cancel` is checked before every file.
pub fn convert_batch(
    saves: &[&SaveFile],
    output_root: &Path,
    transform: &dyn SaveTransform,
    cancel: &AtomicBool,
    reporter: &dyn ProgressReporter,
) -> ConversionReport {
    let start = Instant::now();
    let mut report = ConversionReport::default();
    let mut folders: HashMap<String, GameFolder> = HashMap::new();
    let total = saves.len();

    info!(
        "Converting {} saves into {} ({})",
        total,
        output_root.join(PLATFORM_DIR).display(),
        transform.name()
    );
    reporter.on_convert_start(total);

    for (index, save) in saves.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            info!("Conversion cancelled after {} of {} files", index, total);
            report.cancelled = true;
            break;
        }
        reporter.on_convert_progress(index, total, &save.path.to_string_lossy());

        let game_id = save.game_id().map(str::to_string);
        let outcome = match &game_id {
            None => {
                debug!("Skipping unmatched save {}", save.path.display());
                ConvertOutcome::Unmatched
            }
            Some(id) => {
                let folder = folders
                    .entry(id.clone())
                    .or_insert_with(|| GameFolder::open(output_root, id));
                match convert_one(save, folder, transform) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!("Error converting {}: {}", save.path.display(), e);
                        ConvertOutcome::Failed(e.to_string())
                    }
                }
            }
        };

        report.files.push(FileReport {
            source: save.path.clone(),
            game_id,
            outcome,
        });
    }

    report.duration = start.elapsed();
    reporter.on_convert_complete(
        report.converted(),
        report.failed(),
        report.duration.as_secs_f64(),
    );
    debug!(
        "Conversion finished in {:.2}s: {} converted, {} already present, {} unmatched, {} failed",
        report.duration.as_secs_f64(),
        report.converted(),
        report.already_present(),
        report.unmatched(),
        report.failed()
    );
    report
}

fn convert_one(
    save: &SaveFile,
    folder: &mut GameFolder,
    transform: &dyn SaveTransform,
) -> Result<ConvertOutcome, crate::Error> {
    let input = fs::read(&save.path)?;
    let output = transform.transform(save, &input)?;

    let hash = hash_data(&output);
    if let Some(existing) = folder.identical(hash, &output) {
        debug!(
            "{} already present as {}",
            save.path.display(),
            existing.display()
        );
        return Ok(ConvertOutcome::AlreadyPresent(existing.clone()));
    }

    fs::create_dir_all(&folder.dir)?;
    let target = folder.next_free_path();
    if let Err(e) = write_new_file(&target, &output) {
        let _ = fs::remove_file(&target);
        return Err(e.into());
    }

    if let Err(e) = copy_modified_time(&save.path, &target) {
        warn!("Could not keep modification time on {}: {}", target.display(), e);
    }

    folder.existing.entry(hash).or_default().push(target.clone());
    debug!("{} -> {}", save.path.display(), target.display());
    Ok(ConvertOutcome::Converted(target))
}

fn write_new_file(target: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(target)?;
    file.write_all(data)?;
    file.sync_all()
}

fn copy_modified_time(source: &Path, target: &Path) -> io::Result<()> {
    let modified = fs::metadata(source)?.modified()?;
    File::options().write(true).open(target)?.set_modified(modified)
}

/// Ids of the games a batch wrote into, for summaries.
pub fn touched_games(report: &ConversionReport) -> HashSet<&str> {
    report
        .files
        .iter()
        .filter(|f| matches!(f.outcome, ConvertOutcome::Converted(_)))
        .filter_map(|f| f.game_id.as_deref())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::GameRecord;
    use crate::error::Error;
    use crate::model::{DetectionSource, MatchStatus, SaveSignature};
    use crate::progress::SilentReporter;
    use std::borrow::Cow;
    use tempfile::tempdir;

    fn save(root: &Path, rel: &str, data: &[u8], game: Option<&str>) -> SaveFile {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, data).unwrap();
        let rel_path = PathBuf::from(rel);
        SaveFile {
            file_name: path.file_name().unwrap().to_string_lossy().into_owned(),
            signature: SaveSignature::from_relative_path(&rel_path),
            path,
            rel_path,
            size: data.len() as u64,
            status: match game {
                Some(id) => MatchStatus::Matched(GameRecord::new(id, id, "USA"), DetectionSource::FolderPath),
                None => MatchStatus::Unmatched,
            },
        }
    }

    struct FailOn(&'static [u8]);

    impl SaveTransform for FailOn {
        fn name(&self) -> &str {
            "fail-on"
        }

        fn transform<'a>(&self, _save: &SaveFile, input: &'a [u8]) -> Result<Cow<'a, [u8]>, Error> {
            if input == self.0 {
                Err(Error::Other("corrupt save".to_string()))
            } else {
                Ok(Cow::Borrowed(input))
            }
        }
    }

    #[test]
    fn test_channels_and_layout() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        let saves = vec![
            save(src.path(), "a/1.vmu", b"one", Some("T-1201N")),
            save(src.path(), "a/2.vmu", b"two", Some("T-1201N")),
            save(src.path(), "b/1.vmu", b"three", Some("MK-51000")),
        ];
        let refs: Vec<&SaveFile> = saves.iter().collect();
        let report = convert_batch(&refs, out.path(), &Passthrough, &AtomicBool::new(false), &SilentReporter);

        assert_eq!(report.converted(), 3);
        let dc = out.path().join(PLATFORM_DIR);
        assert_eq!(fs::read(dc.join("T-1201N/T-1201N-1.vmu")).unwrap(), b"one");
        assert_eq!(fs::read(dc.join("T-1201N/T-1201N-2.vmu")).unwrap(), b"two");
        assert_eq!(fs::read(dc.join("MK-51000/MK-51000-1.vmu")).unwrap(), b"three");
    }

    #[test]
    fn test_existing_files_are_kept() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        let dir = game_dir(out.path(), "T-1201N");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("T-1201N-1.vmu"), b"old").unwrap();

        let saves = vec![
            save(src.path(), "a/1.vmu", b"old", Some("T-1201N")),
            save(src.path(), "a/2.vmu", b"new", Some("T-1201N")),
        ];
        let refs: Vec<&SaveFile> = saves.iter().collect();
        let report = convert_batch(&refs, out.path(), &Passthrough, &AtomicBool::new(false), &SilentReporter);

        assert_eq!(
            report.files[0].outcome,
            ConvertOutcome::AlreadyPresent(dir.join("T-1201N-1.vmu"))
        );
        assert_eq!(report.files[1].outcome, ConvertOutcome::Converted(dir.join("T-1201N-2.vmu")));
    }

    #[test]
    fn test_hash_collision_is_not_already_present() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        let dir = game_dir(out.path(), "T-1201N");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("T-1201N-1.vmu"), b"old").unwrap();

        // Pretend "new" hashes like the file already holding "old".
        let mut folder = GameFolder::open(out.path(), "T-1201N");
        folder
            .existing
            .entry(hash_data(b"new"))
            .or_default()
            .push(dir.join("T-1201N-1.vmu"));

        let new_save = save(src.path(), "a/2.vmu", b"new", Some("T-1201N"));
        let outcome = convert_one(&new_save, &mut folder, &Passthrough).unwrap();
        assert_eq!(outcome, ConvertOutcome::Converted(dir.join("T-1201N-2.vmu")));
        assert_eq!(fs::read(dir.join("T-1201N-1.vmu")).unwrap(), b"old");

        let again = convert_one(&new_save, &mut folder, &Passthrough).unwrap();
        assert_eq!(again, ConvertOutcome::AlreadyPresent(dir.join("T-1201N-2.vmu")));
    }

    #[test]
    fn test_failures_do_not_stop_batch() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        let saves = vec![
            save(src.path(), "a/1.vmu", b"bad", Some("T-1201N")),
            save(src.path(), "a/2.vmu", b"good", Some("T-1201N")),
            save(src.path(), "u/1.vmu", b"???", None),
        ];
        let refs: Vec<&SaveFile> = saves.iter().collect();
        let report = convert_batch(&refs, out.path(), &FailOn(b"bad"), &AtomicBool::new(false), &SilentReporter);

        assert_eq!(report.failed(), 1);
        assert_eq!(report.converted(), 1);
        assert_eq!(report.unmatched(), 1);
        assert_eq!(report.failures().next().unwrap().1, "corrupt save");
        assert!(game_dir(out.path(), "T-1201N").join("T-1201N-1.vmu").exists());
    }

    #[test]
    fn test_cancelled_batch_is_partial() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        let saves = vec![save(src.path(), "a/1.vmu", b"one", Some("T-1201N"))];
        let refs: Vec<&SaveFile> = saves.iter().collect();
        let report = convert_batch(&refs, out.path(), &Passthrough, &AtomicBool::new(true), &SilentReporter);
        assert!(report.cancelled);
        assert!(report.files.is_empty());
    }

    #[test]
    fn test_selection() {
        let src = tempdir().unwrap();
        let saves = vec![
            save(src.path(), "card/a/1.vmu", b"1", Some("T-1201N")),
            save(src.path(), "card/b/1.vmu", b"2", Some("MK-51000")),
            save(src.path(), "card/c/1.vmu", b"3", None),
        ];
        assert_eq!(Selection::All.apply(&saves).len(), 3);
        let games = Selection::Games(vec!["t1201n".to_string()]).apply(&saves);
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].game_id(), Some("T-1201N"));
        let sigs = Selection::Signatures(vec!["card/c/".to_string()]).apply(&saves);
        assert_eq!(sigs.len(), 1);
        assert!(sigs[0].status.is_unmatched());
    }

    #[test]
    fn test_game_dir_name() {
        assert_eq!(game_dir_name("T-1201N"), "T-1201N");
        assert_eq!(game_dir_name("A/B:C"), "A_B_C");
    }
}
