use super::serial::METADATA_SERIAL;
use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::{error, trace};

const TITLE_FILES: &[&str] = &["title.txt", "title", "game.txt", "gamename.txt"];

lazy_static! {
    static ref NOISE: Regex = Regex::new(r"[^\w\s\-:&!?']").expect("noise pattern");
}

/// Hints gathered from the text files that sit next to a save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderMetadata {
    pub serial_hints: Vec<String>,
    pub title_hints: Vec<String>,
}

impl FolderMetadata {
    pub fn is_empty(&self) -> bool {
        self.serial_hints.is_empty() && self.title_hints.is_empty()
    }
}

/// Read `folder` (not recursively) for title, txt and dat files.
pub fn analyze_folder(folder: &Path) -> FolderMetadata {
    let mut metadata = FolderMetadata::default();

    let mut entries: Vec<_> = match fs::read_dir(folder) {
        Ok(entries) => entries.flatten().map(|e| e.path()).collect(),
        Err(e) => {
            error!("Error analyzing folder metadata {}: {}", folder.display(), e);
            return metadata;
        }
    };
    entries.sort();

    for path in entries.iter().filter(|p| p.is_file()) {
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy().to_lowercase(),
            None => continue,
        };

        if TITLE_FILES.contains(&name.as_str()) {
            if let Some(content) = read_text_file(path) {
                metadata.title_hints.extend(
                    content
                        .lines()
                        .filter(|l| (3..150).contains(&l.trim().chars().count()))
                        .filter_map(clean_line),
                );
                metadata.serial_hints.extend(find_serials(&content));
            }
        } else if name.ends_with(".txt") {
            if let Some(content) = read_text_file(path) {
                metadata.serial_hints.extend(find_serials(&content));
                metadata.title_hints.extend(
                    content
                        .lines()
                        .take(5)
                        .filter(|l| {
                            let len = l.trim().chars().count();
                            len > 5 && len < 100
                        })
                        .filter_map(clean_line),
                );
            }
        } else if name.ends_with(".dat") {
            if let Some(content) = read_text_file(path) {
                metadata.serial_hints.extend(find_serials(&content));
            }
        }
    }

    trace!(
        "{}: {} serial hints, {} title hints",
        folder.display(),
        metadata.serial_hints.len(),
        metadata.title_hints.len()
    );
    metadata
}

fn find_serials(content: &str) -> Vec<String> {
    METADATA_SERIAL
        .find_iter(content)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn clean_line(line: &str) -> Option<String> {
    let cleaned = NOISE.replace_all(line.trim(), " ");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Decode a small text file whose encoding is unknown.
///
/// Byte-order marks decide first; NUL bytes mean UTF-16 (byte order taken
/// from where the NULs sit); otherwise UTF-8, then Latin-1. Control
/// characters other than whitespace are dropped. Returns `None` when nothing
/// alphanumeric is left.
pub fn read_text_file(path: &Path) -> Option<String> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) => {
            error!("Error reading {}: {}", path.display(), e);
            return None;
        }
    };
    decode_unknown(&raw)
}

/// Japanese multibyte encodings (Shift_JIS, CP932, EUC-JP) are not detected.
/// Such text decodes as Latin-1, so Japanese titles come out garbled while
/// ASCII serials embedded in the same file survive intact.
pub fn decode_unknown(raw: &[u8]) -> Option<String> {
    let text = if let Some(body) = raw.strip_prefix(b"\xFF\xFE") {
        decode_utf16(body, true)
    } else if let Some(body) = raw.strip_prefix(b"\xFE\xFF") {
        decode_utf16(body, false)
    } else if let Some(body) = raw.strip_prefix(b"\xEF\xBB\xBF") {
        String::from_utf8_lossy(body).into_owned()
    } else if raw.contains(&0) {
        let odd_nuls = raw.iter().skip(1).step_by(2).filter(|b| **b == 0).count();
        let even_nuls = raw.iter().step_by(2).filter(|b| **b == 0).count();
        decode_utf16(raw, odd_nuls >= even_nuls)
    } else {
        match std::str::from_utf8(raw) {
            Ok(text) => text.to_string(),
            Err(_) => raw.iter().map(|&b| b as char).collect(),
        }
    };

    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .filter(|c| *c != '\u{feff}')
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.chars().any(|c| c.is_alphanumeric()) {
        Some(cleaned.to_string())
    } else {
        None
    }
}

fn decode_utf16(raw: &[u8], little_endian: bool) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|pair| {
            if little_endian {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}
