//! Dreamcast serial extraction and fuzzy resolution against the catalog.
//!
//! Serials show up in folder and file names with their hyphens dropped or
//! moved (`T1201N`, `MK511905`). Resolution tries the exact id first, then a
//! separator-insensitive comparison, then re-inserting hyphens in the
//! positions the common serial families use.

use crate::catalog::{strip_separators, GameCatalog};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::path::Path;
use tracing::trace;

lazy_static! {
    /// Candidate patterns, in the order their hits are tried.
    static ref CANDIDATE_PATTERNS: Vec<Regex> = [
        r"[A-Z]{1,3}-\d{4,6}(?:-[A-Z0-9]{1,2})?",
        r"[A-Z]{1,3}\d{4,7}[A-Z]?",
        r"\d{3}-\d{4}",
        r"\d{7}",
        r"GID\d{3}",
        r"[A-Z]{3,10}",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("candidate pattern"))
    .collect();

    /// Hyphen placements for separator-free serials, `{n}` being capture group n+1.
    static ref HYPHEN_PATTERNS: Vec<(Regex, &'static [&'static str])> = {
        const JOINED: &[&str] = &["{0}-{1}{2}"];
        const PREFIX: &[&str] = &["{0}-{1}"];
        const EITHER: &[&str] = &["{0}-{1}-{2}", "{0}-{1}{2}"];
        const CATCH_ALL: &[&str] = &["{0}-{1}{2}", "{0}-{1}-{2}"];
        [
            (r"^([A-Z])(\d{4})([A-Z])$", JOINED),
            (r"^([A-Z])(\d{4})(\d)$", EITHER),
            (r"^([A-Z])(\d{5})([A-Z])$", EITHER),
            (r"^([A-Z]{2,3})(\d{4})$", PREFIX),
            (r"^([A-Z]{2,3})(\d{4})(\d{1,2})$", EITHER),
            (r"^([A-Z]{2})(\d{5})(\d)$", EITHER),
            (r"^([A-Z]{2})(\d{5})(\d{2})$", EITHER),
            (r"^([A-Z]{2})(\d{4})(\d{2})$", EITHER),
            (r"^(\d{3})(\d{4})$", PREFIX),
            (r"^([A-Z]{1,2})(\d{5,6})([A-Z]?)$", EITHER),
            (r"^([A-Z]{3})(\d{5})$", PREFIX),
            (r"^([A-Z]+)(\d+)([A-Z]*)$", CATCH_ALL),
        ]
        .into_iter()
        .map(|(p, templates)| (Regex::new(p).expect("hyphen pattern"), templates))
        .collect()
    };

    /// Serials as printed in metadata text (`T-1201N`, `MK-51190-50`).
    pub static ref METADATA_SERIAL: Regex =
        Regex::new(r"\b([A-Z]{1,3}-\d{4,5}(?:-\d{2})?)\b").expect("metadata serial pattern");
}

/// All serial-like substrings of `text`, pattern by pattern.
pub fn extract_candidates(text: &str) -> Vec<String> {
    let upper = text.to_uppercase();
    CANDIDATE_PATTERNS
        .iter()
        .flat_map(|re| re.find_iter(&upper).map(|m| m.as_str().to_string()))
        .collect()
}

/// Hyphenated spellings of a serial, in table order without repeats.
pub fn hyphen_variations(game_id: &str) -> Vec<String> {
    let clean = strip_separators(game_id);
    let mut variations: Vec<String> = Vec::new();

    for (re, templates) in HYPHEN_PATTERNS.iter() {
        let Some(caps) = re.captures(&clean) else {
            continue;
        };
        for template in templates.iter() {
            if let Some(variation) = fill_template(template, &caps) {
                let variation = variation.trim_end_matches('-').to_string();
                if !variation.is_empty() && !variations.contains(&variation) {
                    variations.push(variation);
                }
            }
        }
    }

    variations
}

fn fill_template(template: &str, caps: &Captures<'_>) -> Option<String> {
    let mut out = template.to_string();
    for i in 0..3 {
        let key = format!("{{{}}}", i);
        if out.contains(&key) {
            let group = caps.get(i + 1)?;
            out = out.replace(&key, group.as_str());
        }
    }
    Some(out)
}

/// Resolve one candidate string to a catalog id.
pub fn resolve_candidate(catalog: &GameCatalog, candidate: &str) -> Option<String> {
    let candidate = candidate.trim().to_uppercase();
    if candidate.is_empty() {
        return None;
    }

    if candidate.starts_with("GID") {
        if let Some(id) = catalog.resolve_gid(&candidate) {
            trace!("Mapped {} -> {}", candidate, id);
            return Some(id.to_string());
        }
    }

    if catalog.contains(&candidate) {
        return Some(candidate);
    }

    let stripped = strip_separators(&candidate);
    if stripped.starts_with("GID") {
        if let Some(id) = catalog.resolve_gid(&stripped) {
            trace!("Mapped {} -> {}", stripped, id);
            return Some(id.to_string());
        }
    }

    if let Some(id) = catalog.find_stripped(&stripped) {
        return Some(id.to_string());
    }

    hyphen_variations(&candidate)
        .into_iter()
        .find(|variation| catalog.contains(variation))
}

/// Find a catalog id in a path or name: pattern hits first, then whole
/// components from the last one back, each cut at its first `.`.
pub fn extract_game_id(catalog: &GameCatalog, text: &str) -> Option<String> {
    if let Some(id) = extract_candidates(text)
        .iter()
        .find_map(|candidate| resolve_candidate(catalog, candidate))
    {
        return Some(id);
    }

    let normalized = text.replace('\\', "/");
    normalized
        .split('/')
        .rev()
        .filter(|part| !part.is_empty())
        .find_map(|part| {
            let stem = part.split('.').next().unwrap_or(part).trim();
            resolve_candidate(catalog, stem)
        })
}

/// `extract_game_id` over a relative path.
pub fn extract_from_path(catalog: &GameCatalog, path: &Path) -> Option<String> {
    let text = path.to_string_lossy();
    if text.is_empty() {
        return None;
    }
    extract_game_id(catalog, &text)
}
