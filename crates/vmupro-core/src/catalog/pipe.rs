use super::{GameCatalog, GameRecord};
use std::collections::BTreeMap;
use tracing::debug;

/// Parse the pipe-delimited database (`|Region|Title|GameID|...|`) into a catalog.
pub fn parse_catalog(content: &str, source: &str) -> GameCatalog {
    let (records, gid_links) = parse_pipe_delimited(content);
    GameCatalog::from_records(records, source).with_gid_aliases(gid_links)
}

/// Parse the pipe-delimited database, returning records in file order and the
/// `GID###` -> traditional id links.
///
/// Blank lines and `#` comments are skipped. Every traditional entry links each
/// GID seen earlier in the file with the same title, so a GID ends up linked to
/// the last such entry. A GID listed after its traditional entries stays unlinked.
pub fn parse_pipe_delimited(content: &str) -> (Vec<GameRecord>, BTreeMap<String, String>) {
    let mut records: Vec<GameRecord> = Vec::new();
    // (gid, title) in order of first appearance
    let mut gids_seen: Vec<(String, String)> = Vec::new();
    let mut gid_links: BTreeMap<String, String> = BTreeMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() < 4 {
            continue;
        }

        let region = parts[1].trim();
        let title = parts[2].trim();
        let game_id = parts[3].trim();
        if game_id.is_empty() || title.is_empty() {
            continue;
        }

        let mut record = GameRecord::new(game_id, title, region);
        if game_id.starts_with("GID") {
            if !gids_seen.iter().any(|(gid, _)| gid == game_id) {
                gids_seen.push((game_id.to_string(), title.to_string()));
            }
        } else {
            for (gid, gid_title) in &gids_seen {
                if gid_title == title {
                    gid_links.insert(gid.clone(), game_id.to_string());
                    record.gid = Some(gid.clone());
                }
            }
        }
        records.push(record);
    }

    debug!(
        "Parsed {} pipe-delimited entries, {} GID links",
        records.len(),
        gid_links.len()
    );
    (records, gid_links)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# Dreamcast database\n\
        |USA|Power Stone|T-1201N||\n\
        |JPN|VMU Games|GID028||\n\
        \n\
        |JPN|VMU Games|HDR-0178||\n\
        |JPN|VMU Games|HDR-0179||\n\
        |bad line|\n\
        |USA||T-9999N||\n";

    #[test]
    fn test_parse_skips_comments_and_short_lines() {
        let (records, _) = parse_pipe_delimited(SAMPLE);
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["T-1201N", "GID028", "HDR-0178", "HDR-0179"]);
    }

    #[test]
    fn test_gid_links_last_following_traditional_id() {
        let catalog = parse_catalog(SAMPLE, "pipe");
        assert_eq!(catalog.resolve_gid("GID028"), Some("HDR-0179"));
        assert_eq!(catalog.get("HDR-0178").unwrap().gid.as_deref(), Some("GID028"));
        assert_eq!(catalog.get("HDR-0179").unwrap().gid.as_deref(), Some("GID028"));
        assert_eq!(catalog.gid_alias_count(), 1);
        assert!(catalog.contains("GID028"));
    }

    #[test]
    fn test_gid_after_traditional_entries_is_unlinked() {
        let content = "|JPN|Net Games|HDR-0200||\n|JPN|Net Games|GID100||\n";
        let catalog = parse_catalog(content, "pipe");
        assert_eq!(catalog.resolve_gid("GID100"), None);
        assert_eq!(catalog.get("HDR-0200").unwrap().gid, None);
    }

    #[test]
    fn test_one_entry_links_every_earlier_gid() {
        let content = "|JPN|Chu Chu Rocket|GID001||\n\
            |JPN|Chu Chu Rocket|GID002||\n\
            |JPN|Chu Chu Rocket|HDR-0039||\n";
        let (_, links) = parse_pipe_delimited(content);
        assert_eq!(links.get("GID001").map(String::as_str), Some("HDR-0039"));
        assert_eq!(links.get("GID002").map(String::as_str), Some("HDR-0039"));
    }
}
