use super::GameRecord;
use crate::error::Error;
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use tracing::{debug, trace};

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "GameID", default)]
    game_id: String,
    #[serde(rename = "Title", default)]
    title: String,
    #[serde(rename = "Region", default)]
    region: String,
    #[serde(rename = "Version", default)]
    version: String,
    #[serde(rename = "Languages", default)]
    languages: String,
}

/// Decode a downloaded body. UTF-8 (BOM stripped) first, Latin-1 otherwise.
/// Returns the text and the name of the encoding that was used.
pub fn decode_text(raw: &[u8]) -> (String, &'static str) {
    let body = raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(raw);
    match std::str::from_utf8(body) {
        Ok(text) => (text.to_string(), "utf-8"),
        // Latin-1 maps every byte to the code point of the same value.
        Err(_) => (body.iter().map(|&b| b as char).collect(), "latin-1"),
    }
}

/// Parse the `;`-delimited game database.
///
/// An optional leading `sep=;` line is skipped. Ids lose their trailing `~`
/// padding and rows without an id or title are dropped.
pub fn parse_csv(content: &str) -> Result<Vec<GameRecord>, Error> {
    let content = content.trim_start_matches('\u{feff}');
    let body = match content.lines().next() {
        Some(first) if first.trim_start().starts_with("sep=") => {
            &content[content.find('\n').map(|i| i + 1).unwrap_or(content.len())..]
        }
        _ => content,
    };

    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .trim(Trim::All)
        .from_reader(body.as_bytes());

    let mut records = Vec::new();
    for row in reader.deserialize::<CsvRow>() {
        let row = row?;
        let id = row.game_id.trim_end_matches('~').trim();
        if id.is_empty() || row.title.is_empty() {
            trace!("Skipping row without id or title: {:?}", row);
            continue;
        }
        records.push(GameRecord {
            id: id.to_string(),
            title: row.title,
            region: row.region,
            version: non_empty(row.version),
            languages: non_empty(row.languages),
            gid: None,
        });
    }

    debug!("Parsed {} CSV rows with id and title", records.len());
    Ok(records)
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
