use super::csv_source;
use crate::error::Error;
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("vmupro-converter/", env!("CARGO_PKG_VERSION"));

/// Download the CSV game database and decode it to text.
pub fn download_csv(url: &str, timeout: Duration) -> Result<String, Error> {
    info!("Downloading game database from {}", url);
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()?;

    let response = client
        .get(url)
        .header("User-Agent", USER_AGENT)
        .header("Accept", "text/plain, text/csv, */*")
        .send()?;

    if !response.status().is_success() {
        return Err(Error::DatabaseUnavailable(format!(
            "HTTP {} from {}",
            response.status(),
            url
        )));
    }

    let raw = response.bytes()?;
    let (text, encoding) = csv_source::decode_text(&raw);
    debug!("Downloaded {} bytes, decoded as {}", raw.len(), encoding);
    Ok(text)
}
