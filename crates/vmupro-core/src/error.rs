use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Download error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Game database unavailable: {0}")]
    DatabaseUnavailable(String),

    #[error("Unknown game id: {0}")]
    UnknownGame(String),

    #[error("{0}")]
    Other(String),
}
