use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_DATABASE_URL: &str =
    "https://raw.githubusercontent.com/K3zter/vmu-save-splitter/main/game-db.csv";

pub const CATALOG_PIPE_FILE: &str = "vmupro_gamedb.txt";
pub const CATALOG_JSON_FILE: &str = "vmupro_gamedb.json";
pub const CATALOG_LEGACY_FILE: &str = "redump_dreamcast.json";
pub const STORE_FILE: &str = "vmupro.db";
pub const LEGACY_MAPPINGS_FILE: &str = "manual_mappings.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source_dir: Option<String>,
    pub output_dir: Option<String>,
    /// Directory holding the cached game database and the reconciliation store.
    pub data_dir: String,
    pub database_url: String,
    pub save_extensions: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub download_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_dir: None,
            output_dir: None,
            data_dir: ".".to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            save_extensions: vec!["vmu".to_string()],
            ignore_patterns: Vec::new(),
            download_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    pub fn data_path(&self, file_name: &str) -> PathBuf {
        PathBuf::from(&self.data_dir).join(file_name)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_path(STORE_FILE)
    }
}

/// Load `Config.toml` (optional) and then `VMUPRO_*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("VMUPRO")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("save_extensions")
                .with_list_parse_key("ignore_patterns"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.save_extensions, vec!["vmu".to_string()]);
        assert_eq!(config.download_timeout_secs, 30);
        assert!(config.source_dir.is_none());
        assert_eq!(config.store_path(), PathBuf::from(".").join("vmupro.db"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: AppConfig = Config::builder()
            .add_source(config::File::from_str(
                "source_dir = \"/saves/vm2\"\ndata_dir = \"/var/lib/vmupro\"",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.source_dir.as_deref(), Some("/saves/vm2"));
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(
            config.data_path(CATALOG_JSON_FILE),
            PathBuf::from("/var/lib/vmupro/vmupro_gamedb.json")
        );
    }
}
