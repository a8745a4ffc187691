// ⚙️ Configuration
//
// Every key has a default, so an empty file (or no file) is a valid config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Path to a TOML config file
pub const CONFIG_ENV: &str = "RECEIPT_RECON_CONFIG";

/// Overrides `database_path`
pub const DATABASE_ENV: &str = "RECEIPT_RECON_DB";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file holding accepted transactions, counters and events
    pub database_path: PathBuf,

    /// CSV export of trusted transactions (`reference_id,amount,receiver_bank`)
    pub catalog_path: PathBuf,

    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,

    pub ocr: OcrConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: PathBuf::from("receipts.db"),
            catalog_path: PathBuf::from("catalog.csv"),
            log_level: "info".to_string(),
            ocr: OcrConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Mean luminance (0-255) below which the image is inverted
    pub dark_background_threshold: u8,

    pub timeout_base_ms: u64,

    /// Extra budget per started megabyte of image
    pub timeout_per_megabyte_ms: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        OcrConfig {
            dark_background_threshold: 100,
            timeout_base_ms: 5_000,
            timeout_per_megabyte_ms: 2_000,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config: {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Config from `RECEIPT_RECON_CONFIG` if set, else defaults; then
    /// environment overrides.
    pub fn discover() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup (injectable for tests)
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(db) = lookup(DATABASE_ENV).filter(|v| !v.is_empty()) {
            self.database_path = PathBuf::from(db);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_is_all_defaults() {
        let config = Config::from_toml("").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.ocr.dark_background_threshold, 100);
        assert_eq!(config.database_path, PathBuf::from("receipts.db"));
    }

    #[test]
    fn test_partial_overrides() {
        let config = Config::from_toml(
            r#"
            catalog_path = "/data/trusted.csv"

            [ocr]
            dark_background_threshold = 80
            "#,
        )
        .unwrap();

        assert_eq!(config.catalog_path, PathBuf::from("/data/trusted.csv"));
        assert_eq!(config.ocr.dark_background_threshold, 80);
        assert_eq!(config.ocr.timeout_base_ms, 5_000);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(Config::from_toml("[ocr]\ndark_background_threshold = 300").is_err());
        assert!(Config::from_toml("log_level = 3").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database_path = \"/tmp/agents.db\"").unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/agents.db"));
    }

    #[test]
    fn test_env_override() {
        let mut config = Config::default();

        config.apply_env_overrides(|key| {
            (key == DATABASE_ENV).then(|| "/srv/recon.db".to_string())
        });
        assert_eq!(config.database_path, PathBuf::from("/srv/recon.db"));

        config.apply_env_overrides(|_| Some(String::new()));
        assert_eq!(config.database_path, PathBuf::from("/srv/recon.db"));
    }
}
