//! Layered configuration: defaults, then `proposals.toml`, then `PROPOSALS__*`
//! environment variables (`PROPOSALS__STORAGE__PATH=/var/lib/proposals`).
use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StorageConfig {
    /// Directory of the sled database
    pub path: PathBuf,
    /// Discard the database when it is dropped
    pub temporary: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                path: PathBuf::from("proposals.db"),
                temporary: false,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_from("proposals")
    }

    /// `file` is a path without extension; a missing file is not an error.
    pub fn load_from(file: &str) -> Result<Self> {
        let defaults = AppConfig::default();

        let config = Config::builder()
            .set_default("storage.path", defaults.storage.path.to_string_lossy().to_string())?
            .set_default("storage.temporary", defaults.storage.temporary)?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.json", defaults.logging.json)?
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix("PROPOSALS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

impl StorageConfig {
    pub fn open(&self) -> Result<Arc<sled::Db>> {
        let db = sled::Config::new()
            .path(&self.path)
            .temporary(self.temporary)
            .open()?;
        Ok(Arc::new(db))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("absent");
        let loaded = AppConfig::load_from(file.to_str().unwrap()).unwrap();

        assert_eq!(loaded.logging, AppConfig::default().logging);
        assert!(!loaded.storage.temporary);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("proposals.toml");
        std::fs::write(
            &file,
            "[storage]\npath = \"/tmp/bv.db\"\ntemporary = true\n\n[logging]\njson = true\n",
        )
        .unwrap();

        let stem = dir.path().join("proposals");
        let loaded = AppConfig::load_from(stem.to_str().unwrap()).unwrap();

        assert_eq!(loaded.storage.path, PathBuf::from("/tmp/bv.db"));
        assert!(loaded.storage.temporary);
        assert!(loaded.logging.json);
        assert_eq!(loaded.logging.level, "info");
    }

    #[test]
    fn temporary_storage_opens() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageConfig {
            path: dir.path().join("db"),
            temporary: true,
        };
        let db = storage.open().unwrap();
        db.insert("k", "v").unwrap();
        assert!(db.get("k").unwrap().is_some());
    }
}
