//! Configuration service implementation.
//!
//! Loads [`LoveleeConfig`] from `config.toml` and caches it to avoid repeated
//! file I/O. A missing file yields the defaults.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use lovelee_core::config::LoveleeConfig;
use lovelee_core::error::Result;

use crate::paths::LoveleePaths;
use crate::storage::{AtomicFile, FileFormat};

/// Configuration service that loads and caches the root configuration.
#[derive(Clone)]
pub struct ConfigService {
    file: Arc<AtomicFile<LoveleeConfig>>,
    /// Cached configuration, filled on first access.
    config: Arc<RwLock<Option<LoveleeConfig>>>,
}

impl ConfigService {
    /// Creates a service reading `path`.
    pub fn new(path: PathBuf) -> Self {
        Self {
            file: Arc::new(AtomicFile::new(path, FileFormat::Toml)),
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Creates a service reading the config file under `paths`.
    pub fn from_paths(paths: &LoveleePaths) -> Self {
        Self::new(paths.config_file())
    }

    pub fn path(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    /// Gets the configuration, loading from file if not cached.
    ///
    /// A file that fails to parse is reported, not silently replaced.
    pub fn get_config(&self) -> Result<LoveleeConfig> {
        {
            let cached = self.config.read().unwrap_or_else(|e| e.into_inner());
            if let Some(config) = cached.as_ref() {
                return Ok(config.clone());
            }
        }

        let loaded = match self.file.load()? {
            Some(config) => config,
            None => {
                tracing::debug!(path = ?self.file.path(), "No config file, using defaults");
                LoveleeConfig::default()
            }
        };

        *self.config.write().unwrap_or_else(|e| e.into_inner()) = Some(loaded.clone());
        Ok(loaded)
    }

    /// Writes `config` to disk and refreshes the cache.
    pub fn save(&self, config: &LoveleeConfig) -> Result<()> {
        self.file.save(config)?;
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = Some(config.clone());
        tracing::info!(path = ?self.file.path(), "Saved configuration");
        Ok(())
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::new(temp_dir.path().join("config.toml"));
        assert_eq!(service.get_config().unwrap(), LoveleeConfig::default());
    }

    #[test]
    fn test_cache_until_invalidated() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[economy]\nstarting_hearts = 40\n").unwrap();

        let service = ConfigService::new(path.clone());
        assert_eq!(service.get_config().unwrap().economy.starting_hearts, 40);

        fs::write(&path, "[economy]\nstarting_hearts = 70\n").unwrap();
        assert_eq!(service.get_config().unwrap().economy.starting_hearts, 40);

        service.invalidate_cache();
        assert_eq!(service.get_config().unwrap().economy.starting_hearts, 70);
    }

    #[test]
    fn test_save_round_trips_through_disk() {
        let temp_dir = TempDir::new().unwrap();
        let paths = LoveleePaths::new(Some(temp_dir.path())).unwrap();
        let service = ConfigService::from_paths(&paths);

        let mut config = LoveleeConfig::default();
        config.invites.code_length = 8;
        service.save(&config).unwrap();

        let fresh = ConfigService::from_paths(&paths);
        assert_eq!(fresh.get_config().unwrap().invites.code_length, 8);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[economy\n").unwrap();
        let err = ConfigService::new(path).get_config().unwrap_err();
        assert_eq!(err.code(), "Serialization");
    }
}
