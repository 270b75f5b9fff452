//! Unified path management for Lovelee files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/lovelee/           # Config directory
//! └── config.toml              # Application configuration
//!
//! ~/.local/share/lovelee/      # Data directory
//! └── store.json               # Document store snapshot
//! ```
//!
//! A base directory override puts both files directly under that directory,
//! which is what tests and embedded deployments use.

use std::path::{Path, PathBuf};

use lovelee_core::error::{LoveleeError, Result};

const APP_DIR: &str = "lovelee";

/// Resolves where Lovelee keeps its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoveleePaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl LoveleePaths {
    /// Platform directories, or everything under `base` when given.
    pub fn new(base: Option<&Path>) -> Result<Self> {
        if let Some(base) = base {
            return Ok(Self {
                config_dir: base.to_path_buf(),
                data_dir: base.to_path_buf(),
            });
        }

        let config_dir = dirs::config_dir()
            .ok_or_else(|| LoveleeError::config("Cannot find config directory"))?
            .join(APP_DIR);
        let data_dir = dirs::data_dir()
            .ok_or_else(|| LoveleeError::config("Cannot find data directory"))?
            .join(APP_DIR);

        Ok(Self {
            config_dir,
            data_dir,
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path to `config.toml`.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Default path of the document store snapshot.
    pub fn snapshot_file(&self) -> PathBuf {
        self.data_dir.join("store.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_override() {
        let paths = LoveleePaths::new(Some(Path::new("/tmp/lovelee-test"))).unwrap();
        assert_eq!(
            paths.config_file(),
            PathBuf::from("/tmp/lovelee-test/config.toml")
        );
        assert_eq!(
            paths.snapshot_file(),
            PathBuf::from("/tmp/lovelee-test/store.json")
        );
    }
}
