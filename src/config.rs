//! OTA configuration record and its loader.
//!
//! The record lives in `uota.toml` at the device root and is re-read on every
//! public operation, so a build that ships a new `uota.toml` is honored by the
//! post-install cleanup of the same run.

use crate::error::{Result, UpdateError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// File name of the configuration record, relative to the device root.
pub const CONFIG_FILE_NAME: &str = "uota.toml";

/// Configuration consumed by the update controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtaConfig {
    /// Base URL of the update server. See [`OtaConfig::normalized_url`].
    pub url: String,
    /// Where the downloaded artifact is staged. Relative paths resolve
    /// against the device root.
    pub tmp_filename: PathBuf,
    /// Archive entry names that are never written to the filesystem.
    /// Directory entries carry their trailing `/`.
    #[serde(default)]
    pub excluded_files: BTreeSet<String>,
    /// Paths removed after a successful extraction, in order.
    #[serde(default)]
    pub delete: Vec<String>,
}

impl OtaConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            UpdateError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| UpdateError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| UpdateError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Base URL with exactly one trailing `/` appended when absent.
    pub fn normalized_url(&self) -> String {
        if self.url.ends_with('/') {
            self.url.clone()
        } else {
            format!("{}/", self.url)
        }
    }

    /// Staged artifact path resolved against `root`.
    pub fn artifact_path(&self, root: &Path) -> PathBuf {
        root.join(&self.tmp_filename)
    }
}

/// Loader capability for [`OtaConfig`].
///
/// Called once per public operation (twice for install). Implementations must
/// not cache: the install path relies on seeing a freshly extracted record.
pub trait ConfigSource {
    /// Load the current configuration.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Config`] when the record is missing or malformed.
    fn load(&self) -> Result<OtaConfig>;
}

impl<F> ConfigSource for F
where
    F: Fn() -> Result<OtaConfig>,
{
    fn load(&self) -> Result<OtaConfig> {
        self()
    }
}

/// Reads [`OtaConfig`] from a TOML file on every call.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Source for `uota.toml` under the given device root.
    pub fn in_root(root: &Path) -> Self {
        Self::new(root.join(CONFIG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> Result<OtaConfig> {
        OtaConfig::from_file(&self.path)
    }
}
