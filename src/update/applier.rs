//! Installation of a staged artifact and post-install cleanup.

use super::Updater;
use super::state::{InstallOutcome, UpdatePhase};
use crate::cleanup::recursive_delete;
use crate::config::OtaConfig;
use crate::error::Result;
use crate::install::{InstallReport, install_archive};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

impl Updater {
    /// Install the staged artifact, if any, then remove obsolete paths.
    ///
    /// The artifact is removed after extraction whether it succeeded or not.
    /// The configuration is reloaded before cleanup so that a `delete` list
    /// shipped inside the new build takes effect in the same run.
    ///
    /// # Errors
    ///
    /// Extraction and cleanup errors propagate. The filesystem may then hold
    /// a mix of old and new files; no rollback is attempted.
    pub fn install(&mut self, quiet: bool) -> Result<InstallOutcome> {
        let Some(config) = self.load_config() else {
            return Ok(InstallOutcome::ConfigurationUnavailable);
        };

        let artifact = config.artifact_path(&self.root);
        match std::fs::symlink_metadata(&artifact) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("no new firmware file found in flash");
                return Ok(InstallOutcome::NothingStaged);
            }
            Err(e) => return Err(e.into()),
        }

        self.phase = UpdatePhase::Installing;
        let result = self.apply(&config, &artifact, quiet);
        self.phase = if result.is_ok() {
            UpdatePhase::Installed
        } else {
            UpdatePhase::InstallFailed
        };
        result.map(InstallOutcome::Installed)
    }

    /// Unit form of [`Updater::install`].
    ///
    /// # Errors
    ///
    /// See [`Updater::install`].
    pub fn install_staged_update(&mut self, quiet: bool) -> Result<()> {
        self.install(quiet).map(|_| ())
    }

    fn apply(&self, config: &OtaConfig, artifact: &Path, quiet: bool) -> Result<InstallReport> {
        let extracted = install_archive(artifact, &self.root, &config.excluded_files, quiet);
        let removed = std::fs::remove_file(artifact);
        let report = extracted?;
        removed?;

        if !quiet {
            info!(
                files = report.files_written,
                bytes = report.bytes_written,
                "new firmware extracted"
            );
        }

        match self.config.load() {
            Ok(fresh) => {
                for path in &fresh.delete {
                    let Some(target) = self.obsolete_path(path) else {
                        warn!(path = %path, "refusing to delete a path outside the device root");
                        continue;
                    };
                    if !quiet {
                        debug!(path = %target.display(), "removing obsolete path");
                    }
                    recursive_delete(&target)?;
                }
            }
            Err(e) => warn!("cannot reload uota config ({e}), skipping cleanup"),
        }

        Ok(report)
    }

    /// Resolve an obsolete-path entry under the device root.
    ///
    /// Empty entries map to an empty path (a no-op for cleanup). Entries that
    /// name the root itself or climb out of it with `..` yield `None`.
    fn obsolete_path(&self, entry: &str) -> Option<PathBuf> {
        if entry.is_empty() {
            return Some(PathBuf::new());
        }
        let mut path = self.root.clone();
        let mut depth = 0usize;
        for component in Path::new(entry.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => {
                    path.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        (depth > 0).then_some(path)
    }
}
