//! Update check: manifest negotiation through to a staged artifact.
//!
//! Fetches `{url}latest`, verifies the server pin, compares versions, gates
//! on free space, and streams `{url}{filename}` to the staging path with
//! on-the-fly hashing.

use super::Updater;
use super::state::{CheckFailure, CheckOptions, CheckOutcome, UpdatePhase};
use crate::download::{StageOutcome, stage_artifact};
use crate::error::Result;
use crate::integrity::{PinVerdict, verify_pin};
use crate::manifest::{MAX_MANIFEST_BYTES, Manifest};
use crate::space::has_free_space;
use crate::version::{is_newer, read_local_version};
use tracing::{debug, error, info, warn};

/// Manifest resource name under the server base URL.
pub const MANIFEST_RESOURCE: &str = "latest";

impl Updater {
    /// Check for a newer build and stage it if one is available.
    ///
    /// Verification, space, and version-record failures come back as
    /// [`CheckOutcome::Failed`]; only transport faults, an unparseable
    /// manifest, and local I/O errors are returned as `Err`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached, the manifest is
    /// malformed, or the staging file cannot be written.
    pub fn check(&mut self, options: &CheckOptions) -> Result<CheckOutcome> {
        self.phase = UpdatePhase::Checking;
        let result = self.run_check(options);
        self.phase = match &result {
            Ok(CheckOutcome::NoUpdate) => UpdatePhase::NoUpdate,
            Ok(CheckOutcome::Staged { .. }) => UpdatePhase::Staged,
            Ok(CheckOutcome::Failed(_)) | Err(_) => UpdatePhase::CheckFailed,
        };
        result
    }

    /// Boolean form of [`Updater::check`]: `true` iff an artifact is staged
    /// and ready to install.
    ///
    /// # Errors
    ///
    /// See [`Updater::check`].
    pub fn check_for_update(
        &mut self,
        version_check: bool,
        quiet: bool,
        pinned_key_hash: &[u8],
    ) -> Result<bool> {
        let options = CheckOptions {
            version_check,
            quiet,
            pinned_key_hash: pinned_key_hash.to_vec(),
        };
        Ok(self.check(&options)?.is_staged())
    }

    fn run_check(&self, options: &CheckOptions) -> Result<CheckOutcome> {
        let quiet = options.quiet;
        let Some(config) = self.load_config() else {
            return Ok(CheckOutcome::Failed(CheckFailure::ConfigurationUnavailable));
        };
        let base_url = config.normalized_url();

        let mut response = self.transport.get(&format!("{base_url}{MANIFEST_RESOURCE}"))?;
        let verdict = verify_pin(
            self.pinning.as_ref(),
            response.peer_certificate(),
            &options.pinned_key_hash,
        );
        if verdict == PinVerdict::Mismatch {
            warn!(
                "certificate pinning failed, the hash of server public key does not match. \
                 Aborting the update."
            );
            return Ok(CheckOutcome::Failed(CheckFailure::IdentityMismatch));
        }

        let manifest = Manifest::parse(&response.read_text(MAX_MANIFEST_BYTES)?)?;
        drop(response);

        let local_version = read_local_version(&self.root)?;
        if local_version.is_none() {
            if options.version_check {
                if !quiet {
                    warn!("local version information missing, cannot proceed");
                }
                return Ok(CheckOutcome::Failed(CheckFailure::MissingLocalVersion));
            }
            if !quiet {
                warn!("local version information missing, ignoring it");
            }
        }

        let eligible = !options.version_check
            || local_version
                .as_deref()
                .is_some_and(|local| is_newer(&manifest.version, local));
        if !eligible {
            if !quiet {
                debug!(
                    remote = %manifest.version,
                    local = local_version.as_deref().unwrap_or_default(),
                    "no newer version available"
                );
            }
            return Ok(CheckOutcome::NoUpdate);
        }

        if !quiet {
            info!("new version {} is available", manifest.version);
        }

        let stats = self.space.stats(&self.root)?;
        if !has_free_space(&manifest.min_free_space, stats) {
            if !quiet {
                error!(
                    required = %manifest.min_free_space,
                    free_kb = stats.free_kb(),
                    "not enough free space for the new firmware"
                );
            }
            return Ok(CheckOutcome::Failed(CheckFailure::InsufficientSpace));
        }

        let expected_hash = manifest.expected_hash();
        if expected_hash.is_none() && !quiet {
            warn!("manifest publishes no content hash, firmware will not be verified");
        }

        let artifact = config.artifact_path(&self.root);
        let mut download = self.transport.get(&format!("{base_url}{}", manifest.filename))?;
        match stage_artifact(download.body_mut(), &artifact, expected_hash)? {
            StageOutcome::Staged { bytes, .. } => {
                if !quiet {
                    info!(path = %artifact.display(), bytes, "firmware {} staged", manifest.version);
                }
                Ok(CheckOutcome::Staged {
                    version: manifest.version,
                    artifact,
                    bytes,
                })
            }
            StageOutcome::HashMismatch { expected, actual } => {
                if !quiet {
                    error!(
                        %expected,
                        %actual,
                        "hashes don't match, cannot install the new firmware"
                    );
                }
                Ok(CheckOutcome::Failed(CheckFailure::IntegrityMismatch))
            }
        }
    }
}
