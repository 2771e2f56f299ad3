//! Update controller states and operation outcomes.

use crate::install::InstallReport;
use std::fmt;
use std::path::PathBuf;

/// Where the controller stands.
///
/// Check and install are separate operations: `Idle → Checking → {NoUpdate,
/// Staged, CheckFailed}`, and independently `Installing → {Installed,
/// InstallFailed}`. A caller may check now and install after a safe reboot
/// window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdatePhase {
    #[default]
    Idle,
    Checking,
    NoUpdate,
    /// An artifact is downloaded, verified, and waiting for install.
    Staged,
    CheckFailed,
    Installing,
    Installed,
    InstallFailed,
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Checking => write!(f, "checking"),
            Self::NoUpdate => write!(f, "no_update"),
            Self::Staged => write!(f, "staged"),
            Self::CheckFailed => write!(f, "check_failed"),
            Self::Installing => write!(f, "installing"),
            Self::Installed => write!(f, "installed"),
            Self::InstallFailed => write!(f, "install_failed"),
        }
    }
}

/// Caller-controlled policy for one update check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOptions {
    /// Only update when the remote version is newer than the local one. When
    /// set, a missing local version fails the check; when clear, it means
    /// "always update".
    pub version_check: bool,
    /// Suppress progress and diagnostic logging.
    pub quiet: bool,
    /// Expected server public-key hash. Empty disables pinning.
    pub pinned_key_hash: Vec<u8>,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            version_check: true,
            quiet: false,
            pinned_key_hash: Vec::new(),
        }
    }
}

/// Why a check ended without staging an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckFailure {
    ConfigurationUnavailable,
    /// Server certificate did not match the pin. Nothing was downloaded.
    IdentityMismatch,
    /// No local version record while version checking is enforced.
    MissingLocalVersion,
    /// Not enough free space for the build. Nothing was downloaded.
    InsufficientSpace,
    /// Artifact hash differs from the manifest. The artifact was removed.
    IntegrityMismatch,
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigurationUnavailable => write!(f, "configuration unavailable"),
            Self::IdentityMismatch => write!(f, "server identity mismatch"),
            Self::MissingLocalVersion => write!(f, "local version missing"),
            Self::InsufficientSpace => write!(f, "insufficient free space"),
            Self::IntegrityMismatch => write!(f, "artifact hash mismatch"),
        }
    }
}

/// Result of an update check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Server has nothing newer than the installed build.
    NoUpdate,
    /// New build downloaded and verified.
    Staged {
        version: String,
        artifact: PathBuf,
        bytes: u64,
    },
    Failed(CheckFailure),
}

impl CheckOutcome {
    pub fn is_staged(&self) -> bool {
        matches!(self, Self::Staged { .. })
    }
}

/// Result of an install request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    ConfigurationUnavailable,
    /// No artifact at the staging path. Not an error.
    NothingStaged,
    Installed(InstallReport),
}
