//! Error types for the OTA updater.

/// Top-level error type for update checks and installs.
///
/// Verification, space, and missing-version failures are not errors: the
/// controller recovers them into [`crate::update::CheckFailure`]. What
/// surfaces here is either a collaborator fault (network, filesystem) or
/// input the updater cannot make sense of.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// Configuration record missing or malformed.
    #[error("config error: {0}")]
    Config(String),

    /// Transport failure while fetching the manifest or artifact.
    #[error("network error: {0}")]
    Network(String),

    /// Manifest body could not be parsed.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Certificate pin could not be computed from the server certificate.
    #[error("pinning error: {0}")]
    Pinning(String),

    /// Archive entry cannot be installed (unsafe path, corrupt stream).
    #[error("archive error: {0}")]
    Archive(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, UpdateError>;
