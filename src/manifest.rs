//! Update manifest served at `{url}latest`.
//!
//! Wire format: `version;filename[;minFreeSpaceKb[;hash]];`. Fields are
//! positional, `;`-delimited, and unescaped.

use crate::error::{Result, UpdateError};
use std::fmt;

/// Upper bound on the manifest body read from the server.
pub const MAX_MANIFEST_BYTES: u64 = 4096;

/// Free space a build needs before it may be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpaceRequirement {
    /// Kilobytes of free space required.
    Kb(u64),
    /// Value the server sent that is not an integer.
    Invalid(String),
}

impl Default for SpaceRequirement {
    fn default() -> Self {
        Self::Kb(0)
    }
}

impl SpaceRequirement {
    /// A negative value is satisfied by any filesystem and maps to `Kb(0)`.
    fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(kb) => Self::Kb(u64::try_from(kb).unwrap_or(0)),
            Err(_) => Self::Invalid(raw.to_owned()),
        }
    }
}

impl fmt::Display for SpaceRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kb(kb) => write!(f, "{kb} kB"),
            Self::Invalid(raw) => write!(f, "invalid ({raw:?})"),
        }
    }
}

/// Descriptor of the latest firmware build published by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Opaque version string, compared lexicographically.
    pub version: String,
    /// Artifact file name, relative to the server base URL.
    pub filename: String,
    pub min_free_space: SpaceRequirement,
    /// Lower-case hex SHA-256 of the artifact. Empty disables hash checking.
    pub hash: String,
}

impl Manifest {
    /// Parse a manifest body.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Manifest`] when the version or filename field is
    /// missing.
    pub fn parse(text: &str) -> Result<Self> {
        let body = text.trim_end();
        let body = body.strip_suffix(';').unwrap_or(body);
        let mut fields = body.split(';');

        let version = fields
            .next()
            .ok_or_else(|| UpdateError::Manifest("missing version field".to_owned()))?;
        let filename = fields
            .next()
            .ok_or_else(|| UpdateError::Manifest("missing filename field".to_owned()))?;
        let min_free_space = fields.next().map(SpaceRequirement::parse).unwrap_or_default();
        let hash = fields.next().unwrap_or_default();

        Ok(Self {
            version: version.to_owned(),
            filename: filename.to_owned(),
            min_free_space,
            hash: hash.to_owned(),
        })
    }

    /// The expected content hash, if the server published one.
    pub fn expected_hash(&self) -> Option<&str> {
        if self.hash.is_empty() {
            None
        } else {
            Some(&self.hash)
        }
    }
}
