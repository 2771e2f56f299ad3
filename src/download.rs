//! Streams the firmware artifact to its staging path.
//!
//! The payload never sits in memory as a whole: it is copied in
//! [`CHUNK_SIZE`] pieces, each fed to the hash accumulator before it is
//! written.

use crate::error::Result;
use crate::integrity::{ContentHasher, hash_matches};
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Chunk size for every streaming copy (download and extraction).
pub const CHUNK_SIZE: usize = 512;

/// Result of staging a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Artifact written and, if a hash was expected, verified.
    Staged {
        bytes: u64,
        /// Computed digest, present when a hash was expected.
        digest: Option<String>,
    },
    /// Computed digest differs from the expected one. The staged file has
    /// been removed.
    HashMismatch { expected: String, actual: String },
}

/// Copy `body` into `dest`, verifying it against `expected_hash` if given.
///
/// On a read or write error the partial file is removed before the error is
/// returned, so a failed download never leaves an artifact for install to
/// pick up.
///
/// # Errors
///
/// Returns an error if the destination cannot be created or the copy fails.
pub fn stage_artifact(
    body: &mut dyn Read,
    dest: &Path,
    expected_hash: Option<&str>,
) -> Result<StageOutcome> {
    let mut hasher = expected_hash.map(|_| ContentHasher::new());

    let copied = File::create(dest).and_then(|mut file| {
        let bytes = copy_chunks(body, &mut file, hasher.as_mut())?;
        file.flush()?;
        Ok(bytes)
    });

    let bytes = match copied {
        Ok(bytes) => bytes,
        Err(e) => {
            discard(dest);
            return Err(e.into());
        }
    };
    debug!(path = %dest.display(), bytes, "artifact written");

    let (Some(expected), Some(hasher)) = (expected_hash, hasher) else {
        return Ok(StageOutcome::Staged {
            bytes,
            digest: None,
        });
    };

    let actual = hasher.finalize_hex();
    if hash_matches(&actual, expected) {
        Ok(StageOutcome::Staged {
            bytes,
            digest: Some(actual),
        })
    } else {
        discard(dest);
        Ok(StageOutcome::HashMismatch {
            expected: expected.to_owned(),
            actual,
        })
    }
}

fn copy_chunks(
    body: &mut dyn Read,
    file: &mut File,
    mut hasher: Option<&mut ContentHasher>,
) -> std::io::Result<u64> {
    let mut buf = [0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let chunk = &buf[..n];
        if let Some(h) = hasher.as_deref_mut() {
            h.update(chunk);
        }
        file.write_all(chunk)?;
        total += n as u64;
    }
    Ok(total)
}

fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "cannot remove staged artifact");
        }
    }
}
