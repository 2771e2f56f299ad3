//! Local firmware version record and update eligibility.

use crate::error::Result;
use std::io::ErrorKind;
use std::path::Path;

/// File holding the installed version, relative to the device root.
pub const LOCAL_VERSION_FILE: &str = "version";

/// Read the installed version from `root`.
///
/// Returns `Ok(None)` when the record does not exist, which callers must keep
/// distinct from "versions equal".
///
/// # Errors
///
/// Returns an error if the record exists but cannot be read.
pub fn read_local_version(root: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(root.join(LOCAL_VERSION_FILE)) {
        Ok(text) => Ok(Some(text.trim().to_owned())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Whether `remote` is newer than `local`.
///
/// Plain lexicographic string comparison, so `"9" > "10"`. Version schemes
/// must keep a fixed width for this to order correctly.
pub fn is_newer(remote: &str, local: &str) -> bool {
    remote > local
}
