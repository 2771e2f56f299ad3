//! Streaming installation of a staged gzip-compressed tar artifact.
//!
//! Entries are applied in archive order, straight from the decompressor, in
//! [`CHUNK_SIZE`] pieces. Directories must precede the files they contain;
//! the installer does not reorder or create missing parents.
//!
//! Installation is not transactional. An error midway leaves the entries
//! already written in place alongside the old build.

use crate::download::CHUNK_SIZE;
use crate::error::{Result, UpdateError};
use flate2::bufread::GzDecoder;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tracing::{debug, info, warn};

/// Summary of one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub files_written: usize,
    pub bytes_written: u64,
    pub directories_created: usize,
    /// Directory entries that were already present on disk.
    pub directories_existing: usize,
    /// Entries not written: excluded names and unsupported entry types.
    pub skipped: Vec<String>,
}

/// Extract `artifact` under `root`, skipping names listed in `excluded`.
///
/// Directory entries are named with a trailing `/`; a directory stored
/// without one is matched against `excluded` as if it had it.
///
/// # Errors
///
/// Returns an error if the artifact cannot be decoded, an entry escapes
/// `root`, or any filesystem operation other than creating an existing
/// directory fails.
pub fn install_archive(
    artifact: &Path,
    root: &Path,
    excluded: &BTreeSet<String>,
    quiet: bool,
) -> Result<InstallReport> {
    let file = File::open(artifact)?;
    let decoder = GzDecoder::new(BufReader::with_capacity(CHUNK_SIZE, file));
    let mut archive = Archive::new(decoder);
    let mut report = InstallReport::default();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_type = entry.header().entry_type();
        let mut name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        if entry_type.is_dir() && !name.ends_with('/') {
            name.push('/');
        }
        let is_dir = name.ends_with('/');

        if excluded.contains(&name) {
            if !quiet {
                let kind = if is_dir { "directory" } else { "file" };
                info!("skipping excluded {kind} {name}");
            }
            report.skipped.push(name);
            continue;
        }

        if is_dir {
            let path = resolve_entry(root, &name)?;
            if create_directory(&path, quiet)? {
                report.directories_created += 1;
            } else {
                report.directories_existing += 1;
            }
            continue;
        }

        if !entry_type.is_file() {
            warn!(entry = %name, kind = ?entry_type, "skipping unsupported archive entry");
            report.skipped.push(name);
            continue;
        }

        let dest = resolve_entry(root, &name)?;
        let written = write_entry(&mut entry, &dest)?;
        if !quiet {
            info!("file {name} ({written} B) written to flash");
        }
        report.files_written += 1;
        report.bytes_written += written;
    }

    Ok(report)
}

/// Map an archive entry name onto a path under `root`.
///
/// A leading `/` is treated as the device root. Parent-directory components
/// are rejected.
fn resolve_entry(root: &Path, name: &str) -> Result<PathBuf> {
    let mut path = root.to_path_buf();
    for component in Path::new(name.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(UpdateError::Archive(format!(
                    "entry {name} escapes the install root"
                )));
            }
        }
    }
    Ok(path)
}

/// Create one directory level. Returns `false` if it already existed.
fn create_directory(path: &Path, quiet: bool) -> Result<bool> {
    if !quiet {
        debug!("creating directory {} ... ", path.display());
    }
    match std::fs::create_dir(path) {
        Ok(()) => {
            if !quiet {
                debug!("ok");
            }
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            if !quiet {
                debug!("already exists");
            }
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn write_entry(entry: &mut impl Read, dest: &Path) -> Result<u64> {
    let mut out = File::create(dest)?;
    let mut buf = [0u8; CHUNK_SIZE];
    let mut written = 0u64;
    loop {
        let n = match entry.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        out.write_all(&buf[..n])?;
        written += n as u64;
    }
    out.flush()?;
    Ok(written)
}
