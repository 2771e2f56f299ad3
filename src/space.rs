//! Free space gate consulted before any artifact download.

use crate::error::Result;
use crate::manifest::SpaceRequirement;
use std::path::Path;
use tracing::warn;

/// Filesystem statistics relevant to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStats {
    /// Fundamental block size in bytes.
    pub block_size: u64,
    /// Blocks available for new data.
    pub free_blocks: u64,
}

impl FsStats {
    /// Free space in whole kilobytes.
    pub fn free_kb(&self) -> u64 {
        self.block_size.saturating_mul(self.free_blocks) / 1024
    }
}

/// Returns `true` if `stats` shows at least `required` kilobytes free.
///
/// An [`SpaceRequirement::Invalid`] value is a server-side configuration
/// error: it is logged and the gate stays closed.
pub fn has_free_space(required: &SpaceRequirement, stats: FsStats) -> bool {
    match required {
        SpaceRequirement::Kb(kb) => stats.free_kb() >= *kb,
        SpaceRequirement::Invalid(raw) => {
            warn!(value = %raw, "min free space must be an integer");
            false
        }
    }
}

/// Source of filesystem statistics.
pub trait SpaceProbe {
    /// Statistics for the filesystem holding `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the statistics cannot be retrieved.
    fn stats(&self, path: &Path) -> Result<FsStats>;
}

/// [`SpaceProbe`] backed by `statvfs(3)`.
///
/// Off Unix it reports unlimited space, which effectively skips the gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatvfsProbe;

impl SpaceProbe for StatvfsProbe {
    #[cfg(unix)]
    fn stats(&self, path: &Path) -> Result<FsStats> {
        use crate::error::UpdateError;
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| UpdateError::Config(format!("invalid path for statvfs: {e}")))?;

        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let ret = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };

        if ret != 0 {
            return Err(UpdateError::Io(std::io::Error::last_os_error()));
        }

        // f_frsize = fundamental block size, f_bavail = blocks available to
        // unprivileged users. Widths differ per platform.
        let block_size: u64 = stat.f_frsize as _;
        let free_blocks: u64 = stat.f_bavail as _;
        Ok(FsStats {
            block_size,
            free_blocks,
        })
    }

    #[cfg(not(unix))]
    fn stats(&self, _path: &Path) -> Result<FsStats> {
        Ok(FsStats {
            block_size: 1024,
            free_blocks: u64::MAX,
        })
    }
}
