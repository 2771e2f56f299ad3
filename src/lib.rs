//! uota: over-the-air firmware updates for resource-constrained devices.
//!
//! A device asks its update server for the latest build, downloads it under
//! integrity and (optionally) server-identity verification, and installs it
//! by extracting a gzip-compressed tar archive over its filesystem, removing
//! paths the new build made obsolete.
//!
//! # Architecture
//!
//! Two independent operations on an [`Updater`]:
//!
//! - **Check**: manifest → certificate pin → version comparison → free space
//!   gate → streamed, hashed download to a staging file
//! - **Install**: streamed gzip/tar extraction honoring exclusions → staging
//!   file removed → obsolete paths deleted
//!
//! All streaming happens in 512-byte chunks; the firmware image is never held
//! in memory. Installation is not transactional.

pub mod cleanup;
pub mod config;
pub mod download;
pub mod error;
pub mod install;
pub mod integrity;
pub mod manifest;
pub mod space;
pub mod transport;
pub mod update;
pub mod version;

pub use config::{ConfigSource, FileConfigSource, OtaConfig};
pub use error::{Result, UpdateError};
pub use manifest::Manifest;
pub use update::{CheckFailure, CheckOptions, CheckOutcome, InstallOutcome, UpdatePhase, Updater};
