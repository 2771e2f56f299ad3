//! Update controller.
//!
//! [`Updater`] sequences manifest negotiation, verification, the space gate,
//! and the staged download ([`Updater::check`]), and separately the archive
//! install plus obsolete-path cleanup ([`Updater::install`]).
//!
//! Every collaborator is injected: configuration loader, HTTP transport,
//! pinning capability, and filesystem statistics. Operations take `&mut self`
//! because the staging path and the version/config records are shared,
//! unsynchronized device state.

pub mod applier;
pub mod checker;
pub mod state;

pub use state::{CheckFailure, CheckOptions, CheckOutcome, InstallOutcome, UpdatePhase};

use crate::config::{ConfigSource, FileConfigSource, OtaConfig};
use crate::error::Result;
use crate::integrity::{CertPinning, default_pinning};
use crate::space::{SpaceProbe, StatvfsProbe};
use crate::transport::{Transport, UreqTransport};
use std::path::{Path, PathBuf};
use tracing::error;

/// Over-the-air update controller for one device root.
pub struct Updater {
    root: PathBuf,
    config: Box<dyn ConfigSource>,
    transport: Box<dyn Transport>,
    pinning: Box<dyn CertPinning>,
    space: Box<dyn SpaceProbe>,
    phase: UpdatePhase,
}

impl Updater {
    /// Controller with the default collaborators: `uota.toml` under `root`,
    /// a `ureq` transport, this build's pinning capability, and `statvfs`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP transport cannot be built.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        Ok(Self {
            config: Box::new(FileConfigSource::in_root(&root)),
            transport: Box::new(UreqTransport::new()?),
            pinning: default_pinning(),
            space: Box::new(StatvfsProbe),
            phase: UpdatePhase::Idle,
            root,
        })
    }

    pub fn with_config_source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.config = Box::new(source);
        self
    }

    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Box::new(transport);
        self
    }

    pub fn with_pinning(mut self, pinning: impl CertPinning + 'static) -> Self {
        self.pinning = Box::new(pinning);
        self
    }

    pub fn with_space_probe(mut self, probe: impl SpaceProbe + 'static) -> Self {
        self.space = Box::new(probe);
        self
    }

    /// Directory treated as the device filesystem root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    /// Fresh configuration, or `None` (logged) when it is unavailable.
    fn load_config(&self) -> Option<OtaConfig> {
        match self.config.load() {
            Ok(config) => Some(config),
            Err(e) => {
                error!("cannot load uota config ({e}), OTA is disabled");
                None
            }
        }
    }
}

impl std::fmt::Debug for Updater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Updater")
            .field("root", &self.root)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}
