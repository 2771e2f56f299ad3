//! Server identity and payload integrity checks.
//!
//! Two independent checks, each optional:
//!
//! - **Certificate pinning**: the leaf certificate seen on the manifest
//!   connection is reduced to a public-key hash by a [`CertPinning`]
//!   capability and compared byte for byte with a caller-supplied pin.
//! - **Content hash**: a streaming SHA-256 over the artifact as it is
//!   downloaded, compared with the hex digest published in the manifest.

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::warn;

/// Streaming SHA-256 accumulator fed one download chunk at a time.
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Sha256,
}

impl fmt::Debug for ContentHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentHasher").finish_non_exhaustive()
    }
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
    }

    /// Finish the digest as lower-case hex.
    pub fn finalize_hex(self) -> String {
        let digest = self.inner.finalize();
        format!("{digest:x}")
    }
}

/// Exact comparison of a computed digest against the published one.
///
/// The manifest hash is compared verbatim; servers publish lower-case hex.
pub fn hash_matches(actual_hex: &str, expected_hex: &str) -> bool {
    actual_hex == expected_hex
}

/// Platform capability that turns a DER certificate into a pin digest.
pub trait CertPinning {
    /// Whether the platform can compute pins at all. When `false`, pin checks
    /// are skipped with a warning instead of failing.
    fn is_available(&self) -> bool {
        true
    }

    /// Hash of the certificate's public key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::UpdateError::Pinning`] when the certificate cannot be
    /// parsed.
    fn pubkey_hash(&self, leaf_der: &[u8]) -> Result<Vec<u8>>;
}

/// Pinning capability for builds without a certificate parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPinning;

impl CertPinning for NoPinning {
    fn is_available(&self) -> bool {
        false
    }

    fn pubkey_hash(&self, _leaf_der: &[u8]) -> Result<Vec<u8>> {
        Err(crate::UpdateError::Pinning(
            "certificate pinning is not available in this build".to_owned(),
        ))
    }
}

/// SHA-256 over the certificate's DER-encoded SubjectPublicKeyInfo.
#[cfg(feature = "cert-pinning")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SpkiSha256Pinning;

#[cfg(feature = "cert-pinning")]
impl CertPinning for SpkiSha256Pinning {
    fn pubkey_hash(&self, leaf_der: &[u8]) -> Result<Vec<u8>> {
        let (_, cert) = x509_parser::parse_x509_certificate(leaf_der).map_err(|e| {
            crate::UpdateError::Pinning(format!("cannot parse server certificate: {e}"))
        })?;
        Ok(Sha256::digest(cert.public_key().raw).to_vec())
    }
}

/// The pinning capability this build was compiled with.
pub fn default_pinning() -> Box<dyn CertPinning> {
    #[cfg(feature = "cert-pinning")]
    {
        Box::new(SpkiSha256Pinning)
    }
    #[cfg(not(feature = "cert-pinning"))]
    {
        Box::new(NoPinning)
    }
}

/// Outcome of a certificate pin check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinVerdict {
    /// No pin requested, or the platform cannot pin.
    Skipped,
    Matched,
    /// Pin differs, or the server identity could not be established.
    Mismatch,
}

impl fmt::Display for PinVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => write!(f, "skipped"),
            Self::Matched => write!(f, "matched"),
            Self::Mismatch => write!(f, "mismatch"),
        }
    }
}

/// Check the server's leaf certificate against `expected`.
///
/// Fails closed: a missing or unparseable certificate is a mismatch. The only
/// soft path is a platform without pinning support.
pub fn verify_pin(
    pinning: &dyn CertPinning,
    peer_certificate: Option<&[u8]>,
    expected: &[u8],
) -> PinVerdict {
    if expected.is_empty() {
        return PinVerdict::Skipped;
    }
    if !pinning.is_available() {
        warn!("certificate pinning is not available, skipping server identity check");
        return PinVerdict::Skipped;
    }

    let Some(der) = peer_certificate else {
        warn!("no server certificate observed on the manifest connection");
        return PinVerdict::Mismatch;
    };

    match pinning.pubkey_hash(der) {
        Ok(actual) if actual == expected => PinVerdict::Matched,
        Ok(_) => PinVerdict::Mismatch,
        Err(e) => {
            warn!(error = %e, "cannot compute server public key hash");
            PinVerdict::Mismatch
        }
    }
}
