//! HTTP transport used to fetch the manifest and the firmware artifact.
//!
//! The updater only needs a blocking GET that yields a body stream and, for
//! pinning, the DER leaf certificate the server presented. [`UreqTransport`]
//! is the default implementation; tests and embedders can supply their own.

use crate::error::{Result, UpdateError};
use std::io::{ErrorKind, Read};
use std::time::Duration;

const USER_AGENT: &str = concat!("uota/", env!("CARGO_PKG_VERSION"));

/// Response to a GET request.
pub struct HttpResponse {
    body: Box<dyn Read>,
    peer_certificate: Option<Vec<u8>>,
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("peer_certificate", &self.peer_certificate.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}

impl HttpResponse {
    pub fn new(body: impl Read + 'static) -> Self {
        Self {
            body: Box::new(body),
            peer_certificate: None,
        }
    }

    /// Attach the DER leaf certificate observed on the connection.
    pub fn with_peer_certificate(mut self, der: Vec<u8>) -> Self {
        self.peer_certificate = Some(der);
        self
    }

    pub fn peer_certificate(&self) -> Option<&[u8]> {
        self.peer_certificate.as_deref()
    }

    /// The body stream, read in place.
    pub fn body_mut(&mut self) -> &mut dyn Read {
        &mut *self.body
    }

    /// Read at most `limit` bytes of the body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Network`] if the body cannot be read and
    /// [`UpdateError::Manifest`] if it is not valid UTF-8.
    pub fn read_text(&mut self, limit: u64) -> Result<String> {
        let mut text = String::new();
        (&mut *self.body)
            .take(limit)
            .read_to_string(&mut text)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidData => {
                    UpdateError::Manifest("response body is not valid UTF-8".to_owned())
                }
                _ => UpdateError::Network(format!("cannot read response body: {e}")),
            })?;
        Ok(text)
    }
}

/// Blocking HTTP GET capability.
pub trait Transport {
    /// Issue a GET for `url`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Network`] on connection failure or a non-success
    /// status.
    fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// [`Transport`] backed by a `ureq` agent.
///
/// With the `cert-pinning` feature the agent's TLS config records the leaf
/// certificate of each verified handshake, keyed by server name, so the one
/// for the requested host can be attached to the response. Chain validation
/// against the webpki roots is unchanged.
pub struct UreqTransport {
    agent: ureq::Agent,
    #[cfg(feature = "cert-pinning")]
    leaves: tls::LeafCache,
}

impl UreqTransport {
    /// Build a transport with connect/read timeouts suited to slow links.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS configuration cannot be built.
    pub fn new() -> Result<Self> {
        let builder = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(15))
            .timeout_read(Duration::from_secs(60));

        #[cfg(feature = "cert-pinning")]
        {
            let leaves = tls::LeafCache::default();
            let agent = builder.tls_config(tls::capturing_config(&leaves)?).build();
            Ok(Self { agent, leaves })
        }
        #[cfg(not(feature = "cert-pinning"))]
        {
            Ok(Self {
                agent: builder.build(),
            })
        }
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        let request = self.agent.get(url).set("User-Agent", USER_AGENT);
        #[cfg(feature = "cert-pinning")]
        let host = request
            .request_url()
            .ok()
            .filter(|target| target.scheme() == "https")
            .map(|target| tls::host_key(target.host()));

        let resp = request
            .call()
            .map_err(|e| UpdateError::Network(format!("GET {url} failed: {e}")))?;

        #[allow(unused_mut)]
        let mut response = HttpResponse::new(resp.into_reader());

        #[cfg(feature = "cert-pinning")]
        {
            if let Some(der) = host.and_then(|host| self.leaves.for_host(&host)) {
                response = response.with_peer_certificate(der);
            }
        }

        Ok(response)
    }
}

#[cfg(feature = "cert-pinning")]
mod tls {
    use crate::error::{Result, UpdateError};
    use rustls::client::WebPkiServerVerifier;
    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Leaf certificate of the latest verified handshake with each host.
    ///
    /// Pooled connections skip the handshake, so entries outlive a single
    /// request. A response only ever sees the certificate of its own host.
    #[derive(Debug, Clone, Default)]
    pub(super) struct LeafCache(Arc<Mutex<HashMap<String, Vec<u8>>>>);

    impl LeafCache {
        pub(super) fn for_host(&self, host: &str) -> Option<Vec<u8>> {
            self.0.lock().ok().and_then(|leaves| leaves.get(host).cloned())
        }

        fn record(&self, host: String, der: &[u8]) {
            if let Ok(mut leaves) = self.0.lock() {
                leaves.insert(host, der.to_vec());
            }
        }
    }

    /// Lookup key for a URL host: lower-case, IPv6 brackets removed.
    pub(super) fn host_key(host: &str) -> String {
        host.trim_start_matches('[')
            .trim_end_matches(']')
            .to_ascii_lowercase()
    }

    fn server_key(server_name: &ServerName<'_>) -> Option<String> {
        match server_name {
            ServerName::DnsName(name) => Some(host_key(name.as_ref())),
            ServerName::IpAddress(ip) => Some(std::net::IpAddr::from(*ip).to_string()),
            _ => None,
        }
    }

    #[derive(Debug)]
    struct CapturingVerifier {
        inner: Arc<WebPkiServerVerifier>,
        leaves: LeafCache,
    }

    impl ServerCertVerifier for CapturingVerifier {
        fn verify_server_cert(
            &self,
            end_entity: &CertificateDer<'_>,
            intermediates: &[CertificateDer<'_>],
            server_name: &ServerName<'_>,
            ocsp_response: &[u8],
            now: UnixTime,
        ) -> std::result::Result<ServerCertVerified, rustls::Error> {
            let verified = self.inner.verify_server_cert(
                end_entity,
                intermediates,
                server_name,
                ocsp_response,
                now,
            )?;
            if let Some(host) = server_key(server_name) {
                self.leaves.record(host, end_entity.as_ref());
            }
            Ok(verified)
        }

        fn verify_tls12_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
            self.inner.verify_tls12_signature(message, cert, dss)
        }

        fn verify_tls13_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
            self.inner.verify_tls13_signature(message, cert, dss)
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            self.inner.supported_verify_schemes()
        }
    }

    pub(super) fn capturing_config(leaves: &LeafCache) -> Result<Arc<ClientConfig>> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider))
            .build()
            .map_err(|e| UpdateError::Config(format!("cannot build TLS verifier: {e}")))?;

        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| UpdateError::Config(format!("cannot configure TLS: {e}")))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(CapturingVerifier {
                inner,
                leaves: leaves.clone(),
            }))
            .with_no_client_auth();

        Ok(Arc::new(config))
    }

}
