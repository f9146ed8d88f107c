use super::{
    CertificateFacts, ChainVerifier, LeafCertificate, NoVerifier, ProbeContext, ProbeError,
    facts::{cipher_suite_name, is_fips_compliant, tls_version_label},
};
use anyhow::{Result, anyhow};
use rustls::{
    CipherSuite, ClientConfig, ProtocolVersion, RootCertStore,
    crypto::ring::default_provider,
    pki_types::ServerName,
};
use std::{
    fmt,
    net::IpAddr,
    sync::{Arc, OnceLock},
};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::trace;

static CRYPTO_PROVIDER_INIT: OnceLock<()> = OnceLock::new();

/// Install ring as the process-wide rustls provider.
///
/// The prober passes its provider explicitly; this covers other rustls users
/// in the process (the HTTP client). Safe to call repeatedly.
pub fn ensure_crypto_provider() {
    CRYPTO_PROVIDER_INIT.get_or_init(|| {
        // Err means another component already installed one, which is fine
        let _ = default_provider().install_default();
    });
}

/// Performs single TLS inspection attempts.
///
/// Cheap to clone; holds no per-target state.
#[derive(Clone)]
pub struct Prober {
    connector: TlsConnector,
    verifier: ChainVerifier,
}

impl fmt::Debug for Prober {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prober")
            .field("connector", &"TlsConnector")
            .field("verifier", &self.verifier)
            .finish()
    }
}

impl Prober {
    /// Prober trusting the Mozilla root program
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS client or chain verifier cannot be built
    pub fn new() -> Result<Self> {
        let root_store: RootCertStore = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
        Self::with_root_certificates(root_store)
    }

    /// Prober trusting exactly `root_store` when classifying chains
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS client or chain verifier cannot be built
    pub fn with_root_certificates(root_store: RootCertStore) -> Result<Self> {
        ensure_crypto_provider();
        let provider = Arc::new(default_provider());

        let config = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| anyhow!("failed to configure TLS protocol versions: {e}"))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerifier))
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            verifier: ChainVerifier::with_root_certificates(root_store, provider)?,
        })
    }

    /// Connect to `host:port`, complete a handshake and inspect what the peer presented.
    ///
    /// The connection is owned by this call and closed on every return path.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] when the TCP connect or the TLS handshake fails (including
    /// deadline expiry and cancellation), when no certificate was presented, or when
    /// the leaf cannot be parsed. An untrusted chain is not an error.
    pub async fn probe(
        &self,
        ctx: &ProbeContext,
        host: &str,
        port: u16,
    ) -> Result<CertificateFacts, ProbeError> {
        let address = format!("{host}:{port}");

        let stream = ctx
            .run(TcpStream::connect((host, port)))
            .await
            .map_err(|e| ProbeError::connection(&address, e))?
            .map_err(|e| ProbeError::connection(&address, e))?;
        let peer_address = stream.peer_addr().ok().map(|addr| addr.ip().to_string());
        trace!(%address, ?peer_address, "tcp connected");

        let server_name = server_name_from_host(host)
            .map_err(|e| ProbeError::handshake(format!("{e:#}")))?;
        let tls_stream = ctx
            .run(self.connector.connect(server_name.clone(), stream))
            .await
            .map_err(ProbeError::handshake)?
            .map_err(ProbeError::handshake)?;

        let (_, connection) = tls_stream.get_ref();
        let version = connection
            .protocol_version()
            .unwrap_or(ProtocolVersion::Unknown(0));
        let suite = connection
            .negotiated_cipher_suite()
            .map_or(CipherSuite::Unknown(0), |negotiated| negotiated.suite());

        let certs = connection.peer_certificates().unwrap_or_default();
        let Some((end_entity, intermediates)) = certs.split_first() else {
            return Err(ProbeError::NoCertificate);
        };

        let leaf = LeafCertificate::parse(end_entity.as_ref())?;
        let chain_status = self
            .verifier
            .classify(end_entity, intermediates, &server_name);

        Ok(CertificateFacts {
            tls_version: tls_version_label(version),
            cipher_suite: cipher_suite_name(suite),
            fips_compliant: is_fips_compliant(version, suite),
            peer_address,
            chain_status,
            leaf,
        })
    }
}

/// SNI / verification name for a hostname or IP literal
///
/// # Errors
///
/// Returns an error if `host` is neither a valid DNS name nor an IP address
pub fn server_name_from_host(host: &str) -> Result<ServerName<'static>> {
    host.parse::<IpAddr>().map_or_else(
        |_| {
            ServerName::try_from(host.to_string())
                .map_err(|_| anyhow!("invalid server name: {host}"))
        },
        |ip| Ok(ServerName::from(ip).to_owned()),
    )
}
