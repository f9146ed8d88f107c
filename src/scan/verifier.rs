use anyhow::{Context, Result, anyhow};
use rustls::{
    CertificateError, DigitallySignedStruct, Error as TlsError, RootCertStore, SignatureScheme,
    client::{
        WebPkiServerVerifier,
        danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
        verify_server_name,
    },
    crypto::CryptoProvider,
    pki_types::{CertificateDer, ServerName, UnixTime},
    server::ParsedCertificate,
};
use rustls_pemfile::certs;
use std::{fmt, io::Cursor, path::Path, sync::Arc};
use tokio::fs;
use x509_parser::prelude::{FromDer, X509Certificate};

/// Outcome of validating the leaf against the trust anchors and presented intermediates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStatus {
    Ok,
    /// No path to a trusted root; usually the server omitted its intermediate
    UntrustedRoot,
    HostnameMismatch(String),
    InvalidCert(String),
    ChainError(String),
}

impl ChainStatus {
    /// Map a verification failure onto its trust bucket
    #[must_use]
    pub fn from_verify_error(err: &TlsError) -> Self {
        match err {
            TlsError::InvalidCertificate(CertificateError::UnknownIssuer) => Self::UntrustedRoot,
            TlsError::InvalidCertificate(
                CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. },
            ) => Self::HostnameMismatch(err.to_string()),
            TlsError::InvalidCertificate(_) => Self::InvalidCert(err.to_string()),
            other => Self::ChainError(other.to_string()),
        }
    }

    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Low-cardinality label for metrics
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::UntrustedRoot => "untrusted_root",
            Self::HostnameMismatch(_) => "hostname_mismatch",
            Self::InvalidCert(_) => "invalid_cert",
            Self::ChainError(_) => "chain_error",
        }
    }
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::UntrustedRoot => write!(f, "Untrusted Root / Missing Intermediate"),
            Self::HostnameMismatch(detail) => write!(f, "Hostname Mismatch: {detail}"),
            Self::InvalidCert(detail) => write!(f, "Invalid Cert: {detail}"),
            Self::ChainError(detail) => write!(f, "Chain Error: {detail}"),
        }
    }
}

/// Classifies presented chains with the standard `WebPKI` verifier.
///
/// The handshake itself never verifies (see [`NoVerifier`]); this runs after
/// the session is up so a broken chain still yields expiry data.
#[derive(Clone)]
pub struct ChainVerifier {
    inner_verifier: Arc<WebPkiServerVerifier>,
}

impl fmt::Debug for ChainVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainVerifier")
            .field("inner_verifier", &"WebPkiServerVerifier")
            .finish()
    }
}

impl ChainVerifier {
    /// Create a verifier trusting the given root certificates
    ///
    /// # Errors
    ///
    /// Returns an error if the `WebPKI` verifier cannot be built (e.g. an empty root store)
    pub fn with_root_certificates(
        root_store: RootCertStore,
        provider: Arc<CryptoProvider>,
    ) -> Result<Self> {
        let inner_verifier = WebPkiServerVerifier::builder_with_provider(Arc::new(root_store), provider)
            .build()
            .map_err(|e| anyhow!("failed to build WebPKI verifier: {e}"))?;

        Ok(Self { inner_verifier })
    }

    /// Validate `end_entity` for `server_name` using the presented intermediates.
    ///
    /// The leaf's validity window and subject names are checked before any
    /// path is built, so an untrusted certificate issued for another host is
    /// reported as a hostname mismatch.
    #[must_use]
    pub fn classify(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
    ) -> ChainStatus {
        let now = UnixTime::now();
        let verified = check_leaf(end_entity, server_name, now).and_then(|()| {
            self.inner_verifier
                .verify_server_cert(end_entity, intermediates, server_name, &[], now)
                .map(|_| ())
        });

        match verified {
            Ok(()) => ChainStatus::Ok,
            Err(err) => ChainStatus::from_verify_error(&err),
        }
    }
}

/// Validity window first, then the subject names
fn check_leaf(
    end_entity: &CertificateDer<'_>,
    server_name: &ServerName<'_>,
    now: UnixTime,
) -> Result<(), TlsError> {
    // Leaves x509-parser rejects are left for the path builder to report
    if let Ok((_, cert)) = X509Certificate::from_der(end_entity.as_ref()) {
        let now = i64::try_from(now.as_secs()).unwrap_or(i64::MAX);
        let validity = cert.validity();
        if now < validity.not_before.timestamp() {
            return Err(TlsError::InvalidCertificate(CertificateError::NotValidYet));
        }
        if now > validity.not_after.timestamp() {
            return Err(TlsError::InvalidCertificate(CertificateError::Expired));
        }
    }

    let parsed = ParsedCertificate::try_from(end_entity)?;
    verify_server_name(&parsed, server_name)
}

/// Mozilla's root program, plus any PEM roots found in `ca_file`
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not PEM, or holds no certificate
pub async fn load_root_store(ca_file: Option<&Path>) -> Result<RootCertStore> {
    let mut root_store: RootCertStore = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();

    if let Some(path) = ca_file {
        let extra = load_cert_chain(path).await?;
        let (added, ignored) = root_store.add_parsable_certificates(extra);
        if added == 0 {
            anyhow::bail!("no usable CA certificates in {}", path.display());
        }
        tracing::debug!(path = %path.display(), added, ignored, "loaded extra trust anchors");
    }

    Ok(root_store)
}

async fn load_cert_chain(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let data = fs::read(path)
        .await
        .with_context(|| format!("failed to read certificate {}", path.display()))?;
    let mut reader = Cursor::new(data);
    let parsed = certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| anyhow!("invalid certificate PEM: {e}"))?;

    if parsed.is_empty() {
        anyhow::bail!("no certificates found in {}", path.display());
    }

    Ok(parsed)
}

/// Certificate verifier that accepts any certificate without validation.
///
/// Used for the handshake only, so that hosts with broken chains can still be
/// inspected; trust is evaluated afterwards by [`ChainVerifier`].
#[derive(Debug)]
pub struct NoVerifier;

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
            SignatureScheme::RSA_PKCS1_SHA1,
            SignatureScheme::ECDSA_SHA1_Legacy,
        ]
    }
}
