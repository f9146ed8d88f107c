use super::{ChainStatus, ProbeError};
use chrono::{DateTime, Utc};
use rustls::{CipherSuite, ProtocolVersion};
use x509_parser::prelude::{FromDer, GeneralName, X509Certificate};

/// Negotiated version + cipher-suite pairs accepted for regulated environments.
///
/// Only consulted when the negotiated version is TLS 1.2 or TLS 1.3.
const FIPS_CIPHER_SUITES: [u16; 14] = [
    0x1301, // TLS_AES_128_GCM_SHA256
    0x1302, // TLS_AES_256_GCM_SHA384
    0x002F, // TLS_RSA_WITH_AES_128_CBC_SHA
    0x0035, // TLS_RSA_WITH_AES_256_CBC_SHA
    0x009C, // TLS_RSA_WITH_AES_128_GCM_SHA256
    0x009D, // TLS_RSA_WITH_AES_256_GCM_SHA384
    0xC009, // TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA
    0xC00A, // TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA
    0xC02B, // TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256
    0xC02C, // TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384
    0xC013, // TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA
    0xC014, // TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA
    0xC02F, // TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
    0xC030, // TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384
];

/// Evidence extracted from one successful handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateFacts {
    /// Negotiated protocol, e.g. "TLS 1.3"
    pub tls_version: String,
    /// Negotiated cipher suite, e.g. `TLS_AES_256_GCM_SHA384`
    pub cipher_suite: String,
    /// Version + cipher pair is in the compliance set
    pub fips_compliant: bool,
    /// IP address the TCP connection was established with
    pub peer_address: Option<String>,
    pub chain_status: ChainStatus,
    pub leaf: LeafCertificate,
}

/// Fields read from the end-entity certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafCertificate {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub common_name: String,
    /// Lowercase hex, no leading zeros
    pub serial: String,
    /// Issuer CN, then issuer O, then "Unknown"
    pub issuer: String,
    pub signature_algorithm: String,
    /// DNS subject alternative names
    pub sans: Vec<String>,
}

impl LeafCertificate {
    /// Parse the DER-encoded leaf certificate
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Certificate`] if the bytes are not a valid X.509 certificate
    /// or carry an out-of-range validity timestamp
    pub fn parse(der: &[u8]) -> Result<Self, ProbeError> {
        let (_, cert) = X509Certificate::from_der(der).map_err(|e| ProbeError::Certificate {
            reason: format!("failed to parse certificate: {e}"),
        })?;

        let validity = cert.validity();
        let not_before = to_utc(validity.not_before.timestamp())?;
        let not_after = to_utc(validity.not_after.timestamp())?;

        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .unwrap_or_default()
            .to_string();

        let issuer = cert
            .issuer()
            .iter_common_name()
            .find_map(|cn| cn.as_str().ok().filter(|value| !value.is_empty()))
            .or_else(|| {
                cert.issuer()
                    .iter_organization()
                    .find_map(|org| org.as_str().ok().filter(|value| !value.is_empty()))
            })
            .unwrap_or("Unknown")
            .to_string();

        let sans = match cert.subject_alternative_name() {
            Ok(Some(ext)) => ext
                .value
                .general_names
                .iter()
                .filter_map(|name| match name {
                    GeneralName::DNSName(dns) => Some((*dns).to_string()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            not_before,
            not_after,
            common_name,
            serial: cert.tbs_certificate.serial.to_str_radix(16),
            issuer,
            signature_algorithm: signature_algorithm_name(
                &cert.signature_algorithm.algorithm.to_id_string(),
            ),
            sans,
        })
    }
}

fn to_utc(timestamp: i64) -> Result<DateTime<Utc>, ProbeError> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).ok_or_else(|| ProbeError::Certificate {
        reason: "invalid certificate validity timestamp".to_string(),
    })
}

/// Human-readable protocol label
#[must_use]
pub fn tls_version_label(version: ProtocolVersion) -> String {
    match version {
        ProtocolVersion::TLSv1_3 => "TLS 1.3".to_string(),
        ProtocolVersion::TLSv1_2 => "TLS 1.2".to_string(),
        ProtocolVersion::TLSv1_1 => "TLS 1.1".to_string(),
        ProtocolVersion::TLSv1_0 => "TLS 1.0".to_string(),
        ProtocolVersion::SSLv3 => "SSL 3.0".to_string(),
        other => format!("Unknown({:x})", u16::from(other)),
    }
}

/// IANA-style cipher-suite name; TLS 1.3 suites drop the `TLS13_` prefix
#[must_use]
pub fn cipher_suite_name(suite: CipherSuite) -> String {
    match suite.as_str() {
        Some(name) => name
            .strip_prefix("TLS13_")
            .map_or_else(|| name.to_string(), |rest| format!("TLS_{rest}")),
        None => format!("0x{:04X}", u16::from(suite)),
    }
}

/// Whether the negotiated version + cipher pair is in the compliance set
#[must_use]
pub fn is_fips_compliant(version: ProtocolVersion, suite: CipherSuite) -> bool {
    matches!(version, ProtocolVersion::TLSv1_2 | ProtocolVersion::TLSv1_3)
        && FIPS_CIPHER_SUITES.contains(&u16::from(suite))
}

/// Map a signature algorithm OID to its conventional name
#[must_use]
pub fn signature_algorithm_name(oid: &str) -> String {
    let name = match oid {
        "1.2.840.113549.1.1.4" => "MD5-RSA",
        "1.2.840.113549.1.1.5" => "SHA1-RSA",
        "1.2.840.113549.1.1.10" => "RSA-PSS",
        "1.2.840.113549.1.1.11" => "SHA256-RSA",
        "1.2.840.113549.1.1.12" => "SHA384-RSA",
        "1.2.840.113549.1.1.13" => "SHA512-RSA",
        "1.2.840.10045.4.1" => "ECDSA-SHA1",
        "1.2.840.10045.4.3.2" => "ECDSA-SHA256",
        "1.2.840.10045.4.3.3" => "ECDSA-SHA384",
        "1.2.840.10045.4.3.4" => "ECDSA-SHA512",
        "1.3.101.112" => "Ed25519",
        _ => return oid.to_string(),
    };
    name.to_string()
}
