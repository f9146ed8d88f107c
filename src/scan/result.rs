use super::{CertificateFacts, ProbeError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `days_until_expiry` value for targets that produced no certificate
pub const EXPIRY_SENTINEL_DAYS: i64 = 999_999;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// One (host, port) pair of the workload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProbeTarget {
    pub host: String,
    pub port: u16,
}

impl ProbeTarget {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Output record for one target, successful or not
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub domain: String,
    pub ip_address: String,
    pub port: u16,
    pub serial: String,
    pub tls_version: String,
    pub cipher_suite: String,
    pub fips_compliant: bool,
    pub chain_status: String,
    pub issuer: String,
    pub signature_algo: String,
    pub sans: Vec<String>,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    pub days_until_expiry: i64,
    pub common_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanResult {
    /// Build the record for `target` from a probe outcome
    #[must_use]
    pub fn from_outcome(
        target: &ProbeTarget,
        outcome: Result<CertificateFacts, ProbeError>,
        reference: DateTime<Utc>,
    ) -> Self {
        match outcome {
            Ok(facts) => Self::success(target, facts, reference),
            Err(err) => Self::failure(target, &err),
        }
    }

    #[must_use]
    pub fn success(target: &ProbeTarget, facts: CertificateFacts, reference: DateTime<Utc>) -> Self {
        let leaf = facts.leaf;
        Self {
            domain: target.host.clone(),
            ip_address: facts.peer_address.unwrap_or_default(),
            port: target.port,
            serial: leaf.serial,
            tls_version: facts.tls_version,
            cipher_suite: facts.cipher_suite,
            fips_compliant: facts.fips_compliant,
            chain_status: facts.chain_status.to_string(),
            issuer: leaf.issuer,
            signature_algo: leaf.signature_algorithm,
            sans: leaf.sans,
            not_before: Some(leaf.not_before),
            not_after: Some(leaf.not_after),
            days_until_expiry: days_until_expiry(leaf.not_after, reference),
            common_name: leaf.common_name,
            error: None,
        }
    }

    #[must_use]
    pub fn failure(target: &ProbeTarget, err: &ProbeError) -> Self {
        Self {
            domain: target.host.clone(),
            ip_address: String::new(),
            port: target.port,
            serial: String::new(),
            tls_version: String::new(),
            cipher_suite: String::new(),
            fips_compliant: false,
            chain_status: String::new(),
            issuer: String::new(),
            signature_algo: String::new(),
            sans: Vec::new(),
            not_before: None,
            not_after: None,
            days_until_expiry: EXPIRY_SENTINEL_DAYS,
            common_name: String::new(),
            error: Some(err.to_string()),
        }
    }

    /// The probe produced no certificate
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    #[must_use]
    pub fn target(&self) -> ProbeTarget {
        ProbeTarget::new(self.domain.clone(), self.port)
    }
}

/// Whole days from `reference` until `not_after`, rounded toward negative infinity
#[must_use]
pub fn days_until_expiry(not_after: DateTime<Utc>, reference: DateTime<Utc>) -> i64 {
    (not_after - reference)
        .num_seconds()
        .div_euclid(SECONDS_PER_DAY)
}
