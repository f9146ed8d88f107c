//! Error types for a single probe attempt.
//!
//! Every variant is terminal for the target it was raised for. Chain-trust
//! problems are not errors; they are carried as [`super::ChainStatus`] on a
//! successful probe.

use std::fmt;

/// Reason a probe produced no certificate facts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// TCP connection could not be established (refused, unreachable, deadline, cancelled)
    Connection {
        /// The `host:port` the connection was attempted to
        address: String,
        /// Why the connection failed
        details: String,
    },

    /// TLS negotiation failed, including deadline expiry mid-handshake
    Handshake {
        /// Why the handshake failed
        details: String,
    },

    /// The peer completed the handshake without presenting a certificate
    NoCertificate,

    /// The leaf certificate could not be parsed
    Certificate {
        /// What was wrong with it
        reason: String,
    },

    /// The batch worker owning the target died before reporting it
    Aborted {
        /// Why the worker stopped
        details: String,
    },
}

impl ProbeError {
    pub(crate) fn connection(address: &str, details: impl fmt::Display) -> Self {
        Self::Connection {
            address: address.to_string(),
            details: details.to_string(),
        }
    }

    pub(crate) fn handshake(details: impl fmt::Display) -> Self {
        Self::Handshake {
            details: details.to_string(),
        }
    }

    /// Short label used for metrics and log fields
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::Handshake { .. } => "handshake",
            Self::NoCertificate => "no_certificate",
            Self::Certificate { .. } => "certificate",
            Self::Aborted { .. } => "aborted",
        }
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection { address, details } => {
                write!(f, "failed to connect to {address}: {details}")
            }
            Self::Handshake { details } => write!(f, "handshake failed: {details}"),
            Self::NoCertificate => write!(f, "no certificates found"),
            Self::Certificate { reason } => write!(f, "certificate error: {reason}"),
            Self::Aborted { details } => write!(f, "scan aborted: {details}"),
        }
    }
}

impl std::error::Error for ProbeError {}
