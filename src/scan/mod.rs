//! Concurrent TLS inspection engine.
//!
//! This module provides:
//! - [`Prober`]: one bounded connect + handshake per target, extracting
//!   certificate metadata and classifying chain trust
//! - [`BatchWorker`]: drives the prober over a slice of hosts × every port
//! - [`Scanner`]: partitions the host list and runs one worker per batch
//!
//! Every submitted (host, port) pair yields exactly one [`ScanResult`].

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod facts;
pub mod probe;
pub mod result;
pub mod verifier;
pub mod worker;

pub use context::{Interrupted, ProbeContext};
pub use dispatcher::{Scanner, batches};
pub use error::ProbeError;
pub use facts::{CertificateFacts, LeafCertificate};
pub use probe::{Prober, ensure_crypto_provider};
pub use result::{EXPIRY_SENTINEL_DAYS, ProbeTarget, ScanResult, days_until_expiry};
pub use verifier::{ChainStatus, ChainVerifier, NoVerifier, load_root_store};
pub use worker::BatchWorker;
