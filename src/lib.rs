//! Concurrent TLS certificate scanner.
//!
//! Targets come from a JSON file, a GitLab repository, or a Cloudflare,
//! Route53 or Azure DNS zone.
//! Each `(host, port)` pair is probed once per sweep; results carry chain
//! trust, the negotiated protocol and cipher, and days until expiry.

pub mod alerting;
pub mod cli;
pub mod discovery;
pub mod http;
pub mod metrics;
pub mod output;
pub mod scan;
pub mod sweep;
pub mod targets;
pub mod telemetry;
