//! Target lists: the on-disk format, port handling and CIDR expansion.

use anyhow::{Context, Result, anyhow, bail};
use ipnet::{IpNet, Ipv4AddrRange, Ipv6AddrRange};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Ports probed when neither the target source nor the CLI names any
pub const DEFAULT_PORTS: [u16; 3] = [443, 5091, 5061];

// Largest CIDR block expanded: 2^16 addresses
const MAX_CIDR_HOST_BITS: u8 = 16;

/// Targets as delivered by a discovery source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSet {
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub cidr: Vec<String>,
}

/// Fully resolved scan input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    pub domains: Vec<String>,
    pub ports: Vec<u16>,
}

impl Workload {
    /// Number of (domain, port) pairs
    #[must_use]
    pub fn len(&self) -> usize {
        self.domains.len().saturating_mul(self.ports.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TargetSet {
    /// Parse a JSON target document
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is not a valid target document
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).context("failed to parse target list")
    }

    /// Expand CIDR blocks, merge `cli_ports` and apply the default port list.
    ///
    /// Domains keep their first-seen order; duplicates are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if a CIDR block is invalid or too large, or if no
    /// domain remains
    pub fn resolve(self, cli_ports: &[u16]) -> Result<Workload> {
        let mut domains = self.domains;

        for block in &self.cidr {
            debug!(cidr = %block, "expanding cidr");
            let addresses =
                expand_cidr(block).with_context(|| format!("cidr error: {block}"))?;
            domains.extend(addresses);
        }

        let mut seen = HashSet::new();
        domains.retain(|domain| !domain.trim().is_empty() && seen.insert(domain.clone()));

        if domains.is_empty() {
            bail!("no domains found to test");
        }

        let mut ports = merge_ports(&self.ports, cli_ports);
        if ports.is_empty() {
            ports = DEFAULT_PORTS.to_vec();
        }

        Ok(Workload { domains, ports })
    }
}

/// Parse a comma-separated port list; an empty string yields no ports
///
/// # Errors
///
/// Returns an error on a non-numeric, empty or zero entry
pub fn parse_ports(input: &str) -> Result<Vec<u16>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }

    input
        .split(',')
        .map(|part| {
            let part = part.trim();
            match part.parse::<u16>() {
                Ok(0) | Err(_) => Err(anyhow!("invalid port value: {part:?}")),
                Ok(port) => Ok(port),
            }
        })
        .collect()
}

/// Union of both lists, sorted ascending
#[must_use]
pub fn merge_ports(configured: &[u16], cli: &[u16]) -> Vec<u16> {
    configured
        .iter()
        .chain(cli)
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Every address in `block`, network and broadcast included
///
/// # Errors
///
/// Returns an error if `block` is not a CIDR or spans more than 2^16 addresses
pub fn expand_cidr(block: &str) -> Result<Vec<String>> {
    let net: IpNet = block
        .trim()
        .parse()
        .map_err(|e| anyhow!("failed to parse CIDR {block:?}: {e}"))?;

    let host_bits = net.max_prefix_len().saturating_sub(net.prefix_len());
    if host_bits > MAX_CIDR_HOST_BITS {
        bail!("CIDR {block} is too large (/{} minimum)", net.max_prefix_len() - MAX_CIDR_HOST_BITS);
    }

    let addresses = match net {
        IpNet::V4(v4) => Ipv4AddrRange::new(v4.network(), v4.broadcast())
            .map(|ip| ip.to_string())
            .collect(),
        IpNet::V6(v6) => Ipv6AddrRange::new(v6.network(), v6.broadcast())
            .map(|ip| ip.to_string())
            .collect(),
    };

    Ok(addresses)
}
