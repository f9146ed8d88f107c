//! Target discovery.
//!
//! Each source yields a [`TargetSet`]; CIDR expansion and port merging happen
//! afterwards in [`crate::targets`].

pub mod azure;
pub mod cloudflare;
pub mod file;
pub mod gitlab;
pub mod route53;

pub use azure::AzureSource;
pub use cloudflare::CloudflareSource;
pub use gitlab::GitLabSource;
pub use route53::Route53Source;

use crate::targets::TargetSet;
use anyhow::Result;
use reqwest::Client;
use std::path::PathBuf;

/// Where the target list comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSource {
    Config { path: PathBuf },
    GitLab(GitLabSource),
    Cloudflare(CloudflareSource),
    Route53(Route53Source),
    Azure(AzureSource),
}

impl TargetSource {
    /// Value of `--type` selecting this source
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::GitLab(_) => "gitlab",
            Self::Cloudflare(_) => "cloudflare",
            Self::Route53(_) => "zone",
            Self::Azure(_) => "azure",
        }
    }

    /// Fetch the raw target list
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or returns an invalid list
    pub async fn fetch(&self, client: &Client) -> Result<TargetSet> {
        match self {
            Self::Config { path } => file::fetch(path).await,
            Self::GitLab(source) => source.fetch(client).await,
            Self::Cloudflare(source) => source.fetch(client).await,
            Self::Route53(source) => source.fetch().await,
            Self::Azure(source) => source.fetch(client).await,
        }
    }
}
