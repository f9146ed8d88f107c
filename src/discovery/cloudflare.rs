use crate::targets::TargetSet;
use anyhow::{Context, Result, bail};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

const PER_PAGE: u32 = 100;

const RECORD_TYPES: &str = "A,CNAME";

/// A and CNAME records of one Cloudflare zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudflareSource {
    pub token: String,
    pub zone_id: String,
    pub base_url: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    #[serde(default)]
    result: Option<Vec<DnsRecord>>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DnsRecord {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub record_type: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    page: u32,
    total_pages: u32,
}

impl CloudflareSource {
    #[must_use]
    pub fn new(token: impl Into<String>, zone_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            zone_id: zone_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// List the zone's DNS records and keep the names of A and CNAME records
    ///
    /// # Errors
    ///
    /// Returns an error if a request fails or the API reports failure
    pub async fn fetch(&self, client: &Client) -> Result<TargetSet> {
        let url = format!(
            "{}/zones/{}/dns_records",
            self.base_url.trim_end_matches('/'),
            self.zone_id
        );

        let mut records = Vec::new();
        let mut page = 1_u32;
        loop {
            let response = client
                .get(&url)
                .bearer_auth(&self.token)
                .query(&[("type", RECORD_TYPES)])
                .query(&[("page", page), ("per_page", PER_PAGE)])
                .send()
                .await
                .context("failed to fetch DNS records")?;

            let status = response.status();
            let body: ListResponse = response
                .json()
                .await
                .with_context(|| format!("invalid Cloudflare response ({status})"))?;

            if !body.success {
                let reasons: Vec<String> = body
                    .errors
                    .iter()
                    .map(|e| format!("{}: {}", e.code, e.message))
                    .collect();
                bail!("Cloudflare API error ({status}): {}", reasons.join(", "));
            }

            let batch = body.result.unwrap_or_default();
            debug!(page, records = batch.len(), "fetched dns records");
            records.extend(batch);

            match body.result_info {
                Some(info) if info.page < info.total_pages => page = info.page.saturating_add(1),
                _ => break,
            }
        }

        Ok(TargetSet {
            domains: record_names(&records),
            ..TargetSet::default()
        })
    }
}

/// Non-empty names of A and CNAME records, whatever the server-side filter returned
#[must_use]
pub fn record_names(records: &[DnsRecord]) -> Vec<String> {
    records
        .iter()
        .filter(|record| matches!(record.record_type.as_str(), "A" | "CNAME"))
        .filter(|record| !record.name.is_empty())
        .map(|record| record.name.clone())
        .collect()
}
