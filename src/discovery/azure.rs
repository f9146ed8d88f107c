use crate::{http::redact, targets::TargetSet};
use anyhow::{Context, Result, bail};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_LOGIN_URL: &str = "https://login.microsoftonline.com";
pub const DEFAULT_MANAGEMENT_URL: &str = "https://management.azure.com";

const SCOPE: &str = "https://management.azure.com/.default";
const API_VERSION: &str = "2018-05-01";

/// A and CNAME records of one Azure DNS zone, read with a service principal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureSource {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub subscription_id: String,
    pub resource_group: String,
    pub zone: String,
    pub login_url: String,
    pub management_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct RecordSetPage {
    #[serde(default)]
    value: Vec<RecordSet>,
    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordSet {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub properties: RecordSetProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordSetProperties {
    #[serde(rename = "ARecords", default)]
    pub a_records: Vec<serde_json::Value>,
    #[serde(rename = "CNAMERecord")]
    pub cname_record: Option<serde_json::Value>,
}

impl AzureSource {
    /// Exchange the client credentials for a management API token
    async fn token(&self, client: &Client) -> Result<String> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.login_url.trim_end_matches('/'),
            self.tenant_id
        );

        let response = client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", SCOPE),
            ])
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("token request to {} failed", redact(&url)))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Azure login returned {status} for tenant {}", self.tenant_id);
        }

        let body: TokenResponse = response
            .json()
            .await
            .context("invalid Azure token response")?;

        Ok(body.access_token)
    }

    fn record_sets_url(&self) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/dnsZones/{}/recordsets?api-version={API_VERSION}",
            self.management_url.trim_end_matches('/'),
            self.subscription_id,
            self.resource_group,
            self.zone
        )
    }

    /// List the zone's record sets and keep the names of A and CNAME records
    ///
    /// # Errors
    ///
    /// Returns an error if authentication or a listing request fails
    pub async fn fetch(&self, client: &Client) -> Result<TargetSet> {
        let token = self.token(client).await?;

        let mut sets = Vec::new();
        let mut next = Some(self.record_sets_url());
        while let Some(url) = next.take() {
            let response = client
                .get(&url)
                .bearer_auth(&token)
                .send()
                .await
                .context("failed to list Azure DNS record sets")?;

            let status = response.status();
            if !status.is_success() {
                bail!("Azure DNS returned {status} for zone {}", self.zone);
            }

            let page: RecordSetPage = response
                .json()
                .await
                .with_context(|| format!("invalid Azure DNS response ({status})"))?;

            debug!(records = page.value.len(), "fetched azure record sets");
            sets.extend(page.value);
            next = page.next_link.filter(|link| !link.is_empty());
        }

        Ok(TargetSet {
            domains: record_names(&sets, &self.zone),
            ..TargetSet::default()
        })
    }
}

/// Fully qualified names of record sets holding A or CNAME data; `@` is the apex
#[must_use]
pub fn record_names(sets: &[RecordSet], zone: &str) -> Vec<String> {
    sets.iter()
        .filter(|set| !set.properties.a_records.is_empty() || set.properties.cname_record.is_some())
        .filter(|set| !set.name.is_empty())
        .map(|set| {
            if set.name == "@" {
                zone.to_string()
            } else {
                format!("{}.{zone}", set.name)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::http::stub::{Stub, client};

    fn source(login_url: &str, management_url: &str) -> AzureSource {
        AzureSource {
            tenant_id: "tenant".to_string(),
            client_id: "app".to_string(),
            client_secret: "s3cret".to_string(),
            subscription_id: "sub".to_string(),
            resource_group: "dns-rg".to_string(),
            zone: "example.com".to_string(),
            login_url: login_url.to_string(),
            management_url: management_url.to_string(),
        }
    }

    fn parse(body: &str) -> Vec<RecordSet> {
        serde_json::from_str::<RecordSetPage>(body).unwrap().value
    }

    #[test]
    fn test_record_names_maps_apex_and_types() {
        let sets = parse(
            r#"{"value": [
                {"name": "@", "type": "Microsoft.Network/dnszones/A", "properties": {"ARecords": [{"ipv4Address": "192.0.2.1"}]}},
                {"name": "www", "type": "Microsoft.Network/dnszones/CNAME", "properties": {"CNAMERecord": {"cname": "example.com"}}},
                {"name": "@", "type": "Microsoft.Network/dnszones/NS", "properties": {"NSRecords": [{"nsdname": "ns1.example.net."}]}},
                {"name": "mail", "type": "Microsoft.Network/dnszones/MX", "properties": {"MXRecords": []}},
                {"name": "empty", "type": "Microsoft.Network/dnszones/A", "properties": {"ARecords": []}}
            ]}"#,
        );
        assert_eq!(
            record_names(&sets, "example.com"),
            vec!["example.com", "www.example.com"]
        );
    }

    #[test]
    fn test_record_sets_url() {
        assert_eq!(
            source(DEFAULT_LOGIN_URL, "https://management.azure.com/").record_sets_url(),
            "https://management.azure.com/subscriptions/sub/resourceGroups/dns-rg/providers/Microsoft.Network/dnsZones/example.com/recordsets?api-version=2018-05-01"
        );
    }

    #[tokio::test]
    async fn test_fetch_authenticates_and_follows_next_link() {
        let stub = Stub::start(vec![
            (
                200,
                r#"{"token_type": "Bearer", "expires_in": 3599, "access_token": "azure-token"}"#,
            ),
            (
                200,
                r#"{"value": [
                    {"name": "@", "properties": {"ARecords": [{"ipv4Address": "192.0.2.1"}]}},
                    {"name": "@", "properties": {"TXTRecords": [{"value": ["v=spf1 -all"]}]}}
                ], "nextLink": "{base}/recordsets/page2"}"#,
            ),
            (
                200,
                r#"{"value": [
                    {"name": "api", "properties": {"CNAMERecord": {"cname": "example.com"}}}
                ]}"#,
            ),
        ])
        .await;

        let targets = source(&stub.url, &stub.url).fetch(&client()).await.unwrap();
        assert_eq!(targets.domains, vec!["example.com", "api.example.com"]);

        let requests = stub.requests();
        assert_eq!(requests.len(), 3);

        let login = requests.first().unwrap();
        assert_eq!(login.method, "POST");
        assert_eq!(login.target, "/tenant/oauth2/v2.0/token");
        assert!(login.body.contains("grant_type=client_credentials"));
        assert!(login.body.contains("client_id=app"));
        assert!(login.body.contains("client_secret=s3cret"));

        let first_page = requests.get(1).unwrap();
        assert_eq!(first_page.method, "GET");
        assert_eq!(
            first_page.target,
            "/subscriptions/sub/resourceGroups/dns-rg/providers/Microsoft.Network/dnsZones/example.com/recordsets?api-version=2018-05-01"
        );
        assert_eq!(first_page.header("authorization"), Some("Bearer azure-token"));

        let second_page = requests.get(2).unwrap();
        assert_eq!(second_page.target, "/recordsets/page2");
        assert_eq!(second_page.header("authorization"), Some("Bearer azure-token"));
    }

    #[tokio::test]
    async fn test_fetch_zone_not_found() {
        let stub = Stub::start(vec![
            (200, r#"{"access_token": "azure-token"}"#),
            (404, r#"{"error": {"code": "ResourceNotFound"}}"#),
        ])
        .await;

        let err = source(&stub.url, &stub.url).fetch(&client()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Azure DNS returned 404 Not Found for zone example.com"
        );
    }

    #[tokio::test]
    async fn test_fetch_rejected_credentials() {
        let login = Stub::start(vec![(401, r#"{"error": "invalid_client"}"#)]).await;

        let err = source(&login.url, &login.url)
            .fetch(&client())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"));
        assert_eq!(login.requests().len(), 1);
    }
}
