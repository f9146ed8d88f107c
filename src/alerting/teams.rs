use super::needs_attention;
use crate::{http::post_json, scan::ScanResult};
use anyhow::{Result, bail};
use reqwest::{Client, StatusCode};
use serde::Serialize;

/// Microsoft Teams incoming webhook (legacy `MessageCard` format)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teams {
    pub webhook_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageCard {
    #[serde(rename = "@type")]
    pub card_type: &'static str,
    #[serde(rename = "@context")]
    pub context: &'static str,
    pub theme_color: &'static str,
    pub summary: String,
    pub sections: Vec<Section>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub activity_title: String,
    pub activity_subtitle: String,
    pub facts: Vec<Fact>,
    pub markdown: bool,
}

#[derive(Debug, Serialize)]
pub struct Fact {
    pub name: &'static str,
    pub value: String,
}

impl Teams {
    /// Post one card covering every expiring or failed target
    ///
    /// # Errors
    ///
    /// Returns an error if the webhook cannot be reached or does not answer 200
    pub async fn send(&self, client: &Client, results: &[ScanResult], alert_days: i64) -> Result<()> {
        let Some(card) = card(results, alert_days) else {
            return Ok(());
        };

        let status = post_json(client, &self.webhook_url, &card).await?;
        if status != StatusCode::OK {
            bail!("teams API returned non-200 status: {status}");
        }

        Ok(())
    }
}

/// Card body, or `None` when nothing needs attention
#[must_use]
pub fn card(results: &[ScanResult], alert_days: i64) -> Option<MessageCard> {
    let sections: Vec<Section> = results
        .iter()
        .filter(|result| needs_attention(result, alert_days))
        .map(section)
        .collect();

    if sections.is_empty() {
        return None;
    }

    Some(MessageCard {
        card_type: "MessageCard",
        context: "http://schema.org/extensions",
        theme_color: "d70000",
        summary: format!(
            "Found {} SSL certificates expiring within {alert_days} days",
            sections.len()
        ),
        sections,
    })
}

fn section(result: &ScanResult) -> Section {
    let status = result.error.as_ref().map_or_else(
        || format!("Expiring in {} days", result.days_until_expiry),
        |error| format!("Error: {error}"),
    );

    Section {
        activity_title: format!("{} (Port: {})", result.domain, result.port),
        activity_subtitle: status,
        facts: vec![
            Fact {
                name: "Common Name",
                value: result.common_name.clone(),
            },
            Fact {
                name: "IP Address",
                value: result.ip_address.clone(),
            },
            Fact {
                name: "Not After",
                value: result
                    .not_after
                    .map(|date| date.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
            },
            Fact {
                name: "Chain Status",
                value: result.chain_status.clone(),
            },
        ],
        markdown: true,
    }
}
