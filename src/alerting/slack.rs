use super::needs_attention;
use crate::{http::post_json, scan::ScanResult};
use anyhow::{Result, bail};
use reqwest::{Client, StatusCode};
use serde::Serialize;

const FOOTER: &str = "certsweep";

/// Slack incoming webhook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slack {
    pub webhook_url: String,
}

#[derive(Debug, Serialize)]
pub struct SlackMessage {
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
pub struct Attachment {
    pub color: &'static str,
    pub title: String,
    pub text: String,
    pub footer: &'static str,
}

impl Slack {
    /// Post one message covering every expiring or failed target
    ///
    /// # Errors
    ///
    /// Returns an error if the webhook cannot be reached or does not answer 200
    pub async fn send(&self, client: &Client, results: &[ScanResult], alert_days: i64) -> Result<()> {
        let Some(message) = message(results, alert_days) else {
            return Ok(());
        };

        let status = post_json(client, &self.webhook_url, &message).await?;
        if status != StatusCode::OK {
            bail!("slack API returned non-200 status: {status}");
        }

        Ok(())
    }
}

/// Message body, or `None` when nothing needs attention
#[must_use]
pub fn message(results: &[ScanResult], alert_days: i64) -> Option<SlackMessage> {
    let attachments: Vec<Attachment> = results
        .iter()
        .filter(|result| needs_attention(result, alert_days))
        .map(attachment)
        .collect();

    if attachments.is_empty() {
        return None;
    }

    Some(SlackMessage {
        text: format!(
            ":warning: Found {} SSL certificates expiring within {alert_days} days (or errors)",
            attachments.len()
        ),
        attachments,
    })
}

fn attachment(result: &ScanResult) -> Attachment {
    let (color, status) = match &result.error {
        Some(error) => ("danger", format!("Error: {error}")),
        None if result.days_until_expiry < 2 => (
            "danger",
            format!("Expiring in {} days", result.days_until_expiry),
        ),
        None => (
            "warning",
            format!("Expiring in {} days", result.days_until_expiry),
        ),
    };

    Attachment {
        color,
        title: format!("{} (Port: {})", result.domain, result.port),
        text: format!(
            "Common Name: {}\nStatus: {status}\nIP: {}",
            result.common_name, result.ip_address
        ),
        footer: FOOTER,
    }
}
