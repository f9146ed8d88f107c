use super::is_expiring;
use crate::{http::post_json, scan::ScanResult};
use anyhow::{Result, bail};
use reqwest::Client;
use serde::Serialize;
use std::fmt::Write as _;

/// Zoom Team Chat incoming webhook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zoom {
    pub webhook_url: String,
}

#[derive(Debug, Serialize)]
pub struct ZoomMessage {
    pub content: Content,
}

#[derive(Debug, Serialize)]
pub struct Content {
    pub head: Head,
    pub body: Vec<Body>,
}

#[derive(Debug, Serialize)]
pub struct Head {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct Body {
    #[serde(rename = "type")]
    pub body_type: &'static str,
    pub text: String,
}

impl Zoom {
    /// Post one message listing certificates within `alert_days` of expiry
    ///
    /// # Errors
    ///
    /// Returns an error if the webhook cannot be reached or answers with an error status
    pub async fn send(&self, client: &Client, results: &[ScanResult], alert_days: i64) -> Result<()> {
        let Some(message) = message(results, alert_days) else {
            return Ok(());
        };

        let url = full_format_url(&self.webhook_url);
        let status = post_json(client, &url, &message).await?;
        if status.is_client_error() || status.is_server_error() {
            bail!("received bad status from zoom: {status}");
        }

        Ok(())
    }
}

/// Ask for the structured `format=full` payload unless a format is already set
#[must_use]
pub fn full_format_url(webhook_url: &str) -> String {
    if webhook_url.contains("format=") {
        webhook_url.to_string()
    } else if webhook_url.contains('?') {
        format!("{webhook_url}&format=full")
    } else {
        format!("{webhook_url}?format=full")
    }
}

/// Message body, or `None` when no certificate is close to expiry
#[must_use]
pub fn message(results: &[ScanResult], alert_days: i64) -> Option<ZoomMessage> {
    let expiring: Vec<&ScanResult> = results
        .iter()
        .filter(|result| is_expiring(result, alert_days))
        .collect();

    if expiring.is_empty() {
        return None;
    }

    let mut text = format!("The following certificates expire within {alert_days} days:\n");
    for result in expiring {
        let _ = writeln!(
            text,
            "- {} (Expires in {} days)",
            result.domain, result.days_until_expiry
        );
    }

    Some(ZoomMessage {
        content: Content {
            head: Head {
                text: "SSL Certificate Alert".to_string(),
            },
            body: vec![Body {
                body_type: "message",
                text,
            }],
        },
    })
}
