//! Alert delivery.
//!
//! Channels are built only for configured credentials. A failing channel is
//! reported to the caller and never affects the others.

pub mod pagerduty;
pub mod slack;
pub mod teams;
pub mod zoom;

pub use pagerduty::PagerDuty;
pub use slack::Slack;
pub use teams::Teams;
pub use zoom::Zoom;

use crate::{metrics::ALERTS_SENT, scan::ScanResult};
use anyhow::Result;
use reqwest::Client;
use tracing::{error, info};

/// Credentials for every supported channel; unset ones are skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertSettings {
    pub pagerduty_key: Option<String>,
    pub slack_webhook: Option<String>,
    pub teams_webhook: Option<String>,
    pub zoom_webhook: Option<String>,
}

impl AlertSettings {
    /// One channel per configured credential
    #[must_use]
    pub fn channels(&self) -> Vec<AlertChannel> {
        let mut channels = Vec::new();

        if let Some(key) = configured(self.pagerduty_key.as_deref()) {
            channels.push(AlertChannel::PagerDuty(PagerDuty::new(key)));
        }
        if let Some(url) = configured(self.slack_webhook.as_deref()) {
            channels.push(AlertChannel::Slack(Slack { webhook_url: url }));
        }
        if let Some(url) = configured(self.teams_webhook.as_deref()) {
            channels.push(AlertChannel::Teams(Teams { webhook_url: url }));
        }
        if let Some(url) = configured(self.zoom_webhook.as_deref()) {
            channels.push(AlertChannel::Zoom(Zoom { webhook_url: url }));
        }

        channels
    }
}

fn configured(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// A notification target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertChannel {
    PagerDuty(PagerDuty),
    Slack(Slack),
    Teams(Teams),
    Zoom(Zoom),
}

impl AlertChannel {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PagerDuty(_) => "pagerduty",
            Self::Slack(_) => "slack",
            Self::Teams(_) => "teams",
            Self::Zoom(_) => "zoom",
        }
    }

    /// Deliver the alerts this channel cares about; no-op when nothing qualifies
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails
    pub async fn send(&self, client: &Client, results: &[ScanResult], alert_days: i64) -> Result<()> {
        match self {
            Self::PagerDuty(channel) => channel.send(client, results, alert_days).await,
            Self::Slack(channel) => channel.send(client, results, alert_days).await,
            Self::Teams(channel) => channel.send(client, results, alert_days).await,
            Self::Zoom(channel) => channel.send(client, results, alert_days).await,
        }
    }
}

/// Send through every channel; returns how many failed
pub async fn notify_all(
    channels: &[AlertChannel],
    client: &Client,
    results: &[ScanResult],
    alert_days: i64,
) -> usize {
    let mut failures = 0;

    for channel in channels {
        match channel.send(client, results, alert_days).await {
            Ok(()) => {
                ALERTS_SENT
                    .with_label_values(&[channel.name(), "success"])
                    .inc();
                info!(provider = channel.name(), "alerts delivered");
            }
            Err(e) => {
                failures += 1;
                ALERTS_SENT
                    .with_label_values(&[channel.name(), "error"])
                    .inc();
                error!(provider = channel.name(), error = %format!("{e:#}"), "alert delivery failed");
            }
        }
    }

    failures
}

/// Certificate expires within `alert_days` (or already has)
#[must_use]
pub fn is_expiring(result: &ScanResult, alert_days: i64) -> bool {
    !result.is_failure() && result.days_until_expiry <= alert_days
}

/// Expiring, or the probe failed
#[must_use]
pub fn needs_attention(result: &ScanResult, alert_days: i64) -> bool {
    result.is_failure() || result.days_until_expiry <= alert_days
}
