use super::is_expiring;
use crate::{http::post_json, scan::ScanResult};
use anyhow::{Result, bail};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const EVENTS_API_URL: &str = "https://events.pagerduty.com/v2/enqueue";

const SOURCE: &str = "certsweep";

/// PagerDuty Events API v2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagerDuty {
    pub routing_key: String,
    pub endpoint: String,
}

impl PagerDuty {
    #[must_use]
    pub fn new(routing_key: impl Into<String>) -> Self {
        Self {
            routing_key: routing_key.into(),
            endpoint: EVENTS_API_URL.to_string(),
        }
    }

    /// Trigger one event per expiring certificate
    ///
    /// Every event is attempted even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns an error if any event was not accepted
    pub async fn send(&self, client: &Client, results: &[ScanResult], alert_days: i64) -> Result<()> {
        let events = events(&self.routing_key, results, alert_days);
        let total = events.len();
        let mut failed = 0_usize;

        for event in &events {
            match post_json(client, &self.endpoint, event).await {
                Ok(StatusCode::ACCEPTED) => {
                    debug!(dedup_key = %event.dedup_key, "pagerduty event accepted");
                }
                Ok(status) => {
                    failed += 1;
                    warn!(dedup_key = %event.dedup_key, %status, "pagerduty rejected event");
                }
                Err(e) => {
                    failed += 1;
                    warn!(dedup_key = %event.dedup_key, error = %format!("{e:#}"), "pagerduty request failed");
                }
            }
        }

        if failed > 0 {
            bail!("{failed} of {total} PagerDuty events failed");
        }

        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct Event {
    pub routing_key: String,
    pub event_action: &'static str,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dedup_key: String,
    pub payload: EventPayload,
    pub client: &'static str,
}

#[derive(Debug, Serialize)]
pub struct EventPayload {
    pub summary: String,
    pub source: &'static str,
    pub severity: &'static str,
    pub component: &'static str,
    pub custom_details: BTreeMap<&'static str, String>,
}

/// `trigger` events for every certificate within `alert_days` of expiry
#[must_use]
pub fn events(routing_key: &str, results: &[ScanResult], alert_days: i64) -> Vec<Event> {
    results
        .iter()
        .filter(|result| is_expiring(result, alert_days))
        .map(|result| {
            let not_after = result
                .not_after
                .map(|date| date.to_rfc3339())
                .unwrap_or_default();

            Event {
                routing_key: routing_key.to_string(),
                event_action: "trigger",
                dedup_key: result.common_name.clone(),
                payload: EventPayload {
                    summary: format!(
                        "Certificate Expiration - {} using {}",
                        result.domain, result.common_name
                    ),
                    source: SOURCE,
                    severity: "info",
                    component: "Certificate",
                    custom_details: BTreeMap::from([
                        ("Domain", result.domain.clone()),
                        ("Port", result.port.to_string()),
                        ("NotAfter", not_after),
                        ("DaysUntilExpiry", result.days_until_expiry.to_string()),
                        ("CommonName", result.common_name.clone()),
                    ]),
                },
                client: SOURCE,
            }
        })
        .collect()
}
