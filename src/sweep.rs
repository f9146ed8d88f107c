use crate::{
    alerting::{AlertSettings, notify_all},
    discovery::TargetSource,
    http,
    metrics::{LAST_SCAN, SCAN_DURATION, TARGETS, write_textfile},
    output,
    scan::{Prober, ScanResult, Scanner, load_root_store},
    targets::Workload,
};
use anyhow::{Context, Result};
use chrono::Utc;
use std::{num::NonZeroUsize, path::PathBuf, time::Duration};
use tracing::{info, warn};

/// Everything one sweep needs, resolved from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepConfig {
    pub source: TargetSource,
    pub ports: Vec<u16>,
    pub timeout: Duration,
    pub split: NonZeroUsize,
    pub alert_days: i64,
    pub alerts: AlertSettings,
    pub output: Option<PathBuf>,
    pub ca_file: Option<PathBuf>,
    pub metrics_file: Option<PathBuf>,
}

/// Outcome counts of a finished sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub failed: usize,
    pub expiring: usize,
}

impl Summary {
    #[must_use]
    pub fn from_results(results: &[ScanResult], alert_days: i64) -> Self {
        Self {
            total: results.len(),
            failed: results.iter().filter(|r| r.is_failure()).count(),
            expiring: results
                .iter()
                .filter(|r| crate::alerting::is_expiring(r, alert_days))
                .count(),
        }
    }
}

/// Load targets, scan them, then alert and persist
///
/// Alert delivery failures are logged and do not fail the sweep.
///
/// # Errors
///
/// Returns an error if targets cannot be loaded, the trust store or TLS client
/// cannot be built, or output files cannot be written
pub async fn start(config: SweepConfig) -> Result<()> {
    info!(
        source = config.source.kind(),
        timeout = ?config.timeout,
        split = config.split.get(),
        "configuration loaded"
    );

    let client = http::client()?;
    let workload = load_workload(&config, &client).await?;
    info!(
        domains = workload.domains.len(),
        ports = ?workload.ports,
        "targets loaded"
    );

    let root_store = load_root_store(config.ca_file.as_deref()).await?;
    let prober = Prober::with_root_certificates(root_store)?;
    let scanner = Scanner::new(prober, config.timeout, config.split);

    let shutdown = scanner.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling in-flight probes");
            shutdown.cancel();
        }
    });

    let reference = Utc::now();
    TARGETS.set(i64::try_from(workload.len()).unwrap_or(i64::MAX));
    let timer = SCAN_DURATION.start_timer();
    let mut results = scanner
        .scan(&workload.domains, &workload.ports, reference)
        .await;
    let elapsed = timer.stop_and_record();
    LAST_SCAN.set(Utc::now().timestamp());

    let summary = Summary::from_results(&results, config.alert_days);
    info!(
        results = summary.total,
        failed = summary.failed,
        expiring = summary.expiring,
        duration_seconds = elapsed,
        "scan completed"
    );

    let channels = config.alerts.channels();
    if !channels.is_empty() {
        let failures = notify_all(&channels, &client, &results, config.alert_days).await;
        if failures > 0 {
            warn!(failures, "some alert channels failed");
        }
    }

    if let Some(prefix) = config.output.clone() {
        let files = tokio::task::spawn_blocking(move || {
            output::write(&prefix, &mut results, Utc::now())
        })
        .await
        .context("output writer task failed")??;
        info!(
            json = %files.json.display(),
            csv = %files.csv.display(),
            "results saved"
        );
    }

    if let Some(path) = &config.metrics_file {
        write_textfile(path).await?;
        info!(path = %path.display(), "metrics written");
    }

    Ok(())
}

async fn load_workload(config: &SweepConfig, client: &reqwest::Client) -> Result<Workload> {
    let targets = config
        .source
        .fetch(client)
        .await
        .with_context(|| format!("failed to fetch targets from {}", config.source.kind()))?;

    targets.resolve(&config.ports)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::scan::{ProbeError, ProbeTarget};
    use std::io::Write;

    #[test]
    fn test_summary() {
        let mut ok = ScanResult::failure(&ProbeTarget::new("a.example", 443), &ProbeError::NoCertificate);
        ok.error = None;
        ok.days_until_expiry = 3;
        let failed = ScanResult::failure(&ProbeTarget::new("b.example", 443), &ProbeError::NoCertificate);

        let summary = Summary::from_results(&[ok, failed], 5);
        assert_eq!(
            summary,
            Summary {
                total: 2,
                failed: 1,
                expiring: 1
            }
        );
    }

    #[tokio::test]
    async fn test_load_workload_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"domains": ["example.com"], "cidr": ["10.0.0.0/31"]}"#)
            .unwrap();

        let config = SweepConfig {
            source: TargetSource::Config {
                path: file.path().to_path_buf(),
            },
            ports: vec![8443],
            timeout: Duration::from_secs(1),
            split: NonZeroUsize::new(30).unwrap(),
            alert_days: 5,
            alerts: AlertSettings::default(),
            output: None,
            ca_file: None,
            metrics_file: None,
        };

        let workload = load_workload(&config, &http::client().unwrap()).await.unwrap();
        assert_eq!(workload.domains, vec!["example.com", "10.0.0.0", "10.0.0.1"]);
        assert_eq!(workload.ports, vec![8443]);
    }

    #[tokio::test]
    async fn test_start_fails_without_targets() {
        let config = SweepConfig {
            source: TargetSource::Config {
                path: PathBuf::from("/nonexistent/certsweep.json"),
            },
            ports: Vec::new(),
            timeout: Duration::from_secs(1),
            split: NonZeroUsize::new(30).unwrap(),
            alert_days: 5,
            alerts: AlertSettings::default(),
            output: None,
            ca_file: None,
            metrics_file: None,
        };

        assert!(start(config).await.is_err());
    }
}
