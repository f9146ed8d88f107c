use super::{ProbeContext, ProbeTarget, Prober, ScanResult};
use crate::metrics::{
    CERT_EXPIRY_DAYS, CHAIN_STATUS, PROBE_DURATION, PROBE_ERRORS, PROBES_TOTAL, TLS_INFO,
};
use chrono::{DateTime, Utc};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Probes one contiguous slice of hosts against every configured port.
///
/// Targets are visited host-major, port-minor and results are sent in that
/// order. The worker finishes when its slice is exhausted.
#[derive(Clone, Debug)]
pub struct BatchWorker {
    prober: Arc<Prober>,
    ports: Arc<[u16]>,
    timeout: Duration,
    reference: DateTime<Utc>,
    shutdown: CancellationToken,
}

impl BatchWorker {
    #[must_use]
    pub const fn new(
        prober: Arc<Prober>,
        ports: Arc<[u16]>,
        timeout: Duration,
        reference: DateTime<Utc>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            prober,
            ports,
            timeout,
            reference,
            shutdown,
        }
    }

    /// Probe every `hosts × ports` pair and send one result per pair to `sink`
    pub async fn run(self, hosts: Vec<String>, sink: mpsc::Sender<ScanResult>) {
        for host in hosts {
            for &port in self.ports.iter() {
                let target = ProbeTarget::new(host.clone(), port);
                let result = self.scan_target(&target).await;

                if sink.send(result).await.is_err() {
                    warn!(%target, "result channel closed, abandoning batch");
                    return;
                }
            }
        }
    }

    /// Probe a single target under a fresh deadline
    pub async fn scan_target(&self, target: &ProbeTarget) -> ScanResult {
        debug!(%target, "probing");

        let outcome = {
            // Scope is released as soon as the probe returns
            let ctx = ProbeContext::child_of(&self.shutdown, self.timeout);
            let timer = PROBE_DURATION.start_timer();
            let outcome = self.prober.probe(&ctx, &target.host, target.port).await;
            timer.observe_duration();
            outcome
        };

        match outcome {
            Ok(facts) => {
                PROBES_TOTAL.with_label_values(&["success"]).inc();
                let port = target.port.to_string();
                CHAIN_STATUS
                    .with_label_values(&[
                        target.host.as_str(),
                        port.as_str(),
                        facts.chain_status.label(),
                    ])
                    .set(1);
                TLS_INFO
                    .with_label_values(&[
                        target.host.as_str(),
                        port.as_str(),
                        facts.tls_version.as_str(),
                        facts.cipher_suite.as_str(),
                    ])
                    .set(1);

                if !facts.chain_status.is_ok() {
                    info!(%target, chain_status = %facts.chain_status, "certificate chain not trusted");
                }

                let result = ScanResult::success(target, facts, self.reference);
                CERT_EXPIRY_DAYS
                    .with_label_values(&[target.host.as_str(), port.as_str()])
                    .set(result.days_until_expiry);
                debug!(
                    %target,
                    days_until_expiry = result.days_until_expiry,
                    chain_status = %result.chain_status,
                    tls_version = %result.tls_version,
                    "probe succeeded"
                );
                result
            }
            Err(err) => {
                PROBES_TOTAL.with_label_values(&["error"]).inc();
                PROBE_ERRORS.with_label_values(&[err.kind()]).inc();
                warn!(%target, kind = err.kind(), error = %err, "probe failed");
                ScanResult::failure(target, &err)
            }
        }
    }
}
