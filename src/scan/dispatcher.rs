use super::{BatchWorker, ProbeError, ProbeTarget, Prober, ScanResult};
use crate::metrics::PANICS_RECOVERED;
use chrono::{DateTime, Utc};
use std::{collections::HashSet, num::NonZeroUsize, slice::Chunks, sync::Arc, time::Duration};
use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Fans a target list out across concurrent batch workers
#[derive(Debug)]
pub struct Scanner {
    prober: Arc<Prober>,
    timeout: Duration,
    batch_size: NonZeroUsize,
    shutdown: CancellationToken,
}

impl Scanner {
    #[must_use]
    pub fn new(prober: Prober, timeout: Duration, batch_size: NonZeroUsize) -> Self {
        Self {
            prober: Arc::new(prober),
            timeout,
            batch_size,
            shutdown: CancellationToken::new(),
        }
    }

    /// Root token for the whole sweep; cancelling it aborts every in-flight probe
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Probe every `domains × ports` pair and return one result per pair.
    ///
    /// Result order is unspecified. A panicking worker is logged and counted,
    /// and every pair it never reported gets an `aborted` failure record.
    pub async fn scan(
        &self,
        domains: &[String],
        ports: &[u16],
        reference: DateTime<Utc>,
    ) -> Vec<ScanResult> {
        let expected = domains.len().saturating_mul(ports.len());
        let (tx, mut rx) = mpsc::channel(expected.max(1));

        let worker = BatchWorker::new(
            self.prober.clone(),
            Arc::from(ports),
            self.timeout,
            reference,
            self.shutdown.clone(),
        );

        let mut workers = JoinSet::new();
        for (index, batch) in batches(domains, self.batch_size).enumerate() {
            debug!(batch = index, hosts = batch.len(), "starting batch worker");
            workers.spawn(worker.clone().run(batch.to_vec(), tx.clone()));
        }
        info!(
            domains = domains.len(),
            expected,
            workers = workers.len(),
            "scan started"
        );

        // Workers hold the only remaining senders
        drop(tx);

        let mut failure = None;
        while let Some(joined) = workers.join_next().await {
            if let Err(err) = joined {
                PANICS_RECOVERED.inc();
                error!(error = %err, "batch worker failed");
                failure.get_or_insert_with(|| err.to_string());
            }
        }

        rx.close();
        let mut results = Vec::with_capacity(expected);
        while let Some(result) = rx.recv().await {
            results.push(result);
        }

        let reason = failure.as_deref().unwrap_or("no result reported");
        let filled = fill_missing(domains, ports, &mut results, reason);
        if filled > 0 {
            warn!(filled, "targets without a result marked as aborted");
        }

        info!(results = results.len(), expected, "scan finished");
        results
    }
}

/// Contiguous batches of `size` domains; the last one may be shorter
#[must_use]
pub fn batches(domains: &[String], size: NonZeroUsize) -> Chunks<'_, String> {
    domains.chunks(size.get())
}

/// Append an `aborted` failure for every `domains × ports` pair absent from `results`
fn fill_missing(
    domains: &[String],
    ports: &[u16],
    results: &mut Vec<ScanResult>,
    reason: &str,
) -> usize {
    let mut seen: HashSet<ProbeTarget> = results.iter().map(ScanResult::target).collect();
    let err = ProbeError::Aborted {
        details: reason.to_string(),
    };

    let before = results.len();
    for domain in domains {
        for &port in ports {
            let target = ProbeTarget::new(domain.as_str(), port);
            if !seen.contains(&target) {
                results.push(ScanResult::failure(&target, &err));
                seen.insert(target);
            }
        }
    }
    results.len() - before
}
