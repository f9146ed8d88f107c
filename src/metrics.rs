use anyhow::{Context, Result};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Registry,
    opts, register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_vec_with_registry,
    register_int_gauge_with_registry,
};
use std::{path::Path, sync::LazyLock};

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

trait ResultExt<T> {
    fn or_exit(self, context: &str) -> T;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn or_exit(self, context: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                eprintln!("failed to initialize metric ({context}): {err}");
                std::process::exit(1);
            }
        }
    }
}

pub static PROBES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        opts!("certsweep_probes_total", "Total probe attempts by outcome"),
        &["status"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static PROBE_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        opts!(
            "certsweep_probe_errors_total",
            "Total probe errors by kind (connection, handshake, no_certificate, certificate)"
        ),
        &["kind"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static PROBE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram_with_registry!(
        HistogramOpts::new(
            "certsweep_probe_duration_seconds",
            "Duration of a single connect + handshake attempt"
        ),
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static CERT_EXPIRY_DAYS: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec_with_registry!(
        opts!(
            "certsweep_cert_expiry_days",
            "Days until certificate expiration (negative if expired)"
        ),
        &["domain", "port"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static CHAIN_STATUS: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec_with_registry!(
        opts!(
            "certsweep_chain_status",
            "Chain validation outcome per target (value is always 1)"
        ),
        &["domain", "port", "status"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static TLS_INFO: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec_with_registry!(
        opts!(
            "certsweep_tls_info",
            "Negotiated TLS parameters per target (value is always 1)"
        ),
        &["domain", "port", "version", "cipher"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static SCAN_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram_with_registry!(
        HistogramOpts::new("certsweep_scan_duration_seconds", "Duration of a full sweep"),
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static TARGETS: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge_with_registry!(
        "certsweep_targets",
        "Number of (domain, port) pairs in the last sweep",
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static PANICS_RECOVERED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter_with_registry!(
        opts!(
            "certsweep_panics_recovered_total",
            "Total batch worker panics recovered from"
        ),
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static ALERTS_SENT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        opts!(
            "certsweep_alerts_total",
            "Alert deliveries by provider and outcome"
        ),
        &["provider", "status"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static LAST_SCAN: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge_with_registry!(
        "certsweep_last_scan_timestamp_seconds",
        "Unix timestamp of the last completed sweep",
        &REGISTRY
    )
    .or_exit("metric can be created")
});

/// Encode and return metrics in the Prometheus text format
///
/// # Errors
///
/// Returns an error if metrics encoding fails
pub fn encode_metrics() -> Result<Vec<u8>, String> {
    let mut buffer = Vec::new();
    let encoder = prometheus::TextEncoder::new();

    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| format!("could not encode custom metrics: {e}"))?;

    Ok(buffer)
}

/// Write the registry to `path` for the node exporter textfile collector
///
/// The file is written next to its destination and renamed so collectors never
/// read a partial file.
///
/// # Errors
///
/// Returns an error if encoding fails or the file cannot be written
pub async fn write_textfile(path: &Path) -> Result<()> {
    let buffer = encode_metrics().map_err(anyhow::Error::msg)?;

    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");

    tokio::fs::write(&staging, buffer)
        .await
        .with_context(|| format!("failed to write metrics to {}", path.display()))?;
    tokio::fs::rename(&staging, path)
        .await
        .with_context(|| format!("failed to move metrics into {}", path.display()))?;

    Ok(())
}
