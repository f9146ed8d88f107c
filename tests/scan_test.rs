mod common;

use certsweep::{
    output,
    scan::{EXPIRY_SENTINEL_DAYS, ScanResult, Scanner, days_until_expiry},
};
use chrono::Utc;
use common::{LEAF_HOST, LEAF_SERIAL, TestPki, closed_port, leaf_not_after, serve_silent, serve_tls13};
use std::{collections::HashSet, num::NonZeroUsize, time::Duration};

fn scanner(pki: &TestPki, batch_size: usize, timeout: Duration) -> Scanner {
    Scanner::new(pki.prober(), timeout, NonZeroUsize::new(batch_size).unwrap())
}

fn sorted(mut results: Vec<ScanResult>) -> Vec<ScanResult> {
    results.sort_by(|a, b| a.domain.cmp(&b.domain).then(a.port.cmp(&b.port)));
    results
}

#[tokio::test]
async fn test_scan_mixed_targets() {
    let pki = TestPki::generate();
    let server = serve_tls13(&pki).await;
    let refused = closed_port().await;

    let reference = Utc::now();
    let results = scanner(&pki, 1, Duration::from_secs(5))
        .scan(
            &[LEAF_HOST.to_string(), "127.0.0.1".to_string()],
            &[server.port(), refused],
            reference,
        )
        .await;

    assert_eq!(results.len(), 4);

    let ok = results
        .iter()
        .find(|r| r.domain == LEAF_HOST && r.port == server.port())
        .unwrap();
    assert_eq!(ok.error, None);
    assert_eq!(ok.chain_status, "OK");
    assert_eq!(ok.ip_address, "127.0.0.1");
    assert_eq!(ok.serial, LEAF_SERIAL);
    assert_eq!(ok.tls_version, "TLS 1.3");
    assert_eq!(ok.not_after, Some(leaf_not_after()));
    assert_eq!(
        ok.days_until_expiry,
        days_until_expiry(leaf_not_after(), reference)
    );

    let mismatch = results
        .iter()
        .find(|r| r.domain == "127.0.0.1" && r.port == server.port())
        .unwrap();
    assert_eq!(mismatch.error, None);
    assert!(mismatch.chain_status.starts_with("Hostname Mismatch"));

    for failed in results.iter().filter(|r| r.port == refused) {
        assert!(failed.is_failure());
        assert_eq!(failed.days_until_expiry, EXPIRY_SENTINEL_DAYS);
        assert!(failed.chain_status.is_empty());
        assert!(failed.not_after.is_none());
    }
}

#[tokio::test]
async fn test_scan_covers_every_pair_once() {
    let pki = TestPki::generate();
    let server = serve_tls13(&pki).await;
    let refused = closed_port().await;

    let domains: Vec<String> = (1..=5).map(|i| format!("127.0.0.{i}")).collect();
    let ports = [server.port(), refused];

    let results = scanner(&pki, 2, Duration::from_secs(2))
        .scan(&domains, &ports, Utc::now())
        .await;

    let pairs: HashSet<(String, u16)> = results
        .iter()
        .map(|r| (r.domain.clone(), r.port))
        .collect();
    assert_eq!(results.len(), domains.len() * ports.len());
    assert_eq!(pairs.len(), results.len());
}

#[tokio::test]
async fn test_scan_is_repeatable() {
    let pki = TestPki::generate();
    let server = serve_tls13(&pki).await;
    let scanner = scanner(&pki, 30, Duration::from_secs(5));
    let reference = Utc::now();
    let domains = [LEAF_HOST.to_string()];

    let first = sorted(scanner.scan(&domains, &[server.port()], reference).await);
    let second = sorted(scanner.scan(&domains, &[server.port()], reference).await);

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_scan_timeout_per_target() {
    let pki = TestPki::generate();
    let first = serve_silent().await;
    let second = serve_silent().await;

    let started = tokio::time::Instant::now();
    let results = scanner(&pki, 1, Duration::from_millis(300))
        .scan(
            &["127.0.0.1".to_string()],
            &[first.port(), second.port()],
            Utc::now(),
        )
        .await;

    // Each target gets its own deadline
    assert!(started.elapsed() >= Duration::from_millis(600));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(results.len(), 2);
    for result in &results {
        assert!(result.is_failure());
        assert!(
            result
                .error
                .as_deref()
                .is_some_and(|e| e.contains("deadline exceeded"))
        );
    }
}

#[tokio::test]
async fn test_scan_cancelled() {
    let pki = TestPki::generate();
    let silent = serve_silent().await;
    let scanner = scanner(&pki, 1, Duration::from_secs(30));

    let shutdown = scanner.shutdown_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
    });

    let started = tokio::time::Instant::now();
    let results = scanner
        .scan(&["127.0.0.1".to_string()], &[silent.port()], Utc::now())
        .await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(results.len(), 1);
    assert!(
        results
            .first()
            .and_then(|r| r.error.as_deref())
            .is_some_and(|e| e.contains("operation cancelled"))
    );
}

#[tokio::test]
async fn test_scan_results_written_to_disk() {
    let pki = TestPki::generate();
    let server = serve_tls13(&pki).await;
    let refused = closed_port().await;
    let dir = tempfile::tempdir().unwrap();

    let mut results = scanner(&pki, 30, Duration::from_secs(5))
        .scan(&[LEAF_HOST.to_string()], &[server.port(), refused], Utc::now())
        .await;

    let files = output::write(&dir.path().join("sweep"), &mut results, Utc::now()).unwrap();

    let saved: Vec<ScanResult> =
        serde_json::from_slice(&std::fs::read(&files.json).unwrap()).unwrap();
    assert_eq!(saved.len(), 2);

    let success = std::fs::read_to_string(&files.success_csv).unwrap();
    // Header plus the one successful probe
    assert_eq!(success.lines().count(), 2);
    assert!(success.contains(LEAF_SERIAL));
}
