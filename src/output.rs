use crate::scan::{EXPIRY_SENTINEL_DAYS, ScanResult};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::{
    fs,
    path::{Path, PathBuf},
};

const CSV_HEADER: [&str; 16] = [
    "Domain",
    "IP Address",
    "Port",
    "TLS Version",
    "Cipher Suite",
    "FIPS Compliant",
    "Chain Status",
    "Issuer",
    "Sig Algo",
    "SANs",
    "Serial",
    "Common Name",
    "Not Before",
    "Not After",
    "Days until Expire",
    "Error",
];

/// Paths written by [`write`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFiles {
    pub json: PathBuf,
    pub csv: PathBuf,
    pub success_csv: PathBuf,
}

/// Persist `results` under `<dir(prefix)>/<YYYYMMDD>/<name(prefix)>`
///
/// Results are sorted by domain. Produces `.json`, `.csv` and
/// `_success_only.csv`, the latter without failed targets.
///
/// # Errors
///
/// Returns an error if the directory or any file cannot be written
pub fn write(prefix: &Path, results: &mut [ScanResult], now: DateTime<Utc>) -> Result<OutputFiles> {
    results.sort_by(|a, b| a.domain.cmp(&b.domain).then(a.port.cmp(&b.port)));

    let name = prefix
        .file_name()
        .context("output prefix has no file name")?
        .to_string_lossy()
        .into_owned();
    let dir = prefix
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(now.format("%Y%m%d").to_string());

    fs::create_dir_all(&dir)
        .with_context(|| format!("error creating directory {}", dir.display()))?;

    let files = OutputFiles {
        json: dir.join(format!("{name}.json")),
        csv: dir.join(format!("{name}.csv")),
        success_csv: dir.join(format!("{name}_success_only.csv")),
    };

    let json = serde_json::to_vec_pretty(results).context("error serializing results")?;
    fs::write(&files.json, json)
        .with_context(|| format!("error writing {}", files.json.display()))?;

    write_csv(&files.csv, results.iter())?;
    write_csv(
        &files.success_csv,
        results
            .iter()
            .filter(|result| result.days_until_expiry != EXPIRY_SENTINEL_DAYS),
    )?;

    Ok(files)
}

fn write_csv<'a>(path: &Path, rows: impl Iterator<Item = &'a ScanResult>) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("error creating csv file {}", path.display()))?;

    writer
        .write_record(CSV_HEADER)
        .with_context(|| format!("error writing csv file {}", path.display()))?;
    for result in rows {
        writer
            .write_record(csv_row(result))
            .with_context(|| format!("error writing csv file {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("error writing csv file {}", path.display()))?;

    Ok(())
}

fn csv_row(result: &ScanResult) -> [String; 16] {
    let timestamp = |value: Option<DateTime<Utc>>| {
        value
            .map(|date| date.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default()
    };

    [
        result.domain.clone(),
        result.ip_address.clone(),
        result.port.to_string(),
        result.tls_version.clone(),
        result.cipher_suite.clone(),
        if result.fips_compliant { "Yes" } else { "No" }.to_string(),
        result.chain_status.clone(),
        result.issuer.clone(),
        result.signature_algo.clone(),
        result.sans.join(";"),
        result.serial.clone(),
        result.common_name.clone(),
        timestamp(result.not_before),
        timestamp(result.not_after),
        result.days_until_expiry.to_string(),
        result.error.clone().unwrap_or_default(),
    ]
}
