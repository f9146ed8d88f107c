use crate::targets::TargetSet;
use anyhow::{Context, Result, bail};
use std::path::Path;

/// Read a JSON target list from disk
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or lists neither
/// domains nor CIDR blocks
pub async fn fetch(path: &Path) -> Result<TargetSet> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read config file {}", path.display()))?;

    let targets = TargetSet::from_json(&data)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;

    if targets.domains.is_empty() && targets.cidr.is_empty() {
        bail!("invalid config: missing required domains or cidr");
    }

    Ok(targets)
}
