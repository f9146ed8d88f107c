use crate::{
    alerting::AlertSettings,
    cli::actions::Action,
    discovery::{AzureSource, CloudflareSource, GitLabSource, Route53Source, TargetSource, azure},
    sweep::SweepConfig,
    targets::parse_ports,
};
use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use std::{num::NonZeroUsize, path::PathBuf, time::Duration};

/// Fetch a string argument, treating blank values as missing
fn string(matches: &ArgMatches, id: &str) -> Option<String> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn required(matches: &ArgMatches, id: &str, source: &str) -> Result<String> {
    string(matches, id).with_context(|| format!("--{id} is required for --type {source}"))
}

/// Build the target source selected by `--type`
fn extract_source(matches: &ArgMatches) -> Result<TargetSource> {
    let kind = matches
        .get_one::<String>("type")
        .map_or("config", String::as_str);

    match kind {
        "config" => {
            let path = matches
                .get_one::<PathBuf>("config")
                .cloned()
                .context("--config is required for --type config")?;
            Ok(TargetSource::Config { path })
        }
        "gitlab" => Ok(TargetSource::GitLab(GitLabSource {
            url: required(matches, "gitlab-url", kind)?,
            token: required(matches, "gitlab-token", kind)?,
            project_id: required(matches, "gitlab-project-id", kind)?,
            file_path: required(matches, "gitlab-file-path", kind)?,
            git_ref: string(matches, "gitlab-ref").unwrap_or_else(|| "main".to_string()),
        })),
        "cloudflare" => Ok(TargetSource::Cloudflare(CloudflareSource::new(
            required(matches, "cloudflare-token", kind)?,
            required(matches, "cloudflare-zone-id", kind)?,
        ))),
        "zone" => Ok(TargetSource::Route53(Route53Source::new(required(
            matches,
            "hosted-zone-id",
            kind,
        )?))),
        "azure" => Ok(TargetSource::Azure(AzureSource {
            tenant_id: required(matches, "azure-tenant-id", kind)?,
            client_id: required(matches, "azure-client-id", kind)?,
            client_secret: required(matches, "azure-client-secret", kind)?,
            subscription_id: required(matches, "azure-subscription-id", kind)?,
            resource_group: required(matches, "azure-resource-group", kind)?,
            zone: required(matches, "azure-zone", kind)?,
            login_url: azure::DEFAULT_LOGIN_URL.to_string(),
            management_url: azure::DEFAULT_MANAGEMENT_URL.to_string(),
        })),
        other => bail!("unknown target source: {other}"),
    }
}

/// Convert `ArgMatches` into typed Action enum with validation
///
/// # Errors
///
/// Returns an error if a source is missing its required settings, the port
/// list is malformed, or `--split` is zero
pub fn dispatch(matches: &ArgMatches) -> Result<Action> {
    let source = extract_source(matches)?;

    let ports = matches
        .get_one::<String>("ports")
        .map(|value| parse_ports(value.as_str()))
        .transpose()?
        .unwrap_or_default();

    let timeout = matches
        .get_one::<Duration>("timeout")
        .copied()
        .unwrap_or(Duration::from_secs(5));

    let split = matches.get_one::<usize>("split").copied().unwrap_or(30);
    let split = NonZeroUsize::new(split).context("--split must be greater than zero")?;

    let alert_days = matches.get_one::<i64>("alert-days").copied().unwrap_or(5);

    let alerts = AlertSettings {
        pagerduty_key: string(matches, "pagerduty-key"),
        slack_webhook: string(matches, "slack-webhook"),
        teams_webhook: string(matches, "teams-webhook"),
        zoom_webhook: string(matches, "zoom-webhook"),
    };

    Ok(Action::Sweep {
        config: SweepConfig {
            source,
            ports,
            timeout,
            split,
            alert_days,
            alerts,
            output: matches.get_one::<PathBuf>("output").cloned(),
            ca_file: matches.get_one::<PathBuf>("ca-file").cloned(),
            metrics_file: matches.get_one::<PathBuf>("metrics-file").cloned(),
        },
    })
}
