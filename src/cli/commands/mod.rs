use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::{path::PathBuf, time::Duration};

/// Pure clap command definitions with zero business logic
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new(env!("CARGO_PKG_NAME"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("type")
                .default_value("config")
                .env("CERTSWEEP_TYPE")
                .help("Where to read targets from")
                .long("type")
                .short('t')
                .value_parser(["config", "gitlab", "cloudflare", "zone", "azure"]),
        )
        .arg(
            Arg::new("config")
                .env("CERTSWEEP_CONFIG")
                .help("Path to the JSON target file (--type config)")
                .long("config")
                .long_help(
                    "Path to the JSON target file used with --type config:\n\n\
                    {\"domains\": [\"example.com\"], \"ports\": [443], \"cidr\": [\"10.0.0.0/30\"]}\n\n\
                    CIDR blocks are expanded to every address they contain."
                )
                .short('c')
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("ports")
                .env("CERTSWEEP_PORTS")
                .help("Comma-separated ports added to those of the target list")
                .long("ports")
                .long_help(
                    "Comma-separated ports added to those of the target list.\n\
                    When neither names a port, 443, 5091 and 5061 are probed."
                )
                .short('p')
                .value_name("PORTS"),
        )
        .arg(
            Arg::new("timeout")
                .default_value("5s")
                .env("CERTSWEEP_TIMEOUT")
                .help("Per-target connect + handshake timeout (e.g. 500ms, 5s, 1m)")
                .long("timeout")
                .value_name("DURATION")
                .value_parser(parse_duration),
        )
        .arg(
            Arg::new("split")
                .default_value("30")
                .env("CERTSWEEP_SPLIT")
                .help("Domains per concurrent worker")
                .long("split")
                .short('s')
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("output")
                .env("CERTSWEEP_OUTPUT")
                .help("Output file prefix; writes <dir>/<YYYYMMDD>/<name>.{json,csv}")
                .long("output")
                .short('o')
                .value_name("PREFIX")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("alert-days")
                .default_value("5")
                .env("CERTSWEEP_ALERT_DAYS")
                .help("Alert on certificates expiring within this many days")
                .long("alert-days")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("ca-file")
                .env("CERTSWEEP_CA_FILE")
                .help("Extra PEM trust anchors used when validating chains")
                .long("ca-file")
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("metrics-file")
                .env("CERTSWEEP_METRICS_FILE")
                .help("Write Prometheus metrics to this file (textfile collector)")
                .long("metrics-file")
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("log-format")
                .default_value("json")
                .env("CERTSWEEP_LOG_FORMAT")
                .help("Log output format")
                .long("log-format")
                .value_parser(["json", "text"]),
        )
        .arg(
            Arg::new("verbose")
                .action(ArgAction::Count)
                .help("Increase verbosity (-v debug, -vv trace)")
                .long("verbose")
                .short('v'),
        )
        .arg(
            Arg::new("gitlab-token")
                .env("CERTSWEEP_GITLAB_TOKEN")
                .help("GitLab access token")
                .hide_env_values(true)
                .long("gitlab-token")
                .value_name("TOKEN"),
        )
        .arg(
            Arg::new("gitlab-url")
                .default_value("https://gitlab.com")
                .env("CERTSWEEP_GITLAB_URL")
                .help("GitLab base URL")
                .long("gitlab-url")
                .value_name("URL"),
        )
        .arg(
            Arg::new("gitlab-project-id")
                .env("CERTSWEEP_GITLAB_PROJECT_ID")
                .help("GitLab project ID or URL-encoded path")
                .long("gitlab-project-id")
                .value_name("ID"),
        )
        .arg(
            Arg::new("gitlab-file-path")
                .env("CERTSWEEP_GITLAB_FILE_PATH")
                .help("Path of the JSON target file in the repository")
                .long("gitlab-file-path")
                .value_name("PATH"),
        )
        .arg(
            Arg::new("gitlab-ref")
                .default_value("main")
                .env("CERTSWEEP_GITLAB_REF")
                .help("Branch, tag or commit to read the target file from")
                .long("gitlab-ref")
                .value_name("REF"),
        )
        .arg(
            Arg::new("cloudflare-token")
                .env("CERTSWEEP_CLOUDFLARE_TOKEN")
                .help("Cloudflare API token with DNS read access")
                .hide_env_values(true)
                .long("cloudflare-token")
                .value_name("TOKEN"),
        )
        .arg(
            Arg::new("cloudflare-zone-id")
                .env("CERTSWEEP_CLOUDFLARE_ZONE_ID")
                .help("Cloudflare zone to list A and CNAME records from")
                .long("cloudflare-zone-id")
                .value_name("ZONE"),
        )
        .arg(
            Arg::new("hosted-zone-id")
                .env("CERTSWEEP_HOSTED_ZONE_ID")
                .help("Route53 hosted zone to list A and CNAME records from (--type zone)")
                .long("hosted-zone-id")
                .long_help(
                    "Route53 hosted zone to list A and CNAME records from (--type zone).\n\
                    AWS credentials and region come from the usual environment variables,\n\
                    shared config files or instance metadata."
                )
                .value_name("ID"),
        )
        .arg(
            Arg::new("azure-tenant-id")
                .env("CERTSWEEP_AZURE_TENANT_ID")
                .help("Azure AD tenant of the service principal")
                .long("azure-tenant-id")
                .value_name("ID"),
        )
        .arg(
            Arg::new("azure-client-id")
                .env("CERTSWEEP_AZURE_CLIENT_ID")
                .help("Azure service principal application ID")
                .long("azure-client-id")
                .value_name("ID"),
        )
        .arg(
            Arg::new("azure-client-secret")
                .env("CERTSWEEP_AZURE_CLIENT_SECRET")
                .help("Azure service principal secret")
                .hide_env_values(true)
                .long("azure-client-secret")
                .value_name("SECRET"),
        )
        .arg(
            Arg::new("azure-subscription-id")
                .env("CERTSWEEP_AZURE_SUBSCRIPTION_ID")
                .help("Azure subscription holding the DNS zone")
                .long("azure-subscription-id")
                .value_name("ID"),
        )
        .arg(
            Arg::new("azure-resource-group")
                .env("CERTSWEEP_AZURE_RESOURCE_GROUP")
                .help("Resource group of the DNS zone")
                .long("azure-resource-group")
                .value_name("NAME"),
        )
        .arg(
            Arg::new("azure-zone")
                .env("CERTSWEEP_AZURE_ZONE")
                .help("Azure DNS zone to list A and CNAME records from (--type azure)")
                .long("azure-zone")
                .value_name("ZONE"),
        )
        .arg(
            Arg::new("pagerduty-key")
                .env("CERTSWEEP_PAGERDUTY_KEY")
                .help("PagerDuty Events API v2 routing key")
                .hide_env_values(true)
                .long("pagerduty-key")
                .value_name("KEY"),
        )
        .arg(
            Arg::new("slack-webhook")
                .env("CERTSWEEP_SLACK_WEBHOOK")
                .help("Slack incoming webhook URL")
                .hide_env_values(true)
                .long("slack-webhook")
                .value_name("URL"),
        )
        .arg(
            Arg::new("teams-webhook")
                .env("CERTSWEEP_TEAMS_WEBHOOK")
                .help("Microsoft Teams incoming webhook URL")
                .hide_env_values(true)
                .long("teams-webhook")
                .value_name("URL"),
        )
        .arg(
            Arg::new("zoom-webhook")
                .env("CERTSWEEP_ZOOM_WEBHOOK")
                .help("Zoom Team Chat incoming webhook URL")
                .hide_env_values(true)
                .long("zoom-webhook")
                .value_name("URL"),
        )
}

/// Parse `500ms`, `5s`, `1m` or a bare number of seconds
///
/// # Errors
///
/// Returns an error message if the value is malformed or zero
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);

    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration: {value:?}"))?;

    let duration = match unit.trim() {
        "ms" => Duration::from_millis(amount),
        "" | "s" => Duration::from_secs(amount),
        "m" => Duration::from_secs(amount.saturating_mul(60)),
        other => return Err(format!("invalid duration unit {other:?} (use ms, s or m)")),
    };

    if duration.is_zero() {
        return Err("duration must be greater than zero".to_string());
    }

    Ok(duration)
}
