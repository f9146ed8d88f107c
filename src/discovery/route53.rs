use crate::targets::TargetSet;
use anyhow::{Result, anyhow};
use aws_config::BehaviorVersion;
use aws_sdk_route53::{
    Client,
    error::DisplayErrorContext,
    types::{ResourceRecordSet, RrType},
};
use tracing::debug;

/// A and CNAME records of one Route53 hosted zone.
///
/// Credentials and region come from the standard AWS chain (environment,
/// shared config files, instance metadata).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route53Source {
    pub hosted_zone_id: String,
}

impl Route53Source {
    #[must_use]
    pub fn new(hosted_zone_id: impl Into<String>) -> Self {
        Self {
            hosted_zone_id: hosted_zone_id.into(),
        }
    }

    /// List every record set of the zone and keep the A and CNAME names
    ///
    /// # Errors
    ///
    /// Returns an error if AWS rejects a listing request
    pub async fn fetch(&self) -> Result<TargetSet> {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let client = Client::new(&config);

        let mut domains = Vec::new();
        let mut start: Option<(String, RrType, Option<String>)> = None;
        loop {
            let mut request = client
                .list_resource_record_sets()
                .hosted_zone_id(&self.hosted_zone_id);
            if let Some((name, record_type, identifier)) = start.take() {
                request = request
                    .start_record_name(name)
                    .start_record_type(record_type)
                    .set_start_record_identifier(identifier);
            }

            let output = request.send().await.map_err(|e| {
                anyhow!(
                    "failed to list record sets of {}: {}",
                    self.hosted_zone_id,
                    DisplayErrorContext(&e)
                )
            })?;

            let sets = output.resource_record_sets();
            debug!(records = sets.len(), "fetched route53 record sets");
            domains.extend(record_names(sets));

            if !output.is_truncated() {
                break;
            }
            match (output.next_record_name(), output.next_record_type()) {
                (Some(name), Some(record_type)) => {
                    start = Some((
                        name.to_string(),
                        record_type.clone(),
                        output.next_record_identifier().map(str::to_string),
                    ));
                }
                _ => break,
            }
        }

        Ok(TargetSet {
            domains,
            ..TargetSet::default()
        })
    }
}

/// Names of A and CNAME record sets, without the trailing root dot
#[must_use]
pub fn record_names(sets: &[ResourceRecordSet]) -> Vec<String> {
    sets.iter()
        .filter_map(|set| record_name(set.name(), set.r#type()))
        .collect()
}

/// Route53 escapes `*` as `\052`; wildcard records have no single host to dial
fn record_name(name: &str, record_type: &RrType) -> Option<String> {
    if !matches!(record_type, RrType::A | RrType::Cname) {
        return None;
    }

    let name = name.trim_end_matches('.');
    if name.is_empty() || name.starts_with("\\052") || name.starts_with('*') {
        return None;
    }

    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn set(name: &str, record_type: RrType) -> ResourceRecordSet {
        ResourceRecordSet::builder()
            .name(name)
            .r#type(record_type)
            .build()
            .unwrap()
    }

    #[test]
    fn test_record_names_filters_types() {
        let sets = vec![
            set("example.com.", RrType::A),
            set("www.example.com.", RrType::Cname),
            set("example.com.", RrType::Mx),
            set("example.com.", RrType::Ns),
            set("v6.example.com.", RrType::Aaaa),
            set("_dmarc.example.com.", RrType::Txt),
        ];
        assert_eq!(record_names(&sets), vec!["example.com", "www.example.com"]);
    }

    #[test]
    fn test_record_names_skips_wildcards() {
        let sets = vec![
            set("\\052.example.com.", RrType::A),
            set("*.example.com.", RrType::Cname),
            set("api.example.com.", RrType::A),
        ];
        assert_eq!(record_names(&sets), vec!["api.example.com"]);
    }

    #[test]
    fn test_record_name_without_trailing_dot() {
        assert_eq!(
            record_name("app.example.com", &RrType::A).as_deref(),
            Some("app.example.com")
        );
        assert_eq!(record_name(".", &RrType::A), None);
    }
}
