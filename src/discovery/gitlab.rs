use crate::{http::redact, targets::TargetSet};
use anyhow::{Context, Result, anyhow, bail};
use reqwest::{Client, Url};

/// JSON target list stored in a GitLab repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitLabSource {
    pub url: String,
    pub token: String,
    pub project_id: String,
    pub file_path: String,
    pub git_ref: String,
}

impl GitLabSource {
    /// Raw file endpoint of the repository files API
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid
    pub fn file_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.url)
            .with_context(|| format!("invalid GitLab URL: {}", self.url))?;

        url.path_segments_mut()
            .map_err(|()| anyhow!("GitLab URL cannot be a base: {}", self.url))?
            .pop_if_empty()
            .extend([
                "api",
                "v4",
                "projects",
                self.project_id.as_str(),
                "repository",
                "files",
                self.file_path.as_str(),
                "raw",
            ]);
        url.query_pairs_mut().append_pair("ref", &self.git_ref);

        Ok(url)
    }

    /// Download and parse the target list
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, GitLab answers with a non-success
    /// status, or the file is not a valid target list
    pub async fn fetch(&self, client: &Client) -> Result<TargetSet> {
        let url = self.file_url()?;

        let response = client
            .get(url.clone())
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await
            .with_context(|| format!("failed to fetch file from GitLab {}", redact(url.as_str())))?;

        let status = response.status();
        if !status.is_success() {
            bail!(
                "GitLab returned {status} for {} at {}",
                self.file_path,
                self.git_ref
            );
        }

        let body = response
            .bytes()
            .await
            .context("failed to read GitLab response")?;

        TargetSet::from_json(&body).context("failed to parse json config from GitLab")
    }
}
