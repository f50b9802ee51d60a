//! Upstream repository client for update checks

use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::errors::ManagerError;

/// A commit as listed by the upstream API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamCommit {
    pub sha: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct CommitEntry {
    sha: String,
    commit: CommitDetails,
}

#[derive(Debug, Deserialize)]
struct CommitDetails {
    message: String,
}

/// How far the installed commit is behind upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAvailability {
    pub update_available: bool,
    pub commits_behind: usize,
    pub current_commit: String,
    pub latest_commit: Option<String>,
    pub commits: Vec<UpstreamCommit>,
}

/// Compare the installed commit with a newest-first commit listing.
///
/// Only commits newer than `installed` count; the installed commit and
/// everything older are ignored. If `installed` is not in the listing, every
/// listed commit counts.
pub fn compute_availability(installed: &str, listing: Vec<UpstreamCommit>) -> UpdateAvailability {
    let latest_commit = listing.first().map(|c| c.sha.clone());
    let commits: Vec<UpstreamCommit> = listing
        .into_iter()
        .take_while(|c| !c.sha.eq_ignore_ascii_case(installed))
        .collect();

    UpdateAvailability {
        update_available: !commits.is_empty(),
        commits_behind: commits.len(),
        current_commit: installed.to_string(),
        latest_commit,
        commits,
    }
}

/// Split a GitHub repository URL into `(owner, repo)`
pub fn parse_github_repository(repository: &str) -> Result<(String, String), ManagerError> {
    let url = Url::parse(repository)
        .map_err(|e| ManagerError::NetworkError(format!("Invalid repository URL {}: {}", repository, e)))?;

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        [owner, repo, ..] => Ok((
            owner.to_string(),
            repo.trim_end_matches(".git").to_string(),
        )),
        _ => Err(ManagerError::NetworkError(format!(
            "Cannot determine owner and name of repository {}",
            repository
        ))),
    }
}

/// HTTP client for the upstream commit API
pub struct UpstreamClient {
    client: Client,
    base_url: String,
}

impl UpstreamClient {
    /// Create a new client against a GitHub-compatible API
    pub fn new(base_url: &str) -> Result<Self, ManagerError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("containerizer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List the commits of `branch`, newest first
    pub async fn list_commits(&self, repository: &str, branch: &str) -> Result<Vec<UpstreamCommit>, ManagerError> {
        let (owner, repo) = parse_github_repository(repository)?;
        let url = format!("{}/repos/{}/{}/commits", self.base_url, owner, repo);
        debug!("GET {} (sha={})", url, branch);

        let response = self
            .client
            .get(&url)
            .query(&[("sha", branch), ("per_page", "100")])
            .header(header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| ManagerError::NetworkError(format!("Failed to list commits: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Listing commits failed: {} - {}", status, body);
            return Err(ManagerError::NetworkError(format!("{}: {}", status, body)));
        }

        let entries: Vec<CommitEntry> = response.json().await?;
        Ok(entries
            .into_iter()
            .map(|e| UpstreamCommit {
                sha: e.sha,
                message: e.commit.message,
            })
            .collect())
    }

    /// Check whether `installed` is behind the tip of `branch`
    pub async fn check_for_update(
        &self,
        repository: &str,
        branch: &str,
        installed: &str,
    ) -> Result<UpdateAvailability, ManagerError> {
        let listing = self.list_commits(repository, branch).await?;
        Ok(compute_availability(installed, listing))
    }
}
