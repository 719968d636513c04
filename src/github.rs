use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::models::{FetchError, TimeWindow};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const PER_PAGE: usize = 100;
const USER_AGENT: &str = concat!("repo-pulse/", env!("CARGO_PKG_VERSION"));

/// Thin typed client for the GitHub REST v3 API.
pub struct GitHubClient {
    client: Client,
    token: String,
    api_base: String,
}

/// One entry from the commit-list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitSummary {
    pub sha: String,
    #[serde(default)]
    pub parents: Vec<CommitRef>,
}

impl CommitSummary {
    /// More than one parent marks a merge commit.
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

/// Single-commit detail; only the line counters matter here.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetail {
    pub sha: String,
    pub stats: Option<CommitLineStats>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CommitLineStats {
    pub additions: u64,
    pub deletions: u64,
}

/// One entry from the issue-list endpoint. Pull requests show up on this
/// endpoint too and are counted like any other issue.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueSummary {
    pub number: u64,
    pub comments: u64,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl GitHubClient {
    /// Create a new client authenticating with the given token.
    pub fn new(token: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            token: token.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }

    /// Point the client at a different API root (mock servers in tests).
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    /// List commits inside the window, across all pages.
    pub async fn list_commits(
        &self,
        repo: &str,
        window: &TimeWindow,
    ) -> Result<Vec<CommitSummary>, FetchError> {
        let url = format!("{}/repos/{}/commits", self.api_base, repo);

        let mut all = Vec::new();
        let mut page = 1u32;
        loop {
            let batch: Vec<CommitSummary> = self
                .get_json(
                    &url,
                    &[
                        ("since", window.since.to_rfc3339()),
                        ("until", window.until.to_rfc3339()),
                        ("per_page", PER_PAGE.to_string()),
                        ("page", page.to_string()),
                    ],
                )
                .await?;

            let len = batch.len();
            all.extend(batch);
            if len < PER_PAGE {
                break;
            }
            page += 1;
        }

        debug!(repo, count = all.len(), "Listed commits");

        Ok(all)
    }

    /// Fetch one commit with its line counters.
    pub async fn get_commit(
        &self,
        repo: &str,
        sha: &str,
    ) -> Result<CommitDetail, FetchError> {
        let url = format!("{}/repos/{}/commits/{}", self.api_base, repo, sha);
        self.get_json(&url, &[]).await
    }

    /// List issues (open and closed) updated since the given instant,
    /// across all pages.
    pub async fn list_issues(
        &self,
        repo: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<IssueSummary>, FetchError> {
        let url = format!("{}/repos/{}/issues", self.api_base, repo);

        let mut all = Vec::new();
        let mut page = 1u32;
        loop {
            let batch: Vec<IssueSummary> = self
                .get_json(
                    &url,
                    &[
                        ("state", "all".to_string()),
                        ("since", since.to_rfc3339()),
                        ("per_page", PER_PAGE.to_string()),
                        ("page", page.to_string()),
                    ],
                )
                .await?;

            let len = batch.len();
            all.extend(batch);
            if len < PER_PAGE {
                break;
            }
            page += 1;
        }

        debug!(repo, count = all.len(), "Listed issues");

        Ok(all)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(&self.token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json::<T>().await?),
            StatusCode::NOT_FOUND => Err(FetchError::NotFound),
            StatusCode::UNAUTHORIZED => Err(FetchError::Unauthorized),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited),
            status => Err(FetchError::Api(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn window() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn client(server: &MockServer) -> GitHubClient {
        GitHubClient::new("test-token")
            .unwrap()
            .with_api_base(&server.uri())
    }

    #[tokio::test]
    async fn test_list_commits_parses_parents() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/commits"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"sha": "aaa", "parents": [{"sha": "p1"}]},
                {"sha": "bbb", "parents": [{"sha": "p1"}, {"sha": "p2"}]},
            ])))
            .mount(&server)
            .await;

        let commits = client(&server)
            .list_commits("octo/demo", &window())
            .await
            .unwrap();

        assert_eq!(commits.len(), 2);
        assert!(!commits[0].is_merge());
        assert!(commits[1].is_merge());
    }

    #[tokio::test]
    async fn test_list_commits_paginates_until_short_page() {
        let server = MockServer::start().await;

        let full_page: Vec<_> = (0..PER_PAGE)
            .map(|i| json!({"sha": format!("sha{i}"), "parents": []}))
            .collect();

        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/commits"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(full_page)))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/commits"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{"sha": "last", "parents": []}])),
            )
            .mount(&server)
            .await;

        let commits = client(&server)
            .list_commits("octo/demo", &window())
            .await
            .unwrap();

        assert_eq!(commits.len(), PER_PAGE + 1);
        assert_eq!(commits.last().unwrap().sha, "last");
    }

    #[tokio::test]
    async fn test_missing_repo_maps_to_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/octo/gone/commits"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server)
            .list_commits("octo/gone", &window())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::NotFound));
    }

    #[tokio::test]
    async fn test_forbidden_maps_to_rate_limited() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/issues"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = client(&server)
            .list_issues("octo/demo", window().since)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::RateLimited));
    }

    #[tokio::test]
    async fn test_issue_listing_requests_all_states() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/issues"))
            .and(query_param("state", "all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "number": 7,
                    "comments": 3,
                    "created_at": "2024-01-02T10:00:00Z",
                    "closed_at": null,
                },
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let issues = client(&server)
            .list_issues("octo/demo", window().since)
            .await
            .unwrap();

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].number, 7);
        assert_eq!(issues[0].comments, 3);
        assert!(issues[0].closed_at.is_none());
    }
}
