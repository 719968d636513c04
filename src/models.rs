use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// UTC window bounding all activity queries. Invariant: `since < until`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Self> {
        if since >= until {
            bail!("invalid time window: {} is not before {}", since, until);
        }
        Ok(Self { since, until })
    }

    /// Window ending at the start of `now`'s UTC day and reaching
    /// `days_back` days further back.
    pub fn lookback(days_back: i64, now: DateTime<Utc>) -> Result<Self> {
        if days_back <= 0 {
            bail!("days_back must be positive, got {}", days_back);
        }

        let until = now
            .duration_trunc(Duration::days(1))
            .context("Failed to truncate window to start of day")?;
        let since = until - Duration::days(days_back);

        Self::new(since, until)
    }
}

/// Commit activity over a window, non-merge commits only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStats {
    pub total_commits: u64,
    pub additions: u64,
    pub deletions: u64,
}

impl CommitStats {
    /// Net line change; negative when more was deleted than added.
    pub fn net(&self) -> i64 {
        self.additions as i64 - self.deletions as i64
    }
}

/// Issue activity over a window.
///
/// `comments` accrues only for issues counted toward `new_issues`; an
/// issue created before the window never contributes comments, even when
/// it was commented on inside the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueStats {
    pub new_issues: u64,
    pub closed_issues: u64,
    pub comments: u64,
}

/// Per-repository summary for a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoStats {
    /// "owner/name"
    pub repo_name: String,
    pub commits: CommitStats,
    /// `None` when issue collection is disabled for the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<IssueStats>,
    /// Fetch failures that were zero-filled. Empty means the zeros above
    /// reflect genuine inactivity.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Why a repository-level fetch failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("repository not found")]
    NotFound,
    #[error("bad credentials")]
    Unauthorized,
    #[error("rate limited")]
    RateLimited,
    #[error("github api returned {0}")]
    Api(reqwest::StatusCode),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}
