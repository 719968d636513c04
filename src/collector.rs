use tracing::{debug, info, warn};

use crate::github::GitHubClient;
use crate::models::{CommitStats, FetchError, IssueStats, RepoStats, TimeWindow};

/// Collects per-repository activity summaries through a GitHub client.
pub struct StatsCollector<'a> {
    github: &'a GitHubClient,
}

impl<'a> StatsCollector<'a> {
    pub fn new(github: &'a GitHubClient) -> Self {
        Self { github }
    }

    /// Commit totals for the window.
    ///
    /// Merge commits are excluded entirely. A commit whose per-commit
    /// detail cannot be fetched still counts but contributes no line
    /// totals.
    pub async fn fetch_commits(
        &self,
        repo: &str,
        window: &TimeWindow,
    ) -> Result<CommitStats, FetchError> {
        let commits = self.github.list_commits(repo, window).await?;

        let mut stats = CommitStats::default();
        for commit in &commits {
            if commit.is_merge() {
                continue;
            }
            stats.total_commits += 1;

            match self.github.get_commit(repo, &commit.sha).await {
                Ok(detail) => {
                    if let Some(lines) = detail.stats {
                        stats.additions += lines.additions;
                        stats.deletions += lines.deletions;
                    }
                }
                Err(err) => {
                    debug!(repo, sha = %commit.sha, error = %err, "Skipping commit detail");
                }
            }
        }

        Ok(stats)
    }

    /// Issue totals for the window.
    ///
    /// Issues created inside the window count as new and accrue their
    /// comment totals; independently, issues closed inside the window count
    /// as closed regardless of when they were created.
    pub async fn fetch_issues(
        &self,
        repo: &str,
        window: &TimeWindow,
    ) -> Result<IssueStats, FetchError> {
        let issues = self.github.list_issues(repo, window.since).await?;

        let mut stats = IssueStats::default();
        for issue in &issues {
            if issue.created_at >= window.since && issue.created_at <= window.until {
                stats.new_issues += 1;
                stats.comments += issue.comments;
            }

            if let Some(closed_at) = issue.closed_at {
                if closed_at >= window.since && closed_at <= window.until {
                    stats.closed_issues += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Summary for one repository. Never fails: a repository-level fetch
    /// error is zero-filled and recorded in the result's `errors`.
    pub async fn collect_repo_stats(
        &self,
        repo: &str,
        window: &TimeWindow,
        include_issues: bool,
    ) -> RepoStats {
        info!(repo, "Collecting repository stats");

        let mut errors = Vec::new();

        let commits = match self.fetch_commits(repo, window).await {
            Ok(stats) => stats,
            Err(err) => {
                warn!(repo, error = %err, "Commit fetch failed, zero-filling");
                errors.push(format!("commits: {err}"));
                CommitStats::default()
            }
        };

        let issues = if include_issues {
            match self.fetch_issues(repo, window).await {
                Ok(stats) => Some(stats),
                Err(err) => {
                    warn!(repo, error = %err, "Issue fetch failed, zero-filling");
                    errors.push(format!("issues: {err}"));
                    Some(IssueStats::default())
                }
            }
        } else {
            None
        };

        RepoStats {
            repo_name: repo.to_string(),
            commits,
            issues,
            errors,
        }
    }

    /// Summaries for every repository, sequentially and in input order.
    /// The output always has exactly one entry per input repository.
    pub async fn collect_all_stats(
        &self,
        repos: &[String],
        window: &TimeWindow,
        include_issues: bool,
    ) -> Vec<RepoStats> {
        let mut all = Vec::with_capacity(repos.len());
        for repo in repos {
            all.push(self.collect_repo_stats(repo, window, include_issues).await);
        }
        all
    }
}
