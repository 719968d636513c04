use chrono::Utc;

use crate::config::ReportKind;
use crate::models::{RepoStats, TimeWindow};

/// Render the report text for a finished collection run.
///
/// Pure aside from the generation timestamp in the footer: identical
/// inputs produce identical output above the footer.
pub fn generate_report(
    stats: &[RepoStats],
    kind: ReportKind,
    window: &TimeWindow,
    include_issues: bool,
) -> String {
    let total_commits: u64 = stats.iter().map(|r| r.commits.total_commits).sum();
    let total_additions: u64 = stats.iter().map(|r| r.commits.additions).sum();
    let total_deletions: u64 = stats.iter().map(|r| r.commits.deletions).sum();

    let mut lines = vec![
        format!("📊 GitHub {} Report", kind.title()),
        format!(
            "⏰ Window: {} UTC to {} UTC",
            window.since.format("%Y-%m-%d %H:%M"),
            window.until.format("%Y-%m-%d %H:%M")
        ),
        format!("📁 Repositories: {}", stats.len()),
        String::new(),
        "📈 Overall:".to_string(),
        format!("  • Commits: {}", group(total_commits)),
        format!("  • Additions: {} lines", group(total_additions)),
        format!("  • Deletions: {} lines", group(total_deletions)),
        format!(
            "  • Net: {} lines",
            signed(total_additions as i64 - total_deletions as i64)
        ),
    ];

    if include_issues {
        let mut new_issues = 0u64;
        let mut closed_issues = 0u64;
        let mut comments = 0u64;
        for issues in stats.iter().filter_map(|r| r.issues.as_ref()) {
            new_issues += issues.new_issues;
            closed_issues += issues.closed_issues;
            comments += issues.comments;
        }

        lines.push(format!("  • New issues: {}", group(new_issues)));
        lines.push(format!("  • Closed issues: {}", group(closed_issues)));
        lines.push(format!("  • Comments: {}", group(comments)));
    }

    lines.push(String::new());
    lines.push("📋 Per repository:".to_string());
    lines.push(String::new());

    for repo in stats {
        lines.push(format!("🔹 {}:", repo.repo_name));
        lines.push(format!("  • Commits: {}", group(repo.commits.total_commits)));
        lines.push(format!("  • Additions: {} lines", group(repo.commits.additions)));
        lines.push(format!("  • Deletions: {} lines", group(repo.commits.deletions)));
        lines.push(format!("  • Net: {} lines", signed(repo.commits.net())));

        if include_issues {
            if let Some(issues) = &repo.issues {
                lines.push(format!("  • New issues: {}", group(issues.new_issues)));
                lines.push(format!("  • Closed issues: {}", group(issues.closed_issues)));
                lines.push(format!("  • Comments: {}", group(issues.comments)));
            }
        }

        if !repo.errors.is_empty() {
            lines.push(format!("  ⚠ Incomplete data: {}", repo.errors.join("; ")));
        }

        lines.push(String::new());
    }

    lines.push("---".to_string());
    lines.push(format!(
        "Generated at {} UTC",
        Utc::now().format("%Y-%m-%d %H:%M:%S")
    ));
    lines.push("Powered by repo-pulse".to_string());

    lines.join("\n")
}

/// Thousands-separated rendering, e.g. 1234567 -> "1,234,567".
fn group(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Signed, thousands-separated rendering for net change.
fn signed(n: i64) -> String {
    if n < 0 {
        format!("-{}", group(n.unsigned_abs()))
    } else {
        format!("+{}", group(n as u64))
    }
}
