use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use repo_pulse::{
    generate_report, load_repos, EmailConfig, GitHubClient, NotificationService, OneBotConfig,
    ReportKind, Settings, StatsCollector, TimeWindow,
};

#[derive(Parser)]
#[command(name = "repo-pulse")]
#[command(about = "Scheduled GitHub activity reports delivered by email and OneBot")]
struct Cli {
    /// Report cadence to generate
    #[arg(value_enum)]
    kind: ReportKind,

    /// Directory holding settings.json and repos.json
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("repo_pulse=info".parse()?))
        .init();

    let cli = Cli::parse();

    info!(kind = %cli.kind, "Starting report run");

    let token = std::env::var("GITHUB_TOKEN").context("GITHUB_TOKEN not set")?;

    let settings = Settings::load(cli.config_dir.join("settings.json"))?;
    let report_config = settings.report(cli.kind).clone();

    if !report_config.enabled {
        info!(kind = %cli.kind, "Report kind is disabled, nothing to do");
        return Ok(());
    }

    let repos = load_repos(cli.config_dir.join("repos.json"))?;
    info!(count = repos.len(), "Surveying repositories: {}", repos.join(", "));

    let window = TimeWindow::lookback(report_config.days_back, Utc::now())?;
    info!(
        since = %window.since.format("%Y-%m-%d %H:%M"),
        until = %window.until.format("%Y-%m-%d %H:%M"),
        "Derived report window"
    );

    let github = GitHubClient::new(&token)?;
    let collector = StatsCollector::new(&github);
    let stats = collector
        .collect_all_stats(&repos, &window, report_config.include_issues)
        .await;

    let content = generate_report(&stats, cli.kind, &window, report_config.include_issues);
    let subject = format!("GitHub {} Report", cli.kind.title());

    let service = NotificationService::new(
        EmailConfig::from_env(),
        OneBotConfig::from_env(),
        settings.email_recipients.clone(),
    );
    let results = service.send_all(&subject, &content, None).await;

    println!(
        "email: {}",
        if results.email { "sent" } else { "failed or not configured" }
    );
    println!(
        "onebot: {}",
        if results.onebot { "sent" } else { "failed or not configured" }
    );

    if results.all_failed() {
        // The report must not be lost when no channel delivered it.
        println!("\n{}", "=".repeat(50));
        println!("{content}");
        println!("{}", "=".repeat(50));
    }

    info!(kind = %cli.kind, "Report run complete");

    Ok(())
}
