pub mod collector;
pub mod config;
pub mod github;
pub mod models;
pub mod notifications;
pub mod report;

pub use collector::StatsCollector;
pub use config::{load_repos, EmailConfig, OneBotConfig, ReportConfig, ReportKind, Settings};
pub use github::GitHubClient;
pub use models::*;
pub use notifications::{NotificationService, SendResults};
pub use report::generate_report;
