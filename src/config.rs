use std::env;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Report cadence selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    Daily,
    Weekly,
}

impl ReportKind {
    /// Capitalized name for report headers and email subjects.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
        }
    }
}

/// Per-kind block from the settings document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub enabled: bool,
    pub days_back: i64,
    #[serde(default = "default_include_issues")]
    pub include_issues: bool,
}

fn default_include_issues() -> bool {
    true
}

/// The settings document: one block per report kind plus the fallback
/// email recipient list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub daily_report: ReportConfig,
    pub weekly_report: ReportConfig,
    #[serde(default)]
    pub email_recipients: Vec<String>,
}

impl Settings {
    /// Load settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        let settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        info!(path = %path.display(), "Loaded settings");

        Ok(settings)
    }

    /// The configuration block for one report kind.
    pub fn report(&self, kind: ReportKind) -> &ReportConfig {
        match kind {
            ReportKind::Daily => &self.daily_report,
            ReportKind::Weekly => &self.weekly_report,
        }
    }
}

/// Load the ordered repository list ("owner/name" strings) from a JSON
/// file. An empty list is a configuration error.
pub fn load_repos(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read repository list: {}", path.display()))?;

    let repos: Vec<String> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse repository list: {}", path.display()))?;

    if repos.is_empty() {
        bail!("Repository list is empty: {}", path.display());
    }

    info!(path = %path.display(), count = repos.len(), "Loaded repository list");

    Ok(repos)
}

/// SMTP channel configuration, materialized once at startup.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    /// Recipient from the environment; takes precedence over the
    /// settings-file list.
    pub recipient: Option<String>,
}

impl EmailConfig {
    /// Read the email channel from the environment. `None` disables the
    /// channel when any required variable is missing or invalid.
    pub fn from_env() -> Option<Self> {
        let user = require_var("EMAIL_USER")?;
        let password = require_var("EMAIL_PASSWORD")?;
        let host = require_var("SMTP_HOST")?;
        let port = require_var("SMTP_PORT")?;

        let port = match port.parse() {
            Ok(port) => port,
            Err(_) => {
                warn!(value = %port, "SMTP_PORT is not a valid port, disabling email");
                return None;
            }
        };

        let use_tls = env::var("SMTP_USE_TLS")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);
        let recipient = env::var("EMAIL_RECIPIENT").ok().filter(|r| !r.is_empty());

        Some(Self {
            user,
            password,
            host,
            port,
            use_tls,
            recipient,
        })
    }
}

/// OneBot channel configuration, materialized once at startup.
#[derive(Debug, Clone)]
pub struct OneBotConfig {
    pub url: String,
    pub user_id: i64,
}

impl OneBotConfig {
    /// Read the OneBot channel from the environment. `None` disables the
    /// channel when any required variable is missing or invalid.
    pub fn from_env() -> Option<Self> {
        let url = require_var("ONEBOT_URL")?;
        let qq = require_var("ONEBOT_QQ")?;

        let user_id = match qq.parse() {
            Ok(id) => id,
            Err(_) => {
                warn!(value = %qq, "ONEBOT_QQ is not a numeric id, disabling OneBot");
                return None;
            }
        };

        Some(Self { url, user_id })
    }
}

fn require_var(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => {
            info!(name, "Channel environment variable not set");
            None
        }
    }
}
