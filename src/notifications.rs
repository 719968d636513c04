use std::time::Duration;

use anyhow::{bail, Context, Result};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{EmailConfig, OneBotConfig};

const ONEBOT_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-channel delivery outcome. `false` covers both "failed" and "not
/// configured".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendResults {
    pub email: bool,
    pub onebot: bool,
}

impl SendResults {
    /// True when no channel delivered the report.
    pub fn all_failed(&self) -> bool {
        !self.email && !self.onebot
    }
}

/// Delivers a rendered report over the configured channels.
///
/// Channel configuration is injected at construction; this service never
/// reads the environment itself.
pub struct NotificationService {
    client: Client,
    email: Option<EmailConfig>,
    onebot: Option<OneBotConfig>,
    fallback_recipients: Vec<String>,
}

#[derive(Debug, Serialize)]
struct OneBotMessage {
    user_id: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct OneBotResponse {
    status: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

impl NotificationService {
    pub fn new(
        email: Option<EmailConfig>,
        onebot: Option<OneBotConfig>,
        fallback_recipients: Vec<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            email,
            onebot,
            fallback_recipients,
        }
    }

    /// Send over every configured channel. Channels are independent; one
    /// failing never blocks the other.
    pub async fn send_all(
        &self,
        subject: &str,
        content: &str,
        recipients: Option<&[String]>,
    ) -> SendResults {
        let mut results = SendResults::default();

        if let Some(email) = &self.email {
            results.email = match self.send_email(email, subject, content, recipients).await {
                Ok(()) => true,
                Err(err) => {
                    warn!(error = %err, "Email delivery failed");
                    false
                }
            };
        } else {
            info!("Email channel not configured, skipping");
        }

        if let Some(onebot) = &self.onebot {
            results.onebot = match self.send_onebot(onebot, content).await {
                Ok(()) => true,
                Err(err) => {
                    warn!(error = %err, "OneBot delivery failed");
                    false
                }
            };
        } else {
            info!("OneBot channel not configured, skipping");
        }

        results
    }

    async fn send_email(
        &self,
        config: &EmailConfig,
        subject: &str,
        content: &str,
        recipients: Option<&[String]>,
    ) -> Result<()> {
        let recipients = self.resolve_recipients(config, recipients);
        if recipients.is_empty() {
            bail!("no email recipient configured");
        }

        let mut builder = Message::builder()
            .from(
                config
                    .user
                    .parse::<Mailbox>()
                    .context("invalid sender address")?,
            )
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);
        for recipient in &recipients {
            builder = builder.to(recipient
                .parse::<Mailbox>()
                .with_context(|| format!("invalid recipient address: {recipient}"))?);
        }
        let message = builder
            .body(content.to_string())
            .context("failed to build email")?;

        let credentials = Credentials::new(config.user.clone(), config.password.clone());
        let mailer: AsyncSmtpTransport<Tokio1Executor> = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .context("invalid SMTP host")?
                .port(config.port)
                .credentials(credentials)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .credentials(credentials)
                .build()
        };

        mailer.send(message).await.context("SMTP send failed")?;

        info!(recipients = %recipients.join(", "), "Email sent");

        Ok(())
    }

    /// Recipient precedence: explicit argument, then the environment-derived
    /// recipient, then the settings-file list.
    fn resolve_recipients(&self, config: &EmailConfig, explicit: Option<&[String]>) -> Vec<String> {
        if let Some(explicit) = explicit {
            return explicit.to_vec();
        }
        if let Some(recipient) = &config.recipient {
            return vec![recipient.clone()];
        }
        self.fallback_recipients.clone()
    }

    async fn send_onebot(&self, config: &OneBotConfig, content: &str) -> Result<()> {
        // Literal "\n" sequences in the content become real newlines.
        let message = content.replace("\\n", "\n");

        debug!(url = %config.url, "Posting OneBot message");

        let response = self
            .client
            .post(&config.url)
            .timeout(ONEBOT_TIMEOUT)
            .json(&OneBotMessage {
                user_id: config.user_id,
                message,
            })
            .send()
            .await
            .context("OneBot request failed")?;

        if response.status() != StatusCode::OK {
            bail!("OneBot returned status {}", response.status());
        }

        let body: OneBotResponse = response
            .json()
            .await
            .context("OneBot response was not JSON")?;
        if body.status.as_deref() != Some("ok") {
            bail!(
                "OneBot rejected the message: {}",
                body.msg.unwrap_or_else(|| "unknown error".to_string())
            );
        }

        info!(user_id = config.user_id, "OneBot message sent");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn onebot_config(server: &MockServer) -> OneBotConfig {
        OneBotConfig {
            url: format!("{}/send_private_msg", server.uri()),
            user_id: 42,
        }
    }

    #[tokio::test]
    async fn test_unconfigured_channels_report_false() {
        let service = NotificationService::new(None, None, Vec::new());

        let results = service.send_all("subject", "content", None).await;

        assert!(!results.email);
        assert!(!results.onebot);
        assert!(results.all_failed());
    }

    #[tokio::test]
    async fn test_onebot_success_expands_newlines() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/send_private_msg"))
            .and(body_json(json!({
                "user_id": 42,
                "message": "line one\nline two",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let service =
            NotificationService::new(None, Some(onebot_config(&server)), Vec::new());

        let results = service
            .send_all("subject", "line one\\nline two", None)
            .await;

        assert!(results.onebot);
        assert!(!results.email);
        assert!(!results.all_failed());
    }

    #[tokio::test]
    async fn test_onebot_rejection_is_a_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/send_private_msg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "failed", "msg": "not friends"})),
            )
            .mount(&server)
            .await;

        let service =
            NotificationService::new(None, Some(onebot_config(&server)), Vec::new());

        let results = service.send_all("subject", "content", None).await;

        assert!(!results.onebot);
    }

    #[tokio::test]
    async fn test_onebot_http_error_is_a_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/send_private_msg"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let service =
            NotificationService::new(None, Some(onebot_config(&server)), Vec::new());

        let results = service.send_all("subject", "content", None).await;

        assert!(!results.onebot);
    }

    #[test]
    fn test_recipient_resolution_precedence() {
        let config = EmailConfig {
            user: "bot@example.com".to_string(),
            password: "secret".to_string(),
            host: "smtp.example.com".to_string(),
            port: 587,
            use_tls: true,
            recipient: Some("env@example.com".to_string()),
        };
        let service = NotificationService::new(
            Some(config.clone()),
            None,
            vec!["settings@example.com".to_string()],
        );

        let explicit = vec!["explicit@example.com".to_string()];
        assert_eq!(
            service.resolve_recipients(&config, Some(explicit.as_slice())),
            explicit
        );

        assert_eq!(
            service.resolve_recipients(&config, None),
            vec!["env@example.com".to_string()]
        );

        let without_env = EmailConfig {
            recipient: None,
            ..config
        };
        assert_eq!(
            service.resolve_recipients(&without_env, None),
            vec!["settings@example.com".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_recipient_fails_email_only() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/send_private_msg"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;

        let email = EmailConfig {
            user: "bot@example.com".to_string(),
            password: "secret".to_string(),
            host: "smtp.example.com".to_string(),
            port: 587,
            use_tls: true,
            recipient: None,
        };
        let service = NotificationService::new(
            Some(email),
            Some(onebot_config(&server)),
            Vec::new(),
        );

        let results = service.send_all("subject", "content", None).await;

        assert!(!results.email);
        assert!(results.onebot);
        assert!(!results.all_failed());
    }
}
