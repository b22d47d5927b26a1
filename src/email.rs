use axum::async_trait;
use serde::Serialize;
use tracing::{error, info};

use crate::config::MailConfig;

/// Outcome of a delivery attempt. Mail failures are reported as a value and
/// logged; they are never escalated to the request that triggered them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    Failed,
    /// Mail is not configured in this environment.
    Skipped,
}

impl DeliveryStatus {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryStatus::Sent)
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp(&self, to: &str, name: &str, code: &str) -> DeliveryStatus;
    async fn send_reset_link(&self, to: &str, name: &str, link: &str) -> DeliveryStatus;
    async fn send_welcome(&self, to: &str, name: &str) -> DeliveryStatus;
}

#[derive(Serialize)]
struct OutboundMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Mailer that posts JSON to an HTTP mail API with a bearer key.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    config: MailConfig,
}

impl HttpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn send(&self, to: &str, subject: &str, text: &str) -> DeliveryStatus {
        let message = OutboundMessage {
            from: &self.config.from_address,
            to,
            subject,
            text,
        };
        let result = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&message)
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => {
                info!(%to, subject, "mail sent");
                DeliveryStatus::Sent
            }
            Ok(resp) => {
                error!(%to, subject, status = %resp.status(), "mail API rejected message");
                DeliveryStatus::Failed
            }
            Err(e) => {
                error!(%to, subject, error = %e, "mail API request failed");
                DeliveryStatus::Failed
            }
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_otp(&self, to: &str, name: &str, code: &str) -> DeliveryStatus {
        let text = format!(
            "Hi {name},\n\nYour LearnHub verification code is {code}. \
             It expires in 10 minutes.\n"
        );
        self.send(to, "Verify your email", &text).await
    }

    async fn send_reset_link(&self, to: &str, name: &str, link: &str) -> DeliveryStatus {
        let text = format!(
            "Hi {name},\n\nReset your LearnHub password here: {link}\n\
             The link expires in 10 minutes. If you did not request this, \
             you can ignore this email.\n"
        );
        self.send(to, "Reset your password", &text).await
    }

    async fn send_welcome(&self, to: &str, name: &str) -> DeliveryStatus {
        let text = format!("Hi {name},\n\nYour email is verified. Welcome to LearnHub!\n");
        self.send(to, "Welcome to LearnHub", &text).await
    }
}

/// Used when no mail API is configured and in tests.
#[derive(Clone, Default)]
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send_otp(&self, to: &str, _name: &str, _code: &str) -> DeliveryStatus {
        info!(%to, "mail not configured, skipping OTP email");
        DeliveryStatus::Skipped
    }

    async fn send_reset_link(&self, to: &str, _name: &str, _link: &str) -> DeliveryStatus {
        info!(%to, "mail not configured, skipping reset email");
        DeliveryStatus::Skipped
    }

    async fn send_welcome(&self, to: &str, _name: &str) -> DeliveryStatus {
        info!(%to, "mail not configured, skipping welcome email");
        DeliveryStatus::Skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_mailer_reports_skipped() {
        let mailer = NoopMailer;
        let status = mailer.send_otp("a@x.com", "Ann", "123456").await;
        assert_eq!(status, DeliveryStatus::Skipped);
        assert!(!status.is_sent());
    }

    #[test]
    fn outbound_message_serializes_expected_fields() {
        let msg = OutboundMessage {
            from: "no-reply@learnhub.app",
            to: "a@x.com",
            subject: "Verify your email",
            text: "code 123456",
        };
        let json = serde_json::to_string(&msg).expect("serialize");
        assert!(json.contains("\"from\""));
        assert!(json.contains("\"to\""));
        assert!(json.contains("\"subject\""));
        assert!(json.contains("\"text\""));
    }
}
