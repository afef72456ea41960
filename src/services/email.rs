//! Email providers.
//!
//! [`HttpEmailProvider`] posts JSON to a transactional email API. Without an
//! endpoint configured, [`LogEmailProvider`] records the message in the log
//! and reports it as delivered.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::EmailConfig;
use crate::models::EmailMessage;

/// Plain-text body used when a message only has HTML.
pub const DEFAULT_TEXT_BODY: &str =
    "Dit is een HTML e-mail. Zet uw e-mailclient op HTML-modus.";

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Email request failed: {0}")]
    Transport(String),

    #[error("Email provider response could not be read: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for EmailError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EmailError::InvalidResponse(err.to_string())
        } else {
            EmailError::Transport(err.to_string())
        }
    }
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Delivers one message and returns the provider's message id.
    async fn send(&self, message: &EmailMessage) -> Result<String, EmailError>;
}

#[derive(Debug, Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SentEmail {
    #[serde(alias = "messageId", alias = "message_id")]
    id: String,
}

pub struct HttpEmailProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    from_address: String,
    reply_to: Option<String>,
}

impl HttpEmailProvider {
    pub fn new(api_url: impl Into<String>, config: &EmailConfig) -> Result<Self, EmailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key: config.api_key.clone(),
            from_address: config.from_address.clone(),
            reply_to: config.reply_to.clone(),
        })
    }
}

#[async_trait]
impl EmailProvider for HttpEmailProvider {
    #[instrument(skip(self, message), fields(to = %message.to))]
    async fn send(&self, message: &EmailMessage) -> Result<String, EmailError> {
        let body = OutgoingEmail {
            from: &self.from_address,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
            text: message.text.as_deref().unwrap_or(DEFAULT_TEXT_BODY),
            reply_to: message.reply_to.as_deref().or(self.reply_to.as_deref()),
        };

        let mut request = self.client.post(&self.api_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmailError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let sent: SentEmail = response.json().await?;
        info!(message_id = %sent.id, "email sent");
        Ok(sent.id)
    }
}

#[derive(Clone, Debug, Default)]
pub struct LogEmailProvider;

#[async_trait]
impl EmailProvider for LogEmailProvider {
    async fn send(&self, message: &EmailMessage) -> Result<String, EmailError> {
        let message_id = format!(
            "local-{}-{}",
            Utc::now().timestamp_millis(),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        info!(
            %message_id,
            to = %message.to,
            subject = %message.subject,
            "email provider not configured; message logged only"
        );
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> EmailMessage {
        EmailMessage {
            to: "klant@example.nl".into(),
            subject: "Bestelbevestiging - GE-1".into(),
            html: "<p>Bedankt</p>".into(),
            text: None,
            reply_to: None,
        }
    }

    fn provider(server: &MockServer) -> HttpEmailProvider {
        let config = EmailConfig {
            api_key: Some("mail-key".into()),
            reply_to: Some("info@gameshopenter.nl".into()),
            ..EmailConfig::default()
        };
        HttpEmailProvider::new(format!("{}/emails", server.uri()), &config).unwrap()
    }

    #[tokio::test]
    async fn http_provider_posts_message_with_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(bearer_token("mail-key"))
            .and(body_partial_json(json!({
                "to": "klant@example.nl",
                "text": DEFAULT_TEXT_BODY,
                "reply_to": "info@gameshopenter.nl"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "msg_123"})))
            .expect(1)
            .mount(&server)
            .await;

        let id = provider(&server).send(&message()).await.unwrap();
        assert_eq!(id, "msg_123");
    }

    #[tokio::test]
    async fn http_provider_reports_rejections() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid recipient"))
            .mount(&server)
            .await;

        match provider(&server).send(&message()).await {
            Err(EmailError::Provider { status, message }) => {
                assert_eq!(status, 422);
                assert_eq!(message, "invalid recipient");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn log_provider_always_delivers() {
        let id = LogEmailProvider.send(&message()).await.unwrap();
        assert!(id.starts_with("local-"));
    }
}
