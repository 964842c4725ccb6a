use crate::config::EmailConfig;
use crate::error::{AppError, AppResult};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Thin client for a JSON email delivery API
pub struct EmailClient {
    client: reqwest::Client,
    config: EmailConfig,
}

impl EmailClient {
    pub fn new(config: EmailConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Deliver a plain-text email; without a provider the message is only logged
    pub async fn send(&self, to: &str, subject: &str, text: &str) -> AppResult<()> {
        let Some(url) = self.config.api_url.as_deref() else {
            info!("Email delivery not configured; would send to {}: {}", to, subject);
            return Ok(());
        };

        let body = OutgoingEmail {
            from: &self.config.from,
            to,
            subject,
            text,
        };

        let mut request = self.client.post(url).json(&body);
        if let Some(key) = self.config.api_key.as_deref() {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Email request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Email provider returned {}",
                response.status()
            )));
        }

        info!("Email sent to {}: {}", to, subject);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_client_logs_and_succeeds() {
        let client = EmailClient::new(EmailConfig::default());
        assert!(!client.is_configured());
        client
            .send("someone@example.com", "Invitation", "Join us")
            .await
            .unwrap();
    }

    #[test]
    fn test_payload_shape() {
        let json = serde_json::to_value(OutgoingEmail {
            from: "a@example.com",
            to: "b@example.com",
            subject: "Hi",
            text: "Body",
        })
        .unwrap();
        assert_eq!(json["from"], "a@example.com");
        assert_eq!(json["to"], "b@example.com");
        assert_eq!(json["subject"], "Hi");
        assert_eq!(json["text"], "Body");
    }
}
