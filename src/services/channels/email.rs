// Email channel adapter backed by the Resend API

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, instrument};

use super::{ChannelError, DispatchReceipt, EmailChannel};

/// Email sender posting to Resend's send endpoint
#[derive(Clone)]
pub struct ResendEmailChannel {
    client: Client,
    api_key: String,
    api_url: String,
    from_email: String,
    from_name: String,
}

#[derive(Serialize)]
struct ResendEmailPayload<'a> {
    from: String,
    to: Vec<&'a str>,
    subject: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct ResendEmailResponse {
    id: Option<String>,
}

impl ResendEmailChannel {
    pub fn new(
        api_key: String,
        api_url: String,
        from_email: String,
        from_name: String,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_key,
            api_url,
            from_email,
            from_name,
        }
    }

    fn from_header(&self) -> String {
        if self.from_name.is_empty() {
            self.from_email.clone()
        } else {
            format!("{} <{}>", self.from_name, self.from_email)
        }
    }
}

#[async_trait]
impl EmailChannel for ResendEmailChannel {
    #[instrument(skip(self, body), fields(subject = %subject))]
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        body: &str,
        idempotency_key: &str,
    ) -> Result<DispatchReceipt, ChannelError> {
        let payload = ResendEmailPayload {
            from: self.from_header(),
            to: vec![to_email],
            subject,
            text: body,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Idempotency-Key", idempotency_key)
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(res) if res.status().is_success() => {
                let parsed = res.json::<ResendEmailResponse>().await.ok();
                info!("Email handed off to provider");
                Ok(DispatchReceipt {
                    provider_message_id: parsed.and_then(|p| p.id),
                })
            },
            Ok(res) => {
                let status = res.status();
                let error_text = res
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                error!(
                    "Email send failed. Status: {}, Error: {}",
                    status, error_text
                );

                if status.as_u16() == 429 {
                    Err(ChannelError::RateLimitExceeded)
                } else if status.is_server_error() {
                    Err(ChannelError::Unavailable(format!(
                        "Provider returned {}",
                        status
                    )))
                } else {
                    Err(ChannelError::Rejected(format!(
                        "Status {}: {}",
                        status, error_text
                    )))
                }
            },
            Err(e) => {
                error!("Network error while sending email: {:?}", e);
                Err(ChannelError::Unavailable(format!("Network error: {}", e)))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_header_with_name() {
        let channel = ResendEmailChannel::new(
            "key".into(),
            "https://api.resend.com/emails".into(),
            "no-reply@reviewflow.io".into(),
            "ReviewFlow".into(),
            Duration::from_secs(10),
        );
        assert_eq!(channel.from_header(), "ReviewFlow <no-reply@reviewflow.io>");
    }

    #[test]
    fn test_from_header_without_name() {
        let channel = ResendEmailChannel::new(
            "key".into(),
            "https://api.resend.com/emails".into(),
            "no-reply@reviewflow.io".into(),
            String::new(),
            Duration::from_secs(10),
        );
        assert_eq!(channel.from_header(), "no-reply@reviewflow.io");
    }
}
