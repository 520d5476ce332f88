// Twilio SMS channel adapter

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info, instrument};

use super::{ChannelError, DispatchReceipt, SmsChannel};

/// SMS sender backed by the Twilio Messages API
#[derive(Clone)]
pub struct TwilioSmsChannel {
    client: Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    api_url: String,
}

#[derive(Deserialize)]
struct TwilioMessageResponse {
    sid: Option<String>,
}

impl TwilioSmsChannel {
    pub fn new(
        account_sid: String,
        auth_token: String,
        from_number: String,
        api_url: String,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            account_sid,
            auth_token,
            from_number,
            api_url,
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_url.trim_end_matches('/'),
            self.account_sid
        )
    }
}

#[async_trait]
impl SmsChannel for TwilioSmsChannel {
    #[instrument(skip(self, body))]
    async fn send_sms(
        &self,
        to_phone: &str,
        body: &str,
        idempotency_key: &str,
    ) -> Result<DispatchReceipt, ChannelError> {
        let params = [
            ("To", to_phone),
            ("From", self.from_number.as_str()),
            ("Body", body),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .header("Idempotency-Key", idempotency_key)
            .form(&params)
            .send()
            .await;

        match response {
            Ok(res) if res.status().is_success() => {
                let parsed = res.json::<TwilioMessageResponse>().await.ok();
                info!("SMS handed off to provider");
                Ok(DispatchReceipt {
                    provider_message_id: parsed.and_then(|p| p.sid),
                })
            },
            Ok(res) => {
                let status = res.status();
                let error_text = res
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                error!("SMS send failed. Status: {}, Error: {}", status, error_text);

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
                error!("Network error while sending SMS: {:?}", e);
                Err(ChannelError::Unavailable(format!("Network error: {}", e)))
            },
        }
    }
}
