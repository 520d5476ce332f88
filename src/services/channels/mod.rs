// Outbound message channels
// Each adapter takes an idempotency key derived from (enrollment, message) so
// a retried dispatch can be deduplicated at the provider edge.

pub mod email;
pub mod sms;

use async_trait::async_trait;
use thiserror::Error;

pub use email::ResendEmailChannel;
pub use sms::TwilioSmsChannel;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Provider rejected message: {0}")]
    Rejected(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

/// Receipt returned by a provider on successful delivery handoff
#[derive(Debug, Clone)]
pub struct DispatchReceipt {
    pub provider_message_id: Option<String>,
}

/// Outbound SMS delivery
#[async_trait]
pub trait SmsChannel: Send + Sync {
    async fn send_sms(
        &self,
        to_phone: &str,
        body: &str,
        idempotency_key: &str,
    ) -> Result<DispatchReceipt, ChannelError>;
}

/// Outbound email delivery
#[async_trait]
pub trait EmailChannel: Send + Sync {
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        body: &str,
        idempotency_key: &str,
    ) -> Result<DispatchReceipt, ChannelError>;
}
