// Stripe integration
// Webhook verification plus the small slice of the REST API the backend
// needs (subscription lookup, checkout session creation).

pub mod client;
pub mod webhook;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use client::StripeApiClient;
pub use webhook::{WebhookEvent, WebhookEventType, WebhookVerifier};

#[derive(Error, Debug)]
pub enum StripeApiError {
    #[error("Stripe request failed: {0}")]
    RequestFailed(String),

    #[error("Stripe returned status {0}: {1}")]
    BadStatus(u16, String),

    #[error("Unparseable Stripe response: {0}")]
    BadResponse(String),
}

/// Full subscription state as reported by Stripe. Applied as a whole:
/// local subscription columns are overwritten, never merged field by field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionSnapshot {
    pub subscription_id: String,
    pub customer_id: String,
    pub status: String,
    pub price_id: Option<String>,
    pub plan_name: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
}

/// Read access to the payment provider, used when a webhook payload does not
/// carry the full subscription object
#[async_trait]
pub trait PaymentProviderApi: Send + Sync {
    async fn fetch_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionSnapshot, StripeApiError>;
}
