// Stripe REST API client
// Form-encoded requests with bearer auth, as the Stripe API expects.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, instrument};

use super::webhook::SubscriptionObject;
use super::{PaymentProviderApi, StripeApiError, SubscriptionSnapshot};

#[derive(Clone)]
pub struct StripeApiClient {
    client: Client,
    secret_key: String,
    api_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

impl StripeApiClient {
    pub fn new(secret_key: String, api_url: String, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            secret_key,
            api_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url.trim_end_matches('/'), path)
    }

    /// Create a subscription checkout session and return its redirect URL
    #[instrument(skip(self))]
    pub async fn create_checkout_session(
        &self,
        customer_email: &str,
        price_id: &str,
        client_reference_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, StripeApiError> {
        let params = [
            ("mode", "subscription"),
            ("customer_email", customer_email),
            ("client_reference_id", client_reference_id),
            ("line_items[0][price]", price_id),
            ("line_items[0][quantity]", "1"),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
        ];

        let response = self
            .client
            .post(self.url("/v1/checkout/sessions"))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| StripeApiError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Checkout session creation failed: {} {}", status, body);
            return Err(StripeApiError::BadStatus(status, body));
        }

        response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| StripeApiError::BadResponse(e.to_string()))
    }
}

#[async_trait]
impl PaymentProviderApi for StripeApiClient {
    #[instrument(skip(self))]
    async fn fetch_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionSnapshot, StripeApiError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/subscriptions/{}", subscription_id)))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| StripeApiError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Subscription fetch failed: {} {}", status, body);
            return Err(StripeApiError::BadStatus(status, body));
        }

        let sub = response
            .json::<SubscriptionObject>()
            .await
            .map_err(|e| StripeApiError::BadResponse(e.to_string()))?;

        Ok(SubscriptionSnapshot {
            subscription_id: sub.id.clone(),
            customer_id: sub.customer.clone(),
            status: sub.status.clone(),
            price_id: sub.price_id(),
            plan_name: sub.plan_name(),
            current_period_end: sub
                .current_period_end
                .and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
        })
    }
}
