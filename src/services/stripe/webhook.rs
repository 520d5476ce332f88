// Stripe webhook signature verification and event parsing
//
// Signatures use the `Stripe-Signature` header scheme: `t=<unix ts>,v1=<hex
// hmac>` where the HMAC-SHA256 input is `<t>.<raw body>` keyed by the
// endpoint secret. Comparison is constant time and timestamps older than the
// tolerance window are refused.

use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;
use tracing::instrument;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of a signed webhook, in seconds
pub const SIGNATURE_TOLERANCE_SECONDS: i64 = 300;

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Missing or malformed signature header")]
    MalformedHeader,

    #[error("Signature mismatch")]
    SignatureMismatch,

    #[error("Signature timestamp outside tolerance")]
    TimestampOutOfTolerance,

    #[error("Unparseable event payload: {0}")]
    BadPayload(String),
}

/// Event categories the reconciler acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventType {
    CheckoutSessionCompleted,
    SubscriptionUpdated,
    SubscriptionDeleted,
    InvoicePaymentSucceeded,
    InvoicePaymentFailed,
    Unknown(String),
}

impl WebhookEventType {
    fn from_str(raw: &str) -> Self {
        match raw {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            "invoice.payment_succeeded" => Self::InvoicePaymentSucceeded,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// A verified, parsed webhook event
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub id: String,
    pub event_type: WebhookEventType,
    /// The `data.object` payload, left as raw JSON until the handler knows
    /// which shape to expect
    pub data_object: Value,
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: Value,
}

/// Checkout session fields consumed on `checkout.session.completed`
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    pub customer: Option<String>,
    pub subscription: Option<String>,
    pub client_reference_id: Option<String>,
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
}

impl CheckoutSessionObject {
    /// The buyer's email as Stripe reports it. Sessions created through the
    /// API carry `customer_email`; payment links fill `customer_details`.
    pub fn buyer_email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.as_deref())
            .or(self.customer_email.as_deref())
    }
}

/// Subscription fields consumed on subscription lifecycle events
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    pub customer: String,
    pub status: String,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub items: SubscriptionItems,
    pub plan: Option<PlanObject>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    pub price: Option<PriceObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceObject {
    pub id: String,
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanObject {
    pub id: Option<String>,
    pub nickname: Option<String>,
}

/// Invoice fields consumed on payment outcome events
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceObject {
    pub customer: Option<String>,
    pub subscription: Option<String>,
}

impl SubscriptionObject {
    pub fn price_id(&self) -> Option<String> {
        self.items
            .data
            .first()
            .and_then(|item| item.price.as_ref())
            .map(|p| p.id.clone())
    }

    pub fn plan_name(&self) -> Option<String> {
        self.items
            .data
            .first()
            .and_then(|item| item.price.as_ref())
            .and_then(|p| p.nickname.clone())
            .or_else(|| self.plan.as_ref().and_then(|p| p.nickname.clone()))
    }

    pub fn period_end(&self) -> Option<DateTime<Utc>> {
        self.current_period_end
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
    }
}

/// Verifies webhook signatures against the endpoint secret
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
}

impl WebhookVerifier {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    /// Verify the signature header against the raw body, then parse the
    /// event. The raw body bytes must be exactly what Stripe sent.
    #[instrument(skip(self, payload, signature_header))]
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: DateTime<Utc>,
    ) -> Result<WebhookEvent, WebhookError> {
        let (timestamp, candidate_sigs) = parse_signature_header(signature_header)?;

        let age = now.timestamp() - timestamp;
        if age.abs() > SIGNATURE_TOLERANCE_SECONDS {
            return Err(WebhookError::TimestampOutOfTolerance);
        }

        let expected = compute_signature(&self.secret, timestamp, payload);
        let matched = candidate_sigs
            .iter()
            .any(|candidate| constant_time_eq(candidate.as_bytes(), expected.as_bytes()));
        if !matched {
            return Err(WebhookError::SignatureMismatch);
        }

        let raw: RawEvent = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::BadPayload(e.to_string()))?;

        Ok(WebhookEvent {
            id: raw.id,
            event_type: WebhookEventType::from_str(&raw.event_type),
            data_object: raw.data.object,
        })
    }
}

fn parse_signature_header(header: &str) -> Result<(i64, Vec<String>), WebhookError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let mut kv = part.splitn(2, '=');
        match (kv.next().map(str::trim), kv.next()) {
            (Some("t"), Some(value)) => {
                timestamp = value.parse::<i64>().ok();
            },
            (Some("v1"), Some(value)) => {
                signatures.push(value.to_string());
            },
            _ => {},
        }
    }

    match (timestamp, signatures.is_empty()) {
        (Some(ts), false) => Ok((ts, signatures)),
        _ => Err(WebhookError::MalformedHeader),
    }
}

fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn sign(payload: &str, timestamp: i64) -> String {
        format!(
            "t={},v1={}",
            timestamp,
            compute_signature(SECRET, timestamp, payload.as_bytes())
        )
    }

    fn sample_event() -> String {
        serde_json::json!({
            "id": "evt_123",
            "type": "customer.subscription.updated",
            "data": {
                "object": {
                    "id": "sub_123",
                    "customer": "cus_123",
                    "status": "active",
                    "current_period_end": 1767225600,
                    "items": {
                        "data": [{"price": {"id": "price_123", "nickname": "Pro"}}]
                    }
                }
            }
        })
        .to_string()
    }

    #[test]
    fn test_valid_signature_accepted() {
        let verifier = WebhookVerifier::new(SECRET.to_string());
        let payload = sample_event();
        let now = Utc::now();
        let header = sign(&payload, now.timestamp());

        let event = verifier
            .verify_and_parse(payload.as_bytes(), &header, now)
            .expect("signature should verify");
        assert_eq!(event.id, "evt_123");
        assert_eq!(event.event_type, WebhookEventType::SubscriptionUpdated);
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let verifier = WebhookVerifier::new(SECRET.to_string());
        let payload = sample_event();
        let now = Utc::now();
        let header = sign(&payload, now.timestamp());

        let tampered = payload.replace("active", "canceled");
        let result = verifier.verify_and_parse(tampered.as_bytes(), &header, now);
        assert!(matches!(result, Err(WebhookError::SignatureMismatch)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let verifier = WebhookVerifier::new("whsec_other".to_string());
        let payload = sample_event();
        let now = Utc::now();
        let header = sign(&payload, now.timestamp());

        let result = verifier.verify_and_parse(payload.as_bytes(), &header, now);
        assert!(matches!(result, Err(WebhookError::SignatureMismatch)));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let verifier = WebhookVerifier::new(SECRET.to_string());
        let payload = sample_event();
        let now = Utc::now();
        let stale = now.timestamp() - SIGNATURE_TOLERANCE_SECONDS - 1;
        let header = sign(&payload, stale);

        let result = verifier.verify_and_parse(payload.as_bytes(), &header, now);
        assert!(matches!(result, Err(WebhookError::TimestampOutOfTolerance)));
    }

    #[test]
    fn test_malformed_header_rejected() {
        let verifier = WebhookVerifier::new(SECRET.to_string());
        let payload = sample_event();
        let result = verifier.verify_and_parse(payload.as_bytes(), "garbage", Utc::now());
        assert!(matches!(result, Err(WebhookError::MalformedHeader)));
    }

    #[test]
    fn test_multiple_v1_signatures_any_match() {
        let verifier = WebhookVerifier::new(SECRET.to_string());
        let payload = sample_event();
        let now = Utc::now();
        let good = compute_signature(SECRET, now.timestamp(), payload.as_bytes());
        let header = format!("t={},v1={},v1={}", now.timestamp(), "0".repeat(64), good);

        assert!(verifier
            .verify_and_parse(payload.as_bytes(), &header, now)
            .is_ok());
    }

    #[test]
    fn test_subscription_object_accessors() {
        let payload = sample_event();
        let raw: serde_json::Value = serde_json::from_str(&payload).unwrap();
        let sub: SubscriptionObject =
            serde_json::from_value(raw["data"]["object"].clone()).unwrap();
        assert_eq!(sub.price_id().as_deref(), Some("price_123"));
        assert_eq!(sub.plan_name().as_deref(), Some("Pro"));
        assert!(sub.period_end().is_some());
    }

    #[test]
    fn test_unknown_event_type() {
        assert_eq!(
            WebhookEventType::from_str("charge.refunded"),
            WebhookEventType::Unknown("charge.refunded".to_string())
        );
    }
}
