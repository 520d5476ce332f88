// Stripe subscription reconciler
//
// Every event overwrites the user's subscription columns with the state the
// event (or a provider fetch) reports. Nothing is merged field by field, so
// replays and out-of-order deliveries converge on provider state instead of
// accumulating drift. Writes go through a version compare-and-set and retry
// on conflict.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::{StoreError, StoreResult};
use crate::models::User;
use crate::services::event_dedup::{DedupError, ProcessedEventStore};
use crate::services::stripe::webhook::{
    CheckoutSessionObject, InvoiceObject, SubscriptionObject, WebhookEvent, WebhookEventType,
};
use crate::services::stripe::{PaymentProviderApi, StripeApiError, SubscriptionSnapshot};

const MAX_APPLY_ATTEMPTS: u32 = 3;

/// User lookup and subscription writes, as seen by the reconciler
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, user_id: Uuid) -> StoreResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_by_stripe_customer_id(&self, customer_id: &str) -> StoreResult<Option<User>>;
    async fn find_by_stripe_subscription_id(
        &self,
        subscription_id: &str,
    ) -> StoreResult<Option<User>>;
    /// Overwrite the user's subscription columns where the version still
    /// matches. Returns false on a version conflict.
    async fn apply_subscription_patch(
        &self,
        user_id: Uuid,
        expected_version: i32,
        patch: &SubscriptionPatch,
    ) -> StoreResult<bool>;
}

/// The write an event resolves to. Snapshot replaces every subscription
/// column; the narrower variants come from invoice events that do not carry
/// the subscription object.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionPatch {
    Snapshot(SubscriptionSnapshot),
    Status { status: String },
    StatusAndPeriodEnd {
        status: String,
        period_end: Option<DateTime<Utc>>,
    },
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Unparseable event object: {0}")]
    BadEventObject(String),

    #[error("Version conflict persisted after {0} attempts")]
    ConflictExhausted(u32),

    #[error("Provider API error: {0}")]
    Provider(#[from] StripeApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dedup(#[from] DedupError),
}

/// What processing an event amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied,
    DuplicateSkipped,
    /// Unknown event type, missing identifiers, or no matching user
    Ignored,
}

pub struct SubscriptionReconciler {
    users: Arc<dyn UserStore>,
    provider: Arc<dyn PaymentProviderApi>,
    processed: Arc<dyn ProcessedEventStore>,
}

impl SubscriptionReconciler {
    pub fn new(
        users: Arc<dyn UserStore>,
        provider: Arc<dyn PaymentProviderApi>,
        processed: Arc<dyn ProcessedEventStore>,
    ) -> Self {
        Self {
            users,
            provider,
            processed,
        }
    }

    /// Process one verified webhook event end to end.
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    pub async fn handle_event(
        &self,
        event: &WebhookEvent,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        if self.processed.seen(&event.id).await? {
            info!("Duplicate event, skipping");
            return Ok(ReconcileOutcome::DuplicateSkipped);
        }

        let outcome = match &event.event_type {
            WebhookEventType::CheckoutSessionCompleted => {
                self.on_checkout_completed(&event.data_object).await?
            },
            WebhookEventType::SubscriptionUpdated | WebhookEventType::SubscriptionDeleted => {
                self.on_subscription_event(&event.data_object).await?
            },
            WebhookEventType::InvoicePaymentSucceeded => {
                self.on_invoice_payment(&event.data_object, true).await?
            },
            WebhookEventType::InvoicePaymentFailed => {
                self.on_invoice_payment(&event.data_object, false).await?
            },
            WebhookEventType::Unknown(kind) => {
                info!("Ignoring unhandled event type '{}'", kind);
                ReconcileOutcome::Ignored
            },
        };

        if !self.processed.mark_processed(&event.id).await? {
            // Another worker finished first; both applied the same overwrite
            info!("Event was marked processed concurrently");
        }
        Ok(outcome)
    }

    /// Checkout completion: link the Stripe customer/subscription to the user
    /// who started the session, then pull the authoritative subscription
    /// state from the provider.
    async fn on_checkout_completed(
        &self,
        object: &Value,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let session: CheckoutSessionObject = serde_json::from_value(object.clone())
            .map_err(|e| ReconcileError::BadEventObject(e.to_string()))?;

        let Some(subscription_id) = session.subscription.as_deref() else {
            warn!("Checkout session without a subscription, ignoring");
            return Ok(ReconcileOutcome::Ignored);
        };

        let user = match self.resolve_checkout_user(&session).await? {
            Some(user) => user,
            None => {
                warn!("No user matches checkout session, absorbing event");
                return Ok(ReconcileOutcome::Ignored);
            },
        };

        let snapshot = self.provider.fetch_subscription(subscription_id).await?;
        self.apply_with_retry(user.id, SubscriptionPatch::Snapshot(snapshot))
            .await?;
        Ok(ReconcileOutcome::Applied)
    }

    /// Subscription created/updated/deleted: the payload carries the full
    /// subscription object, which becomes the new local state verbatim.
    async fn on_subscription_event(
        &self,
        object: &Value,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let sub: SubscriptionObject = serde_json::from_value(object.clone())
            .map_err(|e| ReconcileError::BadEventObject(e.to_string()))?;

        let snapshot = SubscriptionSnapshot {
            subscription_id: sub.id.clone(),
            customer_id: sub.customer.clone(),
            status: sub.status.clone(),
            price_id: sub.price_id(),
            plan_name: sub.plan_name(),
            current_period_end: sub.period_end(),
        };

        let user = self
            .find_user(Some(sub.id.as_str()), Some(sub.customer.as_str()))
            .await?;
        let Some(user) = user else {
            warn!(subscription_id = %sub.id, "No user for subscription event, absorbing");
            return Ok(ReconcileOutcome::Ignored);
        };

        self.apply_with_retry(user.id, SubscriptionPatch::Snapshot(snapshot))
            .await?;
        Ok(ReconcileOutcome::Applied)
    }

    /// Invoice outcome: success refreshes full state from the provider so a
    /// past_due account recovers; failure flips the status to past_due.
    async fn on_invoice_payment(
        &self,
        object: &Value,
        succeeded: bool,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let invoice: InvoiceObject = serde_json::from_value(object.clone())
            .map_err(|e| ReconcileError::BadEventObject(e.to_string()))?;

        let user = self
            .find_user(invoice.subscription.as_deref(), invoice.customer.as_deref())
            .await?;
        let Some(user) = user else {
            warn!("No user for invoice event, absorbing");
            return Ok(ReconcileOutcome::Ignored);
        };

        let patch = if succeeded {
            match invoice.subscription.as_deref() {
                Some(subscription_id) => {
                    let snapshot = self.provider.fetch_subscription(subscription_id).await?;
                    SubscriptionPatch::Snapshot(snapshot)
                },
                None => SubscriptionPatch::Status {
                    status: "active".to_string(),
                },
            }
        } else {
            SubscriptionPatch::Status {
                status: "past_due".to_string(),
            }
        };

        self.apply_with_retry(user.id, patch).await?;
        Ok(ReconcileOutcome::Applied)
    }

    /// Client reference id first (sessions we created), then a previously
    /// linked customer id, then the buyer's email. The email path covers
    /// first-time subscribers arriving through a payment link, where no
    /// reference id exists and no customer has been linked yet.
    async fn resolve_checkout_user(
        &self,
        session: &CheckoutSessionObject,
    ) -> StoreResult<Option<User>> {
        if let Some(reference) = session.client_reference_id.as_deref() {
            if let Ok(user_id) = reference.parse::<Uuid>() {
                if let Some(user) = self.users.find_by_id(user_id).await? {
                    return Ok(Some(user));
                }
            }
        }
        if let Some(customer) = session.customer.as_deref() {
            if let Some(user) = self.users.find_by_stripe_customer_id(customer).await? {
                return Ok(Some(user));
            }
        }
        if let Some(email) = session.buyer_email() {
            return self.users.find_by_email(email).await;
        }
        Ok(None)
    }

    async fn find_user(
        &self,
        subscription_id: Option<&str>,
        customer_id: Option<&str>,
    ) -> StoreResult<Option<User>> {
        if let Some(sid) = subscription_id {
            if let Some(user) = self.users.find_by_stripe_subscription_id(sid).await? {
                return Ok(Some(user));
            }
        }
        if let Some(cid) = customer_id {
            return self.users.find_by_stripe_customer_id(cid).await;
        }
        Ok(None)
    }

    /// Re-read the user and retry on version conflict. Each attempt applies
    /// the same patch, so whichever write lands last is still a full
    /// overwrite of the columns it names.
    async fn apply_with_retry(
        &self,
        user_id: Uuid,
        patch: SubscriptionPatch,
    ) -> Result<(), ReconcileError> {
        for _attempt in 0..MAX_APPLY_ATTEMPTS {
            let Some(user) = self.users.find_by_id(user_id).await? else {
                warn!(user_id = %user_id, "User vanished mid-reconcile, absorbing");
                return Ok(());
            };

            if self
                .users
                .apply_subscription_patch(user_id, user.subscription_version, &patch)
                .await?
            {
                info!(user_id = %user_id, "Subscription state applied");
                return Ok(());
            }
            warn!(user_id = %user_id, "Version conflict applying patch, retrying");
        }
        Err(ReconcileError::ConflictExhausted(MAX_APPLY_ATTEMPTS))
    }
}
