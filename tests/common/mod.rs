// In-memory doubles for the persistence and provider traits

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use reviewflow_backend::db::{StoreError, StoreResult};
use reviewflow_backend::models::{
    CampaignMessage, CampaignSend, Contact, ContactCampaign, DripCampaign, EnrollmentStatus,
    NewContactCampaign, User,
};
use reviewflow_backend::services::campaign_engine::CampaignStore;
use reviewflow_backend::services::channels::{
    ChannelError, DispatchReceipt, EmailChannel, SmsChannel,
};
use reviewflow_backend::services::event_dedup::{DedupError, ProcessedEventStore};
use reviewflow_backend::services::reconciler::{SubscriptionPatch, UserStore};
use reviewflow_backend::services::shortener::UrlShortener;
use reviewflow_backend::services::stripe::{
    PaymentProviderApi, StripeApiError, SubscriptionSnapshot,
};

// ---------------------------------------------------------------------------
// Campaign store

#[derive(Default)]
pub struct MemoryCampaignStore {
    pub contacts: DashMap<Uuid, Contact>,
    pub campaigns: DashMap<Uuid, DripCampaign>,
    pub messages: DashMap<Uuid, Vec<CampaignMessage>>,
    pub enrollments: DashMap<Uuid, ContactCampaign>,
    pub sends: DashMap<(Uuid, Uuid), CampaignSend>,
}

impl MemoryCampaignStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_contact(&self, full_name: &str, email: &str, phone: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.contacts.insert(
            id,
            Contact {
                id,
                full_name: full_name.to_string(),
                email: email.to_string(),
                phone: phone.map(str::to_string),
                street: None,
                city: None,
                state: None,
                zip_code: None,
                country: None,
                origin: "manual".to_string(),
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn add_campaign(&self, name: &str, active: bool) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.campaigns.insert(
            id,
            DripCampaign {
                id,
                name: name.to_string(),
                description: None,
                trigger_type: "signup".to_string(),
                follow_up_condition: "no_open".to_string(),
                is_active: active,
                created_at: now,
                updated_at: now,
            },
        );
        self.messages.insert(id, Vec::new());
        id
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_message(
        &self,
        campaign_id: Uuid,
        position: i32,
        channel: &str,
        body: &str,
        subject: Option<&str>,
        link: Option<&str>,
        delay_minutes: i32,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let message = CampaignMessage {
            id,
            campaign_id,
            position,
            channel: channel.to_string(),
            body: body.to_string(),
            subject: subject.map(str::to_string),
            link: link.map(str::to_string),
            delay_minutes,
            created_at: Utc::now(),
        };
        self.messages.entry(campaign_id).or_default().push(message);
        id
    }

    pub fn send_count(&self, enrollment_id: Uuid) -> usize {
        self.sends
            .iter()
            .filter(|entry| entry.key().0 == enrollment_id)
            .count()
    }
}

#[async_trait]
impl CampaignStore for MemoryCampaignStore {
    async fn find_contact(&self, contact_id: Uuid) -> StoreResult<Option<Contact>> {
        Ok(self.contacts.get(&contact_id).map(|c| c.clone()))
    }

    async fn find_campaign(&self, campaign_id: Uuid) -> StoreResult<Option<DripCampaign>> {
        Ok(self.campaigns.get(&campaign_id).map(|c| c.clone()))
    }

    async fn campaign_messages(&self, campaign_id: Uuid) -> StoreResult<Vec<CampaignMessage>> {
        let mut messages = self
            .messages
            .get(&campaign_id)
            .map(|m| m.clone())
            .unwrap_or_default();
        messages.sort_by_key(|m| m.position);
        Ok(messages)
    }

    async fn find_enrollment(&self, enrollment_id: Uuid) -> StoreResult<Option<ContactCampaign>> {
        Ok(self.enrollments.get(&enrollment_id).map(|e| e.clone()))
    }

    async fn find_enrollment_for(
        &self,
        contact_id: Uuid,
        campaign_id: Uuid,
    ) -> StoreResult<Option<ContactCampaign>> {
        Ok(self
            .enrollments
            .iter()
            .find(|e| e.contact_id == contact_id && e.campaign_id == campaign_id)
            .map(|e| e.clone()))
    }

    async fn insert_enrollment(&self, new: NewContactCampaign) -> StoreResult<ContactCampaign> {
        // Same unique (contact_id, campaign_id) rule the table enforces
        let duplicate = self
            .enrollments
            .iter()
            .any(|e| e.contact_id == new.contact_id && e.campaign_id == new.campaign_id);
        if duplicate {
            return Err(StoreError::Conflict);
        }

        let now = Utc::now();
        let enrollment = ContactCampaign {
            id: new.id,
            contact_id: new.contact_id,
            campaign_id: new.campaign_id,
            status: new.status,
            last_sent_at: None,
            next_due_at: new.next_due_at,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        self.enrollments.insert(new.id, enrollment.clone());
        Ok(enrollment)
    }

    async fn try_claim(&self, enrollment_id: Uuid, expected_version: i32) -> StoreResult<bool> {
        match self.enrollments.get_mut(&enrollment_id) {
            Some(mut e) if e.version == expected_version => {
                e.version += 1;
                e.updated_at = Utc::now();
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    async fn record_send(
        &self,
        enrollment_id: Uuid,
        message_id: Uuid,
        sent_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let key = (enrollment_id, message_id);
        if self.sends.contains_key(&key) {
            return Ok(false);
        }
        self.sends.insert(
            key,
            CampaignSend {
                id: Uuid::new_v4(),
                enrollment_id,
                message_id,
                sent_at,
            },
        );
        Ok(true)
    }

    async fn finish_dispatch(
        &self,
        enrollment_id: Uuid,
        sent_at: DateTime<Utc>,
        next_due_at: Option<DateTime<Utc>>,
        new_status: EnrollmentStatus,
    ) -> StoreResult<()> {
        if let Some(mut e) = self.enrollments.get_mut(&enrollment_id) {
            let cancelled = EnrollmentStatus::from_str(&e.status)
                .map(|s| s.is_terminal())
                .unwrap_or(false);
            e.last_sent_at = Some(sent_at);
            if cancelled {
                e.next_due_at = None;
            } else {
                e.status = new_status.as_str().to_string();
                e.next_due_at = next_due_at;
            }
            e.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn sends_for_enrollment(&self, enrollment_id: Uuid) -> StoreResult<Vec<CampaignSend>> {
        let mut sends: Vec<CampaignSend> = self
            .sends
            .iter()
            .filter(|entry| entry.key().0 == enrollment_id)
            .map(|entry| entry.value().clone())
            .collect();
        sends.sort_by_key(|s| s.sent_at);
        Ok(sends)
    }

    async fn list_due(&self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        Ok(self
            .enrollments
            .iter()
            .filter(|e| {
                matches!(e.next_due_at, Some(due) if due <= now)
                    && matches!(e.status.as_str(), "pending" | "sent")
            })
            .map(|e| e.id)
            .collect())
    }

    async fn set_status(
        &self,
        enrollment_id: Uuid,
        status: EnrollmentStatus,
        clear_due: bool,
    ) -> StoreResult<bool> {
        match self.enrollments.get_mut(&enrollment_id) {
            Some(mut e) => {
                e.status = status.as_str().to_string();
                if clear_due {
                    e.next_due_at = None;
                }
                e.updated_at = Utc::now();
                Ok(true)
            },
            None => Ok(false),
        }
    }
}

/// Wrapper that serves one stale enrollment read, as if another dispatcher
/// claimed the row between this worker's read and its CAS attempt. With
/// `hide_existing` set it also answers one existence check with None, as if
/// a concurrent enroller inserted between this worker's check and insert.
pub struct StaleReadStore {
    pub inner: Arc<MemoryCampaignStore>,
    pub serve_stale: AtomicBool,
    pub hide_existing: AtomicBool,
}

impl StaleReadStore {
    pub fn new(inner: Arc<MemoryCampaignStore>) -> Self {
        Self {
            inner,
            serve_stale: AtomicBool::new(false),
            hide_existing: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl CampaignStore for StaleReadStore {
    async fn find_contact(&self, contact_id: Uuid) -> StoreResult<Option<Contact>> {
        self.inner.find_contact(contact_id).await
    }

    async fn find_campaign(&self, campaign_id: Uuid) -> StoreResult<Option<DripCampaign>> {
        self.inner.find_campaign(campaign_id).await
    }

    async fn campaign_messages(&self, campaign_id: Uuid) -> StoreResult<Vec<CampaignMessage>> {
        self.inner.campaign_messages(campaign_id).await
    }

    async fn find_enrollment(&self, enrollment_id: Uuid) -> StoreResult<Option<ContactCampaign>> {
        let mut enrollment = self.inner.find_enrollment(enrollment_id).await?;
        if self.serve_stale.swap(false, Ordering::SeqCst) {
            if let Some(e) = enrollment.as_mut() {
                e.version -= 1;
            }
        }
        Ok(enrollment)
    }

    async fn find_enrollment_for(
        &self,
        contact_id: Uuid,
        campaign_id: Uuid,
    ) -> StoreResult<Option<ContactCampaign>> {
        if self.hide_existing.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.find_enrollment_for(contact_id, campaign_id).await
    }

    async fn insert_enrollment(&self, new: NewContactCampaign) -> StoreResult<ContactCampaign> {
        self.inner.insert_enrollment(new).await
    }

    async fn try_claim(&self, enrollment_id: Uuid, expected_version: i32) -> StoreResult<bool> {
        self.inner.try_claim(enrollment_id, expected_version).await
    }

    async fn record_send(
        &self,
        enrollment_id: Uuid,
        message_id: Uuid,
        sent_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.inner.record_send(enrollment_id, message_id, sent_at).await
    }

    async fn finish_dispatch(
        &self,
        enrollment_id: Uuid,
        sent_at: DateTime<Utc>,
        next_due_at: Option<DateTime<Utc>>,
        new_status: EnrollmentStatus,
    ) -> StoreResult<()> {
        self.inner
            .finish_dispatch(enrollment_id, sent_at, next_due_at, new_status)
            .await
    }

    async fn sends_for_enrollment(&self, enrollment_id: Uuid) -> StoreResult<Vec<CampaignSend>> {
        self.inner.sends_for_enrollment(enrollment_id).await
    }

    async fn list_due(&self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        self.inner.list_due(now).await
    }

    async fn set_status(
        &self,
        enrollment_id: Uuid,
        status: EnrollmentStatus,
        clear_due: bool,
    ) -> StoreResult<bool> {
        self.inner.set_status(enrollment_id, status, clear_due).await
    }
}

// ---------------------------------------------------------------------------
// Channels and shortener

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub recipient: String,
    pub body: String,
    pub idempotency_key: String,
}

#[derive(Default)]
pub struct RecordingSmsChannel {
    pub sent: Mutex<Vec<SentMessage>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl SmsChannel for RecordingSmsChannel {
    async fn send_sms(
        &self,
        to_phone: &str,
        body: &str,
        idempotency_key: &str,
    ) -> Result<DispatchReceipt, ChannelError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChannelError::Unavailable("sms provider down".to_string()));
        }
        self.sent.lock().unwrap().push(SentMessage {
            recipient: to_phone.to_string(),
            body: body.to_string(),
            idempotency_key: idempotency_key.to_string(),
        });
        Ok(DispatchReceipt {
            provider_message_id: Some(format!("SM{}", self.sent.lock().unwrap().len())),
        })
    }
}

#[derive(Default)]
pub struct RecordingEmailChannel {
    pub sent: Mutex<Vec<SentMessage>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl EmailChannel for RecordingEmailChannel {
    async fn send_email(
        &self,
        to_email: &str,
        _subject: &str,
        body: &str,
        idempotency_key: &str,
    ) -> Result<DispatchReceipt, ChannelError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChannelError::Unavailable("email provider down".to_string()));
        }
        self.sent.lock().unwrap().push(SentMessage {
            recipient: to_email.to_string(),
            body: body.to_string(),
            idempotency_key: idempotency_key.to_string(),
        });
        Ok(DispatchReceipt {
            provider_message_id: None,
        })
    }
}

pub struct FixedShortener {
    pub short_url: String,
}

#[async_trait]
impl UrlShortener for FixedShortener {
    async fn shorten(&self, _url: &str) -> String {
        self.short_url.clone()
    }
}

pub struct PassthroughShortener;

#[async_trait]
impl UrlShortener for PassthroughShortener {
    async fn shorten(&self, url: &str) -> String {
        url.to_string()
    }
}

// ---------------------------------------------------------------------------
// Reconciler doubles

#[derive(Default)]
pub struct MemoryUserStore {
    pub users: DashMap<Uuid, User>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(
        &self,
        email: &str,
        customer_id: Option<&str>,
        subscription_id: Option<&str>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.users.insert(
            id,
            User {
                id,
                email: email.to_string(),
                password_hash: None,
                company_name: None,
                phone_number: None,
                about_company: None,
                agree_to_policy: true,
                is_google_user: false,
                stripe_customer_id: customer_id.map(str::to_string),
                stripe_subscription_id: subscription_id.map(str::to_string),
                subscription_status: None,
                subscription_plan: None,
                subscription_plan_name: None,
                subscription_period_end: None,
                subscription_version: 0,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn get(&self, user_id: Uuid) -> User {
        self.users.get(&user_id).expect("user exists").clone()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.get(&user_id).map(|u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let needle = email.to_lowercase();
        Ok(self
            .users
            .iter()
            .find(|u| u.email == needle)
            .map(|u| u.clone()))
    }

    async fn find_by_stripe_customer_id(&self, customer_id: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|u| u.stripe_customer_id.as_deref() == Some(customer_id))
            .map(|u| u.clone()))
    }

    async fn find_by_stripe_subscription_id(
        &self,
        subscription_id: &str,
    ) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|u| u.stripe_subscription_id.as_deref() == Some(subscription_id))
            .map(|u| u.clone()))
    }

    async fn apply_subscription_patch(
        &self,
        user_id: Uuid,
        expected_version: i32,
        patch: &SubscriptionPatch,
    ) -> StoreResult<bool> {
        match self.users.get_mut(&user_id) {
            Some(mut user) if user.subscription_version == expected_version => {
                match patch {
                    SubscriptionPatch::Snapshot(snapshot) => {
                        user.stripe_customer_id = Some(snapshot.customer_id.clone());
                        user.stripe_subscription_id = Some(snapshot.subscription_id.clone());
                        user.subscription_status = Some(snapshot.status.clone());
                        user.subscription_plan = snapshot.price_id.clone();
                        user.subscription_plan_name = snapshot.plan_name.clone();
                        user.subscription_period_end = snapshot.current_period_end;
                    },
                    SubscriptionPatch::Status { status } => {
                        user.subscription_status = Some(status.clone());
                    },
                    SubscriptionPatch::StatusAndPeriodEnd { status, period_end } => {
                        user.subscription_status = Some(status.clone());
                        user.subscription_period_end = *period_end;
                    },
                }
                user.subscription_version += 1;
                user.updated_at = Utc::now();
                Ok(true)
            },
            Some(_) => Ok(false),
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct MockPaymentProvider {
    pub subscriptions: DashMap<String, SubscriptionSnapshot>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_subscription(&self, snapshot: SubscriptionSnapshot) {
        self.subscriptions
            .insert(snapshot.subscription_id.clone(), snapshot);
    }
}

#[async_trait]
impl PaymentProviderApi for MockPaymentProvider {
    async fn fetch_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionSnapshot, StripeApiError> {
        self.subscriptions
            .get(subscription_id)
            .map(|s| s.clone())
            .ok_or_else(|| {
                StripeApiError::BadStatus(404, format!("no such subscription {}", subscription_id))
            })
    }
}

#[derive(Default)]
pub struct MemoryEventDedup {
    pub seen_ids: DashMap<String, ()>,
}

impl MemoryEventDedup {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessedEventStore for MemoryEventDedup {
    async fn seen(&self, event_id: &str) -> Result<bool, DedupError> {
        Ok(self.seen_ids.contains_key(event_id))
    }

    async fn mark_processed(&self, event_id: &str) -> Result<bool, DedupError> {
        Ok(self.seen_ids.insert(event_id.to_string(), ()).is_none())
    }
}
