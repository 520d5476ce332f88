// Drip campaign engine
//
// Scheduling is durable: every enrollment carries its own next_due_at column
// and a periodic sweep picks up due rows, so a restart loses nothing. The
// dispatch path guards against concurrent workers with a version
// compare-and-set and against double delivery with the unique sent log.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::{StoreError, StoreResult};
use crate::models::{
    CampaignMessage, CampaignSend, Contact, ContactCampaign, DripCampaign, EnrollmentStatus,
    MessageChannel, NewContactCampaign,
};
use crate::services::channels::{ChannelError, EmailChannel, SmsChannel};
use crate::services::shortener::UrlShortener;
use crate::services::template;

/// Persistence surface the engine runs against. Backed by Postgres in
/// production and by an in-memory double in tests.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn find_contact(&self, contact_id: Uuid) -> StoreResult<Option<Contact>>;
    async fn find_campaign(&self, campaign_id: Uuid) -> StoreResult<Option<DripCampaign>>;
    /// Messages for a campaign, ordered by position
    async fn campaign_messages(&self, campaign_id: Uuid) -> StoreResult<Vec<CampaignMessage>>;
    async fn find_enrollment(&self, enrollment_id: Uuid) -> StoreResult<Option<ContactCampaign>>;
    async fn find_enrollment_for(
        &self,
        contact_id: Uuid,
        campaign_id: Uuid,
    ) -> StoreResult<Option<ContactCampaign>>;
    async fn insert_enrollment(&self, new: NewContactCampaign) -> StoreResult<ContactCampaign>;
    /// Compare-and-set on the enrollment version; false means lost the race
    async fn try_claim(&self, enrollment_id: Uuid, expected_version: i32) -> StoreResult<bool>;
    /// Append to the sent log; false means the pair was already logged
    async fn record_send(
        &self,
        enrollment_id: Uuid,
        message_id: Uuid,
        sent_at: DateTime<Utc>,
    ) -> StoreResult<bool>;
    async fn finish_dispatch(
        &self,
        enrollment_id: Uuid,
        sent_at: DateTime<Utc>,
        next_due_at: Option<DateTime<Utc>>,
        new_status: EnrollmentStatus,
    ) -> StoreResult<()>;
    async fn sends_for_enrollment(&self, enrollment_id: Uuid) -> StoreResult<Vec<CampaignSend>>;
    async fn list_due(&self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>>;
    /// Returns false when the enrollment does not exist
    async fn set_status(
        &self,
        enrollment_id: Uuid,
        status: EnrollmentStatus,
        clear_due: bool,
    ) -> StoreResult<bool>;
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Contact not found")]
    ContactNotFound,

    #[error("Campaign not found")]
    CampaignNotFound,

    #[error("Campaign is not active")]
    CampaignInactive,

    #[error("Campaign has no messages")]
    CampaignEmpty,

    #[error("Enrollment not found")]
    EnrollmentNotFound,

    #[error("Contact has no usable recipient address: {0}")]
    NoRecipient(String),

    #[error("Enrollment claimed by a concurrent dispatcher")]
    ConcurrencyConflict,

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a dispatch attempt did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A message went out
    Sent { message_id: Uuid },
    /// Nothing to do: not due, terminal, or claimed by another worker
    Skipped { reason: String },
    /// All steps were already sent; the enrollment is now completed
    Completed,
}

/// Per-contact result of a bulk enrollment
#[derive(Debug)]
pub struct BulkEnrollReport {
    pub enrolled: Vec<ContactCampaign>,
    pub failed: Vec<(Uuid, String)>,
}

/// Tally from one sweep over due enrollments
#[derive(Debug, Default)]
pub struct SweepReport {
    pub sent: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct CampaignEngine {
    store: Arc<dyn CampaignStore>,
    sms: Arc<dyn SmsChannel>,
    email: Arc<dyn EmailChannel>,
    shortener: Arc<dyn UrlShortener>,
}

impl CampaignEngine {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        sms: Arc<dyn SmsChannel>,
        email: Arc<dyn EmailChannel>,
        shortener: Arc<dyn UrlShortener>,
    ) -> Self {
        Self {
            store,
            sms,
            email,
            shortener,
        }
    }

    /// Enroll a contact into a campaign. Idempotent per (contact, campaign):
    /// an existing enrollment is returned as-is rather than duplicated.
    #[instrument(skip(self))]
    pub async fn enroll(
        &self,
        contact_id: Uuid,
        campaign_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ContactCampaign, EngineError> {
        if self.store.find_contact(contact_id).await?.is_none() {
            return Err(EngineError::ContactNotFound);
        }

        let campaign = self
            .store
            .find_campaign(campaign_id)
            .await?
            .ok_or(EngineError::CampaignNotFound)?;
        if !campaign.is_active {
            return Err(EngineError::CampaignInactive);
        }

        let messages = self.store.campaign_messages(campaign_id).await?;
        let first = messages.first().ok_or(EngineError::CampaignEmpty)?;

        if let Some(existing) = self
            .store
            .find_enrollment_for(contact_id, campaign_id)
            .await?
        {
            return Ok(existing);
        }

        let inserted = self
            .store
            .insert_enrollment(NewContactCampaign {
                id: Uuid::new_v4(),
                contact_id,
                campaign_id,
                status: EnrollmentStatus::Pending.as_str().to_string(),
                next_due_at: Some(now + Duration::minutes(first.delay_minutes as i64)),
            })
            .await;

        let enrollment = match inserted {
            Ok(enrollment) => enrollment,
            // A concurrent enroll won the unique (contact, campaign) insert;
            // return its row instead
            Err(StoreError::Conflict) => {
                return self
                    .store
                    .find_enrollment_for(contact_id, campaign_id)
                    .await?
                    .ok_or(EngineError::EnrollmentNotFound);
            },
            Err(e) => return Err(e.into()),
        };
        info!(enrollment_id = %enrollment.id, "Contact enrolled");

        // A zero-delay first step goes out right away instead of waiting for
        // the next sweep. A channel failure here does not fail the enrollment.
        if first.delay_minutes == 0 {
            if let Err(e) = self.dispatch_next_due(enrollment.id, now).await {
                warn!(enrollment_id = %enrollment.id, "Immediate dispatch failed: {}", e);
            }
            if let Some(fresh) = self.store.find_enrollment(enrollment.id).await? {
                return Ok(fresh);
            }
        }

        Ok(enrollment)
    }

    /// Enroll many contacts. Failures are reported per contact; one bad
    /// contact never blocks the rest.
    #[instrument(skip(self, contact_ids), fields(count = contact_ids.len()))]
    pub async fn enroll_many(
        &self,
        contact_ids: &[Uuid],
        campaign_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<BulkEnrollReport, EngineError> {
        let mut report = BulkEnrollReport {
            enrolled: Vec::new(),
            failed: Vec::new(),
        };

        for &contact_id in contact_ids {
            match self.enroll(contact_id, campaign_id, now).await {
                Ok(enrollment) => report.enrolled.push(enrollment),
                // Campaign-level problems fail the whole batch
                Err(
                    e @ (EngineError::CampaignNotFound
                    | EngineError::CampaignInactive
                    | EngineError::CampaignEmpty),
                ) => return Err(e),
                Err(e) => report.failed.push((contact_id, e.to_string())),
            }
        }

        Ok(report)
    }

    /// Dispatch the next due message for one enrollment, if any.
    #[instrument(skip(self))]
    pub async fn dispatch_next_due(
        &self,
        enrollment_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome, EngineError> {
        let enrollment = self
            .store
            .find_enrollment(enrollment_id)
            .await?
            .ok_or(EngineError::EnrollmentNotFound)?;

        let status = EnrollmentStatus::from_str(&enrollment.status);
        if status.map(|s| s.is_terminal()).unwrap_or(true) {
            return Ok(DispatchOutcome::Skipped {
                reason: "enrollment is terminal".to_string(),
            });
        }

        match enrollment.next_due_at {
            Some(due) if due <= now => {},
            _ => {
                return Ok(DispatchOutcome::Skipped {
                    reason: "not due".to_string(),
                })
            },
        }

        let messages = self
            .store
            .campaign_messages(enrollment.campaign_id)
            .await?;
        let sent: HashSet<Uuid> = self
            .store
            .sends_for_enrollment(enrollment_id)
            .await?
            .into_iter()
            .map(|s| s.message_id)
            .collect();

        let Some((index, message)) = messages
            .iter()
            .enumerate()
            .find(|(_, m)| !sent.contains(&m.id))
        else {
            self.store
                .set_status(enrollment_id, EnrollmentStatus::Completed, true)
                .await?;
            return Ok(DispatchOutcome::Completed);
        };

        // Claim before any side effect; a lost race means another worker owns
        // this dispatch.
        if !self
            .store
            .try_claim(enrollment_id, enrollment.version)
            .await?
        {
            return Err(EngineError::ConcurrencyConflict);
        }

        let Some(contact) = self.store.find_contact(enrollment.contact_id).await? else {
            // Contact was deleted after enrollment. Nothing left to message.
            warn!(enrollment_id = %enrollment_id, "Enrollment references a deleted contact");
            self.store
                .set_status(enrollment_id, EnrollmentStatus::Completed, true)
                .await?;
            return Ok(DispatchOutcome::Skipped {
                reason: "contact no longer exists".to_string(),
            });
        };

        self.send_message(&enrollment, message, &contact).await?;
        let sent_at = Utc::now();

        if !self
            .store
            .record_send(enrollment_id, message.id, sent_at)
            .await?
        {
            warn!(
                enrollment_id = %enrollment_id,
                message_id = %message.id,
                "Send already logged for this step"
            );
        }

        let next_message = messages.get(index + 1);
        let (next_due, new_status) = match next_message {
            Some(next) => (
                Some(sent_at + Duration::minutes(next.delay_minutes as i64)),
                EnrollmentStatus::Sent,
            ),
            None => (None, EnrollmentStatus::Completed),
        };

        self.store
            .finish_dispatch(enrollment_id, sent_at, next_due, new_status)
            .await?;

        info!(
            enrollment_id = %enrollment_id,
            message_id = %message.id,
            position = message.position,
            "Message dispatched"
        );
        Ok(DispatchOutcome::Sent {
            message_id: message.id,
        })
    }

    async fn send_message(
        &self,
        enrollment: &ContactCampaign,
        message: &CampaignMessage,
        contact: &Contact,
    ) -> Result<(), EngineError> {
        let link = match &message.link {
            Some(url) => Some(self.shortener.shorten(url).await),
            None => None,
        };
        let body = template::render(&message.body, &contact.full_name, link.as_deref());

        // One key per (enrollment, message) so provider-side retries collapse
        let idempotency_key = format!("{}:{}", enrollment.id, message.id);

        match MessageChannel::from_str(&message.channel) {
            Some(MessageChannel::Sms) => {
                let phone = contact
                    .phone
                    .as_deref()
                    .ok_or_else(|| EngineError::NoRecipient("contact has no phone".to_string()))?;
                self.sms.send_sms(phone, &body, &idempotency_key).await?;
            },
            Some(MessageChannel::Email) => {
                let subject = message.subject.as_deref().unwrap_or("Follow-up");
                self.email
                    .send_email(&contact.email, subject, &body, &idempotency_key)
                    .await?;
            },
            None => {
                return Err(EngineError::Channel(ChannelError::Rejected(format!(
                    "Unknown channel '{}'",
                    message.channel
                ))))
            },
        }
        Ok(())
    }

    /// Enrollment ids whose next step has come due
    pub async fn list_due_enrollments(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, EngineError> {
        Ok(self.store.list_due(now).await?)
    }

    /// Dispatch every due enrollment once. Channel failures are counted and
    /// left for the next sweep; the failing enrollment stays dispatchable.
    #[instrument(skip(self))]
    pub async fn run_due_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, EngineError> {
        let due = self.store.list_due(now).await?;
        let mut report = SweepReport::default();

        for enrollment_id in due {
            match self.dispatch_next_due(enrollment_id, now).await {
                Ok(DispatchOutcome::Sent { .. }) => report.sent += 1,
                Ok(DispatchOutcome::Completed) => report.completed += 1,
                Ok(DispatchOutcome::Skipped { .. }) => report.skipped += 1,
                Err(EngineError::ConcurrencyConflict) => report.skipped += 1,
                Err(e) => {
                    warn!(enrollment_id = %enrollment_id, "Dispatch failed: {}", e);
                    report.failed += 1;
                },
            }
        }

        if report.sent + report.completed + report.failed > 0 {
            info!(
                sent = report.sent,
                completed = report.completed,
                skipped = report.skipped,
                failed = report.failed,
                "Due sweep finished"
            );
        }
        Ok(report)
    }

    /// Stop an enrollment. `responded` marks the contact as having replied;
    /// otherwise the enrollment is closed as completed. Either way no further
    /// step is scheduled.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        enrollment_id: Uuid,
        responded: bool,
    ) -> Result<(), EngineError> {
        let status = if responded {
            EnrollmentStatus::Responded
        } else {
            EnrollmentStatus::Completed
        };

        if !self.store.set_status(enrollment_id, status, true).await? {
            return Err(EngineError::EnrollmentNotFound);
        }
        Ok(())
    }
}
