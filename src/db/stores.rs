// Postgres-backed implementations of the persistence traits
// Thin adapters: connection checkout plus delegation to the model queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use super::{DieselPool, StoreResult};
use crate::models::{
    CampaignMessage, CampaignSend, Contact, ContactCampaign, DripCampaign, EnrollmentStatus,
    NewContactCampaign, User,
};
use crate::services::campaign_engine::CampaignStore;
use crate::services::reconciler::{SubscriptionPatch, UserStore};

#[derive(Clone)]
pub struct PgCampaignStore {
    pool: DieselPool,
}

impl PgCampaignStore {
    pub fn new(pool: DieselPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignStore for PgCampaignStore {
    async fn find_contact(&self, contact_id: Uuid) -> StoreResult<Option<Contact>> {
        let mut conn = self.pool.get().await?;
        Ok(Contact::find_by_id(&mut conn, contact_id).await?)
    }

    async fn find_campaign(&self, campaign_id: Uuid) -> StoreResult<Option<DripCampaign>> {
        let mut conn = self.pool.get().await?;
        Ok(DripCampaign::find_by_id(&mut conn, campaign_id).await?)
    }

    async fn campaign_messages(&self, campaign_id: Uuid) -> StoreResult<Vec<CampaignMessage>> {
        let mut conn = self.pool.get().await?;
        Ok(CampaignMessage::for_campaign(&mut conn, campaign_id).await?)
    }

    async fn find_enrollment(&self, enrollment_id: Uuid) -> StoreResult<Option<ContactCampaign>> {
        let mut conn = self.pool.get().await?;
        Ok(ContactCampaign::find_by_id(&mut conn, enrollment_id).await?)
    }

    async fn find_enrollment_for(
        &self,
        contact: Uuid,
        campaign: Uuid,
    ) -> StoreResult<Option<ContactCampaign>> {
        use crate::schema::contact_campaigns::dsl;

        let mut conn = self.pool.get().await?;
        Ok(dsl::contact_campaigns
            .filter(dsl::contact_id.eq(contact))
            .filter(dsl::campaign_id.eq(campaign))
            .first::<ContactCampaign>(&mut conn)
            .await
            .optional()?)
    }

    async fn insert_enrollment(&self, new: NewContactCampaign) -> StoreResult<ContactCampaign> {
        let mut conn = self.pool.get().await?;
        Ok(ContactCampaign::insert(&mut conn, new).await?)
    }

    async fn try_claim(&self, enrollment_id: Uuid, expected_version: i32) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        Ok(ContactCampaign::try_claim(&mut conn, enrollment_id, expected_version).await?)
    }

    async fn record_send(
        &self,
        enrollment_id: Uuid,
        message_id: Uuid,
        sent_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        Ok(ContactCampaign::record_send(&mut conn, enrollment_id, message_id, sent_at).await?)
    }

    async fn finish_dispatch(
        &self,
        enrollment_id: Uuid,
        sent_at: DateTime<Utc>,
        next_due_at: Option<DateTime<Utc>>,
        new_status: EnrollmentStatus,
    ) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        Ok(
            ContactCampaign::finish_dispatch(
                &mut conn,
                enrollment_id,
                sent_at,
                next_due_at,
                new_status,
            )
            .await?,
        )
    }

    async fn sends_for_enrollment(&self, enrollment_id: Uuid) -> StoreResult<Vec<CampaignSend>> {
        let mut conn = self.pool.get().await?;
        Ok(CampaignSend::for_enrollment(&mut conn, enrollment_id).await?)
    }

    async fn list_due(&self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        let mut conn = self.pool.get().await?;
        Ok(ContactCampaign::list_due(&mut conn, now).await?)
    }

    async fn set_status(
        &self,
        enrollment_id: Uuid,
        status: EnrollmentStatus,
        clear_due: bool,
    ) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        let updated =
            ContactCampaign::set_status(&mut conn, enrollment_id, status, clear_due).await?;
        Ok(updated == 1)
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: DieselPool,
}

impl PgUserStore {
    pub fn new(pool: DieselPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        let mut conn = self.pool.get().await?;
        Ok(User::find_by_id(&mut conn, user_id).await?)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let mut conn = self.pool.get().await?;
        Ok(User::find_by_email(&mut conn, email).await?)
    }

    async fn find_by_stripe_customer_id(&self, customer_id: &str) -> StoreResult<Option<User>> {
        let mut conn = self.pool.get().await?;
        Ok(User::find_by_stripe_customer_id(&mut conn, customer_id).await?)
    }

    async fn find_by_stripe_subscription_id(
        &self,
        subscription_id: &str,
    ) -> StoreResult<Option<User>> {
        let mut conn = self.pool.get().await?;
        Ok(User::find_by_stripe_subscription_id(&mut conn, subscription_id).await?)
    }

    async fn apply_subscription_patch(
        &self,
        user_id: Uuid,
        expected_version: i32,
        patch: &SubscriptionPatch,
    ) -> StoreResult<bool> {
        use crate::schema::users::dsl;

        let mut conn = self.pool.get().await?;
        let target = dsl::users
            .find(user_id)
            .filter(dsl::subscription_version.eq(expected_version));

        let updated = match patch {
            SubscriptionPatch::Snapshot(snapshot) => {
                diesel::update(target)
                    .set((
                        dsl::stripe_customer_id.eq(Some(snapshot.customer_id.clone())),
                        dsl::stripe_subscription_id.eq(Some(snapshot.subscription_id.clone())),
                        dsl::subscription_status.eq(Some(snapshot.status.clone())),
                        dsl::subscription_plan.eq(snapshot.price_id.clone()),
                        dsl::subscription_plan_name.eq(snapshot.plan_name.clone()),
                        dsl::subscription_period_end.eq(snapshot.current_period_end),
                        dsl::subscription_version.eq(expected_version + 1),
                        dsl::updated_at.eq(Utc::now()),
                    ))
                    .execute(&mut conn)
                    .await?
            },
            SubscriptionPatch::Status { status } => {
                diesel::update(target)
                    .set((
                        dsl::subscription_status.eq(Some(status.clone())),
                        dsl::subscription_version.eq(expected_version + 1),
                        dsl::updated_at.eq(Utc::now()),
                    ))
                    .execute(&mut conn)
                    .await?
            },
            SubscriptionPatch::StatusAndPeriodEnd { status, period_end } => {
                diesel::update(target)
                    .set((
                        dsl::subscription_status.eq(Some(status.clone())),
                        dsl::subscription_period_end.eq(*period_end),
                        dsl::subscription_version.eq(expected_version + 1),
                        dsl::updated_at.eq(Utc::now()),
                    ))
                    .execute(&mut conn)
                    .await?
            },
        };

        Ok(updated == 1)
    }
}
