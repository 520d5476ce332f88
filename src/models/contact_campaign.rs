// Enrollment model: one contact progressing through one drip campaign
// The sent log (campaign_sends) is append-only and unique per
// (enrollment, message); the version column backs the dispatch claim

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{campaign_sends, contact_campaigns};

/// Enrollment lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Pending,
    Sent,
    Responded,
    Completed,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "pending",
            EnrollmentStatus::Sent => "sent",
            EnrollmentStatus::Responded => "responded",
            EnrollmentStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EnrollmentStatus::Pending),
            "sent" => Some(EnrollmentStatus::Sent),
            "responded" => Some(EnrollmentStatus::Responded),
            "completed" => Some(EnrollmentStatus::Completed),
            _ => None,
        }
    }

    /// Terminal states accept no further dispatches
    pub fn is_terminal(&self) -> bool {
        matches!(self, EnrollmentStatus::Responded | EnrollmentStatus::Completed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = contact_campaigns)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ContactCampaign {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub campaign_id: Uuid,
    pub status: String,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub next_due_at: Option<DateTime<Utc>>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = contact_campaigns)]
pub struct NewContactCampaign {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub campaign_id: Uuid,
    pub status: String,
    pub next_due_at: Option<DateTime<Utc>>,
}

/// One sent-log row
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = campaign_sends)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CampaignSend {
    pub id: Uuid,
    pub enrollment_id: Uuid,
    pub message_id: Uuid,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = campaign_sends)]
pub struct NewCampaignSend {
    pub id: Uuid,
    pub enrollment_id: Uuid,
    pub message_id: Uuid,
    pub sent_at: DateTime<Utc>,
}

impl ContactCampaign {
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        enrollment_id: Uuid,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::contact_campaigns::dsl;

        dsl::contact_campaigns
            .find(enrollment_id)
            .first::<Self>(conn)
            .await
            .optional()
    }

    pub async fn list_all(
        conn: &mut AsyncPgConnection,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        use crate::schema::contact_campaigns::dsl;

        dsl::contact_campaigns
            .order(dsl::created_at.desc())
            .load::<Self>(conn)
            .await
    }

    pub async fn insert(
        conn: &mut AsyncPgConnection,
        new_enrollment: NewContactCampaign,
    ) -> Result<Self, diesel::result::Error> {
        diesel::insert_into(contact_campaigns::table)
            .values(&new_enrollment)
            .get_result::<Self>(conn)
            .await
    }

    /// Enrollments whose next step has come due
    pub async fn list_due(
        conn: &mut AsyncPgConnection,
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, diesel::result::Error> {
        use crate::schema::contact_campaigns::dsl;

        dsl::contact_campaigns
            .filter(dsl::next_due_at.le(now))
            .filter(dsl::status.eq_any(vec!["pending", "sent"]))
            .select(dsl::id)
            .load::<Uuid>(conn)
            .await
    }

    /// Compare-and-set claim on the enrollment version. Returns false when
    /// another dispatcher already bumped the version.
    pub async fn try_claim(
        conn: &mut AsyncPgConnection,
        enrollment_id: Uuid,
        expected_version: i32,
    ) -> Result<bool, diesel::result::Error> {
        use crate::schema::contact_campaigns::dsl;

        let updated = diesel::update(
            dsl::contact_campaigns
                .find(enrollment_id)
                .filter(dsl::version.eq(expected_version)),
        )
        .set((
            dsl::version.eq(expected_version + 1),
            dsl::updated_at.eq(Utc::now()),
        ))
        .execute(conn)
        .await?;

        Ok(updated == 1)
    }

    /// Append a sent-log row. Returns false if the (enrollment, message) pair
    /// was already logged; the unique constraint is the arbiter.
    pub async fn record_send(
        conn: &mut AsyncPgConnection,
        enrollment_id: Uuid,
        message_id: Uuid,
        sent_at: DateTime<Utc>,
    ) -> Result<bool, diesel::result::Error> {
        use crate::schema::campaign_sends::dsl;

        let inserted = diesel::insert_into(dsl::campaign_sends)
            .values(&NewCampaignSend {
                id: Uuid::new_v4(),
                enrollment_id,
                message_id,
                sent_at,
            })
            .on_conflict((dsl::enrollment_id, dsl::message_id))
            .do_nothing()
            .execute(conn)
            .await?;

        Ok(inserted == 1)
    }

    /// Post-dispatch bookkeeping. A cancellation that landed while the send
    /// was in flight wins: the send stays logged but no further step is
    /// scheduled.
    pub async fn finish_dispatch(
        conn: &mut AsyncPgConnection,
        enrollment_id: Uuid,
        sent_at: DateTime<Utc>,
        next_due_at: Option<DateTime<Utc>>,
        new_status: EnrollmentStatus,
    ) -> Result<(), diesel::result::Error> {
        use crate::schema::contact_campaigns::dsl;

        let current = dsl::contact_campaigns
            .find(enrollment_id)
            .select(dsl::status)
            .first::<String>(conn)
            .await?;

        let cancelled = EnrollmentStatus::from_str(&current)
            .map(|s| s.is_terminal())
            .unwrap_or(false);

        let (status, due) = if cancelled {
            (current, None)
        } else {
            (new_status.as_str().to_string(), next_due_at)
        };

        diesel::update(dsl::contact_campaigns.find(enrollment_id))
            .set((
                dsl::status.eq(status),
                dsl::last_sent_at.eq(Some(sent_at)),
                dsl::next_due_at.eq(due),
                dsl::updated_at.eq(Utc::now()),
            ))
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn set_status(
        conn: &mut AsyncPgConnection,
        enrollment_id: Uuid,
        status: EnrollmentStatus,
        clear_due: bool,
    ) -> Result<usize, diesel::result::Error> {
        use crate::schema::contact_campaigns::dsl;

        if clear_due {
            diesel::update(dsl::contact_campaigns.find(enrollment_id))
                .set((
                    dsl::status.eq(status.as_str()),
                    dsl::next_due_at.eq(None::<DateTime<Utc>>),
                    dsl::updated_at.eq(Utc::now()),
                ))
                .execute(conn)
                .await
        } else {
            diesel::update(dsl::contact_campaigns.find(enrollment_id))
                .set((
                    dsl::status.eq(status.as_str()),
                    dsl::updated_at.eq(Utc::now()),
                ))
                .execute(conn)
                .await
        }
    }

    pub async fn delete(
        conn: &mut AsyncPgConnection,
        enrollment_id: Uuid,
    ) -> Result<usize, diesel::result::Error> {
        use crate::schema::contact_campaigns::dsl;

        diesel::delete(dsl::contact_campaigns.find(enrollment_id))
            .execute(conn)
            .await
    }
}

impl CampaignSend {
    /// Sent log for one enrollment, oldest first
    pub async fn for_enrollment(
        conn: &mut AsyncPgConnection,
        enrollment: Uuid,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        use crate::schema::campaign_sends::dsl;

        dsl::campaign_sends
            .filter(dsl::enrollment_id.eq(enrollment))
            .order(dsl::sent_at.asc())
            .load::<Self>(conn)
            .await
    }
}
