// Drip campaign and campaign message models
// A campaign is an ordered sequence of timed, templated messages; the message
// position column is the dispatch order

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::schema::{campaign_messages, drip_campaigns};

/// Outbound channel for a campaign step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageChannel {
    Sms,
    Email,
}

impl MessageChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageChannel::Sms => "sms",
            MessageChannel::Email => "email",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sms" => Some(MessageChannel::Sms),
            "email" => Some(MessageChannel::Email),
            _ => None,
        }
    }
}

/// What causes a contact to be enrolled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CampaignTrigger {
    Signup,
    Purchase,
    Custom,
}

impl CampaignTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignTrigger::Signup => "signup",
            CampaignTrigger::Purchase => "purchase",
            CampaignTrigger::Custom => "custom",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "signup" => Some(CampaignTrigger::Signup),
            "purchase" => Some(CampaignTrigger::Purchase),
            "custom" => Some(CampaignTrigger::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = drip_campaigns)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DripCampaign {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub trigger_type: String,
    pub follow_up_condition: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = campaign_messages)]
#[diesel(belongs_to(DripCampaign, foreign_key = campaign_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CampaignMessage {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub position: i32,
    pub channel: String,
    pub body: String,
    pub subject: Option<String>,
    pub link: Option<String>,
    pub delay_minutes: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = drip_campaigns)]
pub struct NewDripCampaign {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub trigger_type: String,
    pub follow_up_condition: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = campaign_messages)]
pub struct NewCampaignMessage {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub position: i32,
    pub channel: String,
    pub body: String,
    pub subject: Option<String>,
    pub link: Option<String>,
    pub delay_minutes: i32,
}

/// One campaign step in a create/update request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    pub channel: MessageChannel,
    #[validate(length(min = 1))]
    pub body: String,
    pub subject: Option<String>,
    pub link: Option<String>,
    #[serde(default)]
    pub delay_minutes: i32,
}

impl MessageRequest {
    /// Channel-dependent constraints the derive macro cannot express
    pub fn validate_channel_rules(&self) -> Result<(), String> {
        if self.delay_minutes < 0 {
            return Err("delayMinutes must be non-negative".to_string());
        }
        if self.channel == MessageChannel::Email
            && self.subject.as_deref().map_or(true, |s| s.trim().is_empty())
        {
            return Err("subject is required for email messages".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    pub trigger: CampaignTrigger,
    #[serde(default = "default_follow_up_condition")]
    pub follow_up_condition: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub messages: Vec<MessageRequest>,
}

fn default_follow_up_condition() -> String {
    "no_open".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub trigger: Option<CampaignTrigger>,
    pub follow_up_condition: Option<String>,
    pub is_active: Option<bool>,
    /// Replaces the whole message list when present
    pub messages: Option<Vec<MessageRequest>>,
}

/// Campaign plus its ordered message list, as returned by the API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignWithMessages {
    #[serde(flatten)]
    pub campaign: DripCampaign,
    pub messages: Vec<CampaignMessage>,
}

impl DripCampaign {
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        id: Uuid,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::drip_campaigns::dsl;

        dsl::drip_campaigns
            .find(id)
            .first::<Self>(conn)
            .await
            .optional()
    }

    pub async fn list_all(
        conn: &mut AsyncPgConnection,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        use crate::schema::drip_campaigns::dsl;

        dsl::drip_campaigns
            .order(dsl::created_at.desc())
            .load::<Self>(conn)
            .await
    }

    pub async fn insert(
        conn: &mut AsyncPgConnection,
        new_campaign: NewDripCampaign,
    ) -> Result<Self, diesel::result::Error> {
        diesel::insert_into(drip_campaigns::table)
            .values(&new_campaign)
            .get_result::<Self>(conn)
            .await
    }

    pub async fn update(
        &self,
        conn: &mut AsyncPgConnection,
        request: &UpdateCampaignRequest,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::drip_campaigns::dsl;

        diesel::update(dsl::drip_campaigns.find(self.id))
            .set((
                dsl::name.eq(request.name.clone().unwrap_or_else(|| self.name.clone())),
                dsl::description.eq(request
                    .description
                    .clone()
                    .or_else(|| self.description.clone())),
                dsl::trigger_type.eq(request
                    .trigger
                    .map(|t| t.as_str().to_string())
                    .unwrap_or_else(|| self.trigger_type.clone())),
                dsl::follow_up_condition.eq(request
                    .follow_up_condition
                    .clone()
                    .unwrap_or_else(|| self.follow_up_condition.clone())),
                dsl::is_active.eq(request.is_active.unwrap_or(self.is_active)),
                dsl::updated_at.eq(Utc::now()),
            ))
            .get_result::<Self>(conn)
            .await
    }

    pub async fn delete(
        conn: &mut AsyncPgConnection,
        id: Uuid,
    ) -> Result<usize, diesel::result::Error> {
        use crate::schema::drip_campaigns::dsl;

        diesel::delete(dsl::drip_campaigns.find(id))
            .execute(conn)
            .await
    }

    /// Ordered message list for this campaign (position order == dispatch order)
    pub async fn messages(
        &self,
        conn: &mut AsyncPgConnection,
    ) -> Result<Vec<CampaignMessage>, diesel::result::Error> {
        CampaignMessage::for_campaign(conn, self.id).await
    }
}

impl CampaignMessage {
    pub async fn for_campaign(
        conn: &mut AsyncPgConnection,
        campaign: Uuid,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        use crate::schema::campaign_messages::dsl;

        dsl::campaign_messages
            .filter(dsl::campaign_id.eq(campaign))
            .order(dsl::position.asc())
            .load::<Self>(conn)
            .await
    }

    /// Replace a campaign's message list atomically
    pub async fn replace_for_campaign(
        conn: &mut AsyncPgConnection,
        campaign: Uuid,
        messages: Vec<NewCampaignMessage>,
    ) -> Result<(), diesel::result::Error> {
        use crate::schema::campaign_messages::dsl;

        diesel::delete(dsl::campaign_messages.filter(dsl::campaign_id.eq(campaign)))
            .execute(conn)
            .await?;
        diesel::insert_into(campaign_messages::table)
            .values(&messages)
            .execute(conn)
            .await?;
        Ok(())
    }
}
