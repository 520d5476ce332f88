// Drip campaign CRUD handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    models::{
        CampaignMessage, CampaignWithMessages, CreateCampaignRequest, DripCampaign, MessageRequest,
        NewCampaignMessage, NewDripCampaign, UpdateCampaignRequest,
    },
    utils::ServiceError,
};

fn validate_messages(messages: &[MessageRequest]) -> Result<(), ServiceError> {
    if messages.is_empty() {
        return Err(ServiceError::ValidationError(
            "A campaign needs at least one message".to_string(),
        ));
    }
    for (index, message) in messages.iter().enumerate() {
        message.validate()?;
        message.validate_channel_rules().map_err(|e| {
            ServiceError::ValidationError(format!("Message {}: {}", index, e))
        })?;
    }
    Ok(())
}

fn to_new_messages(campaign_id: Uuid, messages: &[MessageRequest]) -> Vec<NewCampaignMessage> {
    messages
        .iter()
        .enumerate()
        .map(|(index, m)| NewCampaignMessage {
            id: Uuid::new_v4(),
            campaign_id,
            position: index as i32,
            channel: m.channel.as_str().to_string(),
            body: m.body.clone(),
            subject: m.subject.clone(),
            link: m.link.clone(),
            delay_minutes: m.delay_minutes,
        })
        .collect()
}

pub async fn list_campaigns(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let campaigns = DripCampaign::list_all(&mut conn).await?;

    let mut result = Vec::with_capacity(campaigns.len());
    for campaign in campaigns {
        let messages = campaign.messages(&mut conn).await?;
        result.push(CampaignWithMessages { campaign, messages });
    }
    Ok(Json(result))
}

pub async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let campaign = DripCampaign::find_by_id(&mut conn, id)
        .await?
        .ok_or(ServiceError::NotFound)?;
    let messages = campaign.messages(&mut conn).await?;
    Ok(Json(CampaignWithMessages { campaign, messages }))
}

pub async fn create_campaign(
    State(state): State<AppState>,
    Json(request): Json<CreateCampaignRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    request.validate()?;
    validate_messages(&request.messages)?;

    let mut conn = state.diesel_pool.get().await?;
    let campaign = DripCampaign::insert(
        &mut conn,
        NewDripCampaign {
            id: Uuid::new_v4(),
            name: request.name.trim().to_string(),
            description: request.description,
            trigger_type: request.trigger.as_str().to_string(),
            follow_up_condition: request.follow_up_condition,
            is_active: request.is_active,
        },
    )
    .await?;

    let new_messages = to_new_messages(campaign.id, &request.messages);
    CampaignMessage::replace_for_campaign(&mut conn, campaign.id, new_messages).await?;
    let messages = campaign.messages(&mut conn).await?;

    Ok((
        StatusCode::CREATED,
        Json(CampaignWithMessages { campaign, messages }),
    ))
}

pub async fn update_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCampaignRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    if let Some(messages) = &request.messages {
        validate_messages(messages)?;
    }

    let mut conn = state.diesel_pool.get().await?;
    let campaign = DripCampaign::find_by_id(&mut conn, id)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let updated = campaign.update(&mut conn, &request).await?;
    if let Some(messages) = &request.messages {
        let new_messages = to_new_messages(updated.id, messages);
        CampaignMessage::replace_for_campaign(&mut conn, updated.id, new_messages).await?;
    }

    let messages = updated.messages(&mut conn).await?;
    Ok(Json(CampaignWithMessages {
        campaign: updated,
        messages,
    }))
}

pub async fn delete_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let deleted = DripCampaign::delete(&mut conn, id).await?;
    if deleted == 0 {
        return Err(ServiceError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}
