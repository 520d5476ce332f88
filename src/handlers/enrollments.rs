// Enrollment handlers: create, bulk create, manual dispatch, cancel

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    app::AppState,
    models::{CampaignSend, ContactCampaign},
    services::campaign_engine::DispatchOutcome,
    utils::ServiceError,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnrollmentRequest {
    pub contact_id: Uuid,
    pub campaign_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkEnrollmentRequest {
    pub contact_ids: Vec<Uuid>,
    pub campaign_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkEnrollmentResponse {
    pub enrolled: Vec<ContactCampaign>,
    pub failed: Vec<BulkEnrollmentFailure>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkEnrollmentFailure {
    pub contact_id: Uuid,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResponse {
    pub outcome: String,
    pub message_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentWithSends {
    #[serde(flatten)]
    pub enrollment: ContactCampaign,
    pub sends: Vec<CampaignSend>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelEnrollmentRequest {
    /// Marks the contact as having responded instead of a plain stop
    #[serde(default)]
    pub responded: bool,
}

pub async fn create_enrollment(
    State(state): State<AppState>,
    Json(request): Json<CreateEnrollmentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let enrollment = state
        .engine
        .enroll(request.contact_id, request.campaign_id, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

pub async fn create_enrollments_bulk(
    State(state): State<AppState>,
    Json(request): Json<BulkEnrollmentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    if request.contact_ids.is_empty() {
        return Err(ServiceError::ValidationError(
            "contactIds must not be empty".to_string(),
        ));
    }

    let report = state
        .engine
        .enroll_many(&request.contact_ids, request.campaign_id, Utc::now())
        .await?;

    Ok(Json(BulkEnrollmentResponse {
        enrolled: report.enrolled,
        failed: report
            .failed
            .into_iter()
            .map(|(contact_id, error)| BulkEnrollmentFailure { contact_id, error })
            .collect(),
    }))
}

pub async fn list_enrollments(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let enrollments = ContactCampaign::list_all(&mut conn).await?;
    Ok(Json(enrollments))
}

pub async fn get_enrollment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let enrollment = ContactCampaign::find_by_id(&mut conn, id)
        .await?
        .ok_or(ServiceError::NotFound)?;
    let sends = CampaignSend::for_enrollment(&mut conn, id).await?;
    Ok(Json(EnrollmentWithSends { enrollment, sends }))
}

/// Manual dispatch trigger, mostly for operators. Follows the same due/claim
/// rules as the sweep.
pub async fn dispatch_enrollment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state.engine.dispatch_next_due(id, Utc::now()).await?;

    let response = match outcome {
        DispatchOutcome::Sent { message_id } => DispatchResponse {
            outcome: "sent".to_string(),
            message_id: Some(message_id),
        },
        DispatchOutcome::Skipped { reason } => DispatchResponse {
            outcome: format!("skipped: {}", reason),
            message_id: None,
        },
        DispatchOutcome::Completed => DispatchResponse {
            outcome: "completed".to_string(),
            message_id: None,
        },
    };
    Ok(Json(response))
}

pub async fn cancel_enrollment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<CancelEnrollmentRequest>>,
) -> Result<impl IntoResponse, ServiceError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    state.engine.cancel(id, request.responded).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_enrollment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let deleted = ContactCampaign::delete(&mut conn, id).await?;
    if deleted == 0 {
        return Err(ServiceError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}
