// Payment handlers: checkout session creation and the Stripe webhook
//
// The webhook reads the raw body before any JSON handling; the signature is
// computed over the exact bytes Stripe sent. Verification failure is the only
// non-2xx path so the provider retries it and nothing else.

use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
    app::AppState,
    app_config::config,
    middleware::AuthenticatedUser,
    models::User,
    utils::ServiceError,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionRequest {
    pub price_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionResponse {
    pub session_id: String,
    pub checkout_url: Option<String>,
}

pub async fn create_checkout_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(request): Json<CheckoutSessionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let user = User::find_by_id(&mut conn, auth.user_id)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let cfg = config();
    let success_url = format!("{}/billing?checkout=success", cfg.frontend_url);
    let cancel_url = format!("{}/billing?checkout=cancelled", cfg.frontend_url);

    let session = state
        .stripe_client
        .create_checkout_session(
            &user.email,
            &request.price_id,
            &user.id.to_string(),
            &success_url,
            &cancel_url,
        )
        .await
        .map_err(|e| {
            error!("Checkout session creation failed: {}", e);
            ServiceError::ChannelError(e.to_string())
        })?;

    Ok(Json(CheckoutSessionResponse {
        session_id: session.id,
        checkout_url: session.url,
    }))
}

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServiceError::SignatureError("Missing signature header".to_string()))?;

    let event = state
        .webhook_verifier
        .verify_and_parse(&body, signature, Utc::now())
        .map_err(|e| ServiceError::SignatureError(e.to_string()))?;

    // Past this point every failure is absorbed: the event is authentic and
    // a provider retry would hit the same error, so log and acknowledge.
    match state.reconciler.handle_event(&event).await {
        Ok(outcome) => {
            info!(event_id = %event.id, "Webhook processed: {:?}", outcome);
        },
        Err(e) => {
            error!(event_id = %event.id, "Webhook processing failed, absorbing: {}", e);
        },
    }

    Ok(StatusCode::OK)
}
