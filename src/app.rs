// Application state and wiring
use std::sync::Arc;
use std::time::Duration;

use crate::{
    app_config::config,
    db::{DieselPool, PgCampaignStore, PgUserStore, RedisPool},
    services::{
        channels::{ResendEmailChannel, TwilioSmsChannel},
        CampaignEngine, HttpUrlShortener, RedisEventDedup, StripeApiClient,
        SubscriptionReconciler, WebhookVerifier,
    },
};

// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub diesel_pool: DieselPool,
    pub redis_pool: RedisPool,
    pub engine: Arc<CampaignEngine>,
    pub reconciler: Arc<SubscriptionReconciler>,
    pub webhook_verifier: Arc<WebhookVerifier>,
    pub stripe_client: Arc<StripeApiClient>,
}

impl AppState {
    /// Wire the engine and reconciler against their production collaborators
    pub fn build(diesel_pool: DieselPool, redis_pool: RedisPool) -> Self {
        let cfg = config();

        let campaign_store = Arc::new(PgCampaignStore::new(diesel_pool.clone()));
        let user_store = Arc::new(PgUserStore::new(diesel_pool.clone()));

        let sms = Arc::new(TwilioSmsChannel::new(
            cfg.twilio.account_sid.clone(),
            cfg.twilio.auth_token.clone(),
            cfg.twilio.from_number.clone(),
            cfg.twilio.api_url.clone(),
            Duration::from_secs(cfg.twilio.timeout_seconds),
        ));
        let email = Arc::new(ResendEmailChannel::new(
            cfg.email.resend_api_key.clone(),
            cfg.email.resend_api_url.clone(),
            cfg.email.from_email.clone(),
            cfg.email.from_name.clone(),
            Duration::from_secs(cfg.email.timeout_seconds),
        ));
        let shortener = Arc::new(HttpUrlShortener::new(
            cfg.shortener_api_url.clone(),
            Duration::from_secs(cfg.shortener_timeout_seconds),
        ));

        let engine = Arc::new(CampaignEngine::new(
            campaign_store,
            sms,
            email,
            shortener,
        ));

        let stripe_client = Arc::new(StripeApiClient::new(
            cfg.stripe.secret_key.clone(),
            cfg.stripe.api_url.clone(),
            Duration::from_secs(cfg.stripe.timeout_seconds),
        ));
        let reconciler = Arc::new(SubscriptionReconciler::new(
            user_store,
            stripe_client.clone(),
            Arc::new(RedisEventDedup::new(redis_pool.clone())),
        ));

        Self {
            diesel_pool,
            redis_pool,
            engine,
            reconciler,
            webhook_verifier: Arc::new(WebhookVerifier::new(cfg.stripe.webhook_secret.clone())),
            stripe_client,
        }
    }
}
