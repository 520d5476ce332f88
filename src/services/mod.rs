// Services module
// Business logic layer: campaign dispatch, subscription reconciliation, and
// the external provider adapters they depend on

pub mod campaign_engine;
pub mod channels;
pub mod dispatch_sweep;
pub mod event_dedup;
pub mod jwt;
pub mod reconciler;
pub mod shortener;
pub mod stripe;
pub mod template;

pub use campaign_engine::{CampaignEngine, CampaignStore, DispatchOutcome, EngineError};
pub use dispatch_sweep::spawn_dispatch_sweep;
pub use event_dedup::{ProcessedEventStore, RedisEventDedup};
pub use reconciler::{ReconcileOutcome, SubscriptionPatch, SubscriptionReconciler, UserStore};
pub use shortener::{HttpUrlShortener, UrlShortener};
pub use stripe::{StripeApiClient, SubscriptionSnapshot, WebhookVerifier};
