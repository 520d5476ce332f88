// Library exports for the ReviewFlow backend

pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use diesel_migrations::MigrationHarness;
use tracing::info;

// Re-export commonly used types
pub use app::AppState;
pub use app_config::{AppConfig, CONFIG};
pub use db::{DieselPool, RedisPool, StoreError, StoreResult};
pub use middleware::AuthenticatedUser;
pub use services::{CampaignEngine, SubscriptionReconciler};

/// Initialize pools, run migrations, and wire the application state
pub async fn initialize_app_state() -> Result<AppState, Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let config = app_config::config();

    info!("Initializing database pool...");
    let db_config = db::DieselDatabaseConfig::default();
    let diesel_pool = db::create_diesel_pool(db_config).await?;

    if !config.disable_embedded_migrations {
        info!("Running embedded migrations...");
        run_migrations(&config.database_url).await?;
    }

    info!("Initializing Redis connection...");
    let redis_pool = RedisPool::new().await?;

    Ok(AppState::build(diesel_pool, redis_pool))
}

/// Run the embedded migrations on a dedicated connection. The async pool
/// cannot drive diesel_migrations directly, so the connection is wrapped back
/// into a blocking harness.
async fn run_migrations(database_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let conn = AsyncPgConnection::establish(database_url).await?;
    let mut wrapper: AsyncConnectionWrapper<AsyncPgConnection> = conn.into();

    tokio::task::spawn_blocking(move || {
        wrapper
            .run_pending_migrations(db::MIGRATIONS)
            .map(|_| ())
            .map_err(|e| format!("Migration failed: {}", e))
    })
    .await??;
    Ok(())
}

/// Full API router. Webhook and import hook stay outside the auth layer;
/// the webhook authenticates by signature instead.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .nest("/contacts", handlers::contact_routes())
        .nest("/campaigns", handlers::campaign_routes())
        .nest("/enrollments", handlers::enrollment_routes())
        .nest("/payments", handlers::payment_routes())
        .route(
            "/auth/me",
            get(handlers::auth::get_current_user).put(handlers::auth::update_profile),
        )
        .layer(from_fn(middleware::require_auth));

    let public = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/contacts/import-hook", post(handlers::contacts::import_hook))
        .route("/payments/webhook", post(handlers::payments::stripe_webhook))
        .route("/health", get(health_check));

    Router::new()
        .nest("/api/v1", public.merge(protected))
        .layer(middleware::cors_layer())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

// Health check handler
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl axum::response::IntoResponse {
    use axum::http::StatusCode;
    use axum::Json;

    let mut overall_healthy = true;
    let timestamp = chrono::Utc::now().to_rfc3339();

    let postgres_health = match db::check_diesel_health(&state.diesel_pool).await {
        Ok(_) => serde_json::json!({
            "status": "healthy",
            "error": null
        }),
        Err(e) => {
            overall_healthy = false;
            serde_json::json!({
                "status": "unhealthy",
                "error": format!("Database connection failed: {}", e)
            })
        },
    };

    let redis_health = state.redis_pool.health_check().await;
    if !redis_health.is_healthy {
        overall_healthy = false;
    }

    let response = serde_json::json!({
        "status": if overall_healthy { "healthy" } else { "degraded" },
        "service": "reviewflow-backend",
        "timestamp": timestamp,
        "components": {
            "postgresql": postgres_health,
            "redis": {
                "status": if redis_health.is_healthy { "healthy" } else { "unhealthy" },
                "latency_ms": redis_health.latency_ms,
                "error": redis_health.error
            }
        }
    });

    if overall_healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
