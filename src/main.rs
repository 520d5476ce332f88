use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reviewflow_backend::{app_config, build_router, initialize_app_state, services};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reviewflow_backend=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenv::dotenv().ok();
    let config = app_config::config();
    let bind_address = config.bind_address.clone();
    info!("Starting ReviewFlow backend on {}", bind_address);

    let state = match initialize_app_state().await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            return Err(std::io::Error::other(format!(
                "Initialization failed: {}",
                e
            )));
        },
    };

    // The sweep is the only clock for campaign dispatch
    let _sweep = services::spawn_dispatch_sweep(
        Arc::clone(&state.engine),
        config.sweep_interval_seconds,
    );

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Listening on {}", bind_address);

    axum::serve(listener, router).await
}
