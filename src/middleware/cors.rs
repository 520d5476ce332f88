// CORS layer built from the configured origin whitelist

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::app_config::config;

pub fn cors_layer() -> CorsLayer {
    let cfg = config();

    let allow_origin = if cfg.cors_allowed_origins.iter().any(|o| o == "*") {
        // Wildcard with credentials is refused by browsers; mirror instead
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = cfg
            .cors_allowed_origins
            .iter()
            .filter_map(|origin| {
                HeaderValue::from_str(origin)
                    .map_err(|_| warn!("Ignoring invalid CORS origin: {}", origin))
                    .ok()
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true)
}
