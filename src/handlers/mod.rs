// HTTP handlers and route builders

pub mod auth;
pub mod campaigns;
pub mod contacts;
pub mod enrollments;
pub mod payments;

use crate::app::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};

// Contact routes; the import hook is mounted separately without auth
pub fn contact_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(contacts::list_contacts))
        .route("/", post(contacts::create_contact))
        .route("/{id}", get(contacts::get_contact))
        .route("/{id}", put(contacts::update_contact))
        .route("/{id}", axum::routing::delete(contacts::delete_contact))
}

pub fn campaign_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(campaigns::list_campaigns))
        .route("/", post(campaigns::create_campaign))
        .route("/{id}", get(campaigns::get_campaign))
        .route("/{id}", put(campaigns::update_campaign))
        .route("/{id}", axum::routing::delete(campaigns::delete_campaign))
}

pub fn enrollment_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(enrollments::list_enrollments))
        .route("/", post(enrollments::create_enrollment))
        .route("/bulk", post(enrollments::create_enrollments_bulk))
        .route("/{id}", get(enrollments::get_enrollment))
        .route("/{id}", axum::routing::delete(enrollments::delete_enrollment))
        .route("/{id}/dispatch", post(enrollments::dispatch_enrollment))
        .route("/{id}/cancel", post(enrollments::cancel_enrollment))
}

pub fn payment_routes() -> Router<AppState> {
    Router::new().route("/checkout-session", post(payments::create_checkout_session))
}
