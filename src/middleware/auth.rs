// JWT validation middleware
// Extracts the bearer token, validates it, and stashes the authenticated
// identity in request extensions for handlers to pull out.

use axum::{
    body::Body,
    extract::Request,
    http::header,
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::jwt;
use crate::utils::ServiceError;

/// Authenticated user information extracted from the access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
}

pub async fn require_auth(
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ServiceError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ServiceError::Unauthorized)?;

    let claims = jwt::verify_token(token).map_err(|_| ServiceError::Unauthorized)?;

    req.extensions_mut().insert(AuthenticatedUser {
        user_id: claims.sub,
        email: claims.email,
    });

    Ok(next.run(req).await)
}
