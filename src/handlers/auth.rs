// Authentication handlers: registration, login, profile

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    app_config::config,
    middleware::AuthenticatedUser,
    models::{LoginRequest, NewUser, RegisterRequest, UpdateProfileRequest, User},
    services::jwt,
    utils::{hash_password, normalize_email, verify_password, ServiceError},
};

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

fn issue_token_or_500(user: &User) -> Result<String, ServiceError> {
    jwt::issue_token(user).map_err(|e| {
        tracing::error!("Token issuing failed: {}", e);
        ServiceError::InternalError
    })
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    request.validate()?;
    if !request.agree_to_policy {
        return Err(ServiceError::ValidationError(
            "Policy agreement is required".to_string(),
        ));
    }

    let email = normalize_email(&request.email);
    let mut conn = state.diesel_pool.get().await?;

    if User::find_by_email(&mut conn, &email).await?.is_some() {
        return Err(ServiceError::ValidationError(
            "Email is already registered".to_string(),
        ));
    }

    let password_hash = hash_password(&request.password, config().bcrypt_cost).map_err(|e| {
        tracing::error!("Password hashing failed: {}", e);
        ServiceError::InternalError
    })?;

    let user = User::insert(
        &mut conn,
        NewUser {
            id: Uuid::new_v4(),
            email,
            password_hash: Some(password_hash),
            company_name: request.company_name,
            phone_number: request.phone_number,
            about_company: request.about_company,
            agree_to_policy: request.agree_to_policy,
            is_google_user: false,
        },
    )
    .await?;

    let token = issue_token_or_500(&user)?;

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    request.validate()?;

    let mut conn = state.diesel_pool.get().await?;
    let user = User::find_by_email(&mut conn, &request.email)
        .await?
        .ok_or(ServiceError::Unauthorized)?;

    let hash = user
        .password_hash
        .as_deref()
        .ok_or(ServiceError::Unauthorized)?;
    let valid = verify_password(&request.password, hash).map_err(|e| {
        tracing::error!("Password verification failed: {}", e);
        ServiceError::InternalError
    })?;
    if !valid {
        return Err(ServiceError::Unauthorized);
    }

    let token = issue_token_or_500(&user)?;

    Ok(Json(AuthResponse { token, user }))
}

pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let user = User::find_by_id(&mut conn, auth.user_id)
        .await?
        .ok_or(ServiceError::NotFound)?;
    Ok(Json(user))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let user = User::find_by_id(&mut conn, auth.user_id)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let updated = user.update_profile(&mut conn, &request).await?;
    Ok(Json(updated))
}
