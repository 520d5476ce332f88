// Contact CRUD handlers plus the external import hook

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    models::{Contact, ContactOrigin, CreateContactRequest, NewContact, UpdateContactRequest},
    utils::{normalize_email, trim_and_validate_field, ServiceError},
};

pub async fn list_contacts(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let contacts = Contact::list_all(&mut conn).await?;
    Ok(Json(contacts))
}

pub async fn get_contact(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let contact = Contact::find_by_id(&mut conn, id)
        .await?
        .ok_or(ServiceError::NotFound)?;
    Ok(Json(contact))
}

pub async fn create_contact(
    State(state): State<AppState>,
    Json(request): Json<CreateContactRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    request.validate()?;
    let contact = insert_contact(&state, request, ContactOrigin::Manual).await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

pub async fn update_contact(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateContactRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let contact = Contact::find_by_id(&mut conn, id)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let updated = contact.update(&mut conn, &request).await?;
    Ok(Json(updated))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let deleted = Contact::delete(&mut conn, id).await?;
    if deleted == 0 {
        return Err(ServiceError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Import payload pushed by external systems. Unlike manual creation, an
/// already-known email is treated as a no-op success so upstream retries stay
/// cheap.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ImportContactRequest {
    #[validate(length(min = 1, max = 255))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportContactResponse {
    pub contact: Contact,
    pub already_existed: bool,
}

pub async fn import_hook(
    State(state): State<AppState>,
    Json(request): Json<ImportContactRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    request.validate()?;

    let email = normalize_email(&request.email);
    let mut conn = state.diesel_pool.get().await?;

    if let Some(existing) = Contact::find_by_email(&mut conn, &email).await? {
        return Ok(Json(ImportContactResponse {
            contact: existing,
            already_existed: true,
        }));
    }

    let full_name =
        trim_and_validate_field(&request.full_name, true).map_err(ServiceError::ValidationError)?;
    let contact = Contact::insert(
        &mut conn,
        NewContact {
            id: Uuid::new_v4(),
            full_name,
            email,
            phone: request.phone,
            street: None,
            city: None,
            state: None,
            zip_code: None,
            country: None,
            origin: ContactOrigin::Imported.as_str().to_string(),
        },
    )
    .await?;

    Ok(Json(ImportContactResponse {
        contact,
        already_existed: false,
    }))
}

async fn insert_contact(
    state: &AppState,
    request: CreateContactRequest,
    origin: ContactOrigin,
) -> Result<Contact, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let contact = Contact::insert(
        &mut conn,
        NewContact {
            id: Uuid::new_v4(),
            full_name: request.full_name.trim().to_string(),
            email: normalize_email(&request.email),
            phone: request.phone,
            street: request.address.street,
            city: request.address.city,
            state: request.address.state,
            zip_code: request.address.zip_code,
            country: request.address.country,
            origin: origin.as_str().to_string(),
        },
    )
    .await?;
    Ok(contact)
}
