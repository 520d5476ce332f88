// Contact database model
// A lead/customer record; created manually or through the external import hook

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::schema::contacts;

/// How a contact entered the system
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContactOrigin {
    Manual,
    Imported,
}

impl ContactOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactOrigin::Manual => "manual",
            ContactOrigin::Imported => "imported",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = contacts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Contact {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub origin: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = contacts)]
pub struct NewContact {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub origin: String,
}

/// Postal address fragment shared by create/update requests
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRequest {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateContactRequest {
    #[validate(length(min = 1, max = 255))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub address: AddressRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContactRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<AddressRequest>,
}

impl Contact {
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        contact_id: Uuid,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::contacts::dsl;

        dsl::contacts
            .find(contact_id)
            .first::<Self>(conn)
            .await
            .optional()
    }

    pub async fn find_by_email(
        conn: &mut AsyncPgConnection,
        contact_email: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::contacts::dsl;

        dsl::contacts
            .filter(dsl::email.eq(contact_email.to_lowercase()))
            .first::<Self>(conn)
            .await
            .optional()
    }

    pub async fn list_all(
        conn: &mut AsyncPgConnection,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        use crate::schema::contacts::dsl;

        dsl::contacts
            .order(dsl::created_at.desc())
            .load::<Self>(conn)
            .await
    }

    pub async fn insert(
        conn: &mut AsyncPgConnection,
        new_contact: NewContact,
    ) -> Result<Self, diesel::result::Error> {
        diesel::insert_into(contacts::table)
            .values(&new_contact)
            .get_result::<Self>(conn)
            .await
    }

    pub async fn update(
        &self,
        conn: &mut AsyncPgConnection,
        request: &UpdateContactRequest,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::contacts::dsl;

        let address = request.address.clone().unwrap_or(AddressRequest {
            street: self.street.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            zip_code: self.zip_code.clone(),
            country: self.country.clone(),
        });

        diesel::update(dsl::contacts.find(self.id))
            .set((
                dsl::full_name.eq(request
                    .full_name
                    .clone()
                    .unwrap_or_else(|| self.full_name.clone())),
                dsl::email.eq(request
                    .email
                    .as_deref()
                    .map(str::to_lowercase)
                    .unwrap_or_else(|| self.email.clone())),
                dsl::phone.eq(request.phone.clone().or_else(|| self.phone.clone())),
                dsl::street.eq(address.street),
                dsl::city.eq(address.city),
                dsl::state.eq(address.state),
                dsl::zip_code.eq(address.zip_code),
                dsl::country.eq(address.country),
                dsl::updated_at.eq(Utc::now()),
            ))
            .get_result::<Self>(conn)
            .await
    }

    /// Hard delete; enrollments referencing this contact are left in place
    pub async fn delete(
        conn: &mut AsyncPgConnection,
        contact_id: Uuid,
    ) -> Result<usize, diesel::result::Error> {
        use crate::schema::contacts::dsl;

        diesel::delete(dsl::contacts.find(contact_id))
            .execute(conn)
            .await
    }
}
