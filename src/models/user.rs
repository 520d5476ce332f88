// User database model
// Carries the embedded Stripe subscription record that webhook events reconcile

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::schema::users;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub company_name: Option<String>,
    pub phone_number: Option<String>,
    pub about_company: Option<String>,
    pub agree_to_policy: bool,
    pub is_google_user: bool,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub subscription_status: Option<String>,
    pub subscription_plan: Option<String>,
    pub subscription_plan_name: Option<String>,
    pub subscription_period_end: Option<DateTime<Utc>>,
    pub subscription_version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: Option<String>,
    pub company_name: Option<String>,
    pub phone_number: Option<String>,
    pub about_company: Option<String>,
    pub agree_to_policy: bool,
    pub is_google_user: bool,
}

/// Registration request body
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    pub company_name: Option<String>,
    pub phone_number: Option<String>,
    pub about_company: Option<String>,
    #[serde(default)]
    pub agree_to_policy: bool,
}

/// Login request body
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

/// Profile update request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub company_name: Option<String>,
    pub phone_number: Option<String>,
    pub about_company: Option<String>,
}

impl User {
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::users::dsl;

        dsl::users
            .find(user_id)
            .first::<Self>(conn)
            .await
            .optional()
    }

    pub async fn find_by_email(
        conn: &mut AsyncPgConnection,
        user_email: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::users::dsl;

        dsl::users
            .filter(dsl::email.eq(user_email.to_lowercase()))
            .first::<Self>(conn)
            .await
            .optional()
    }

    pub async fn find_by_stripe_subscription_id(
        conn: &mut AsyncPgConnection,
        subscription_id: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::users::dsl;

        dsl::users
            .filter(dsl::stripe_subscription_id.eq(subscription_id))
            .first::<Self>(conn)
            .await
            .optional()
    }

    pub async fn find_by_stripe_customer_id(
        conn: &mut AsyncPgConnection,
        customer_id: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::users::dsl;

        dsl::users
            .filter(dsl::stripe_customer_id.eq(customer_id))
            .first::<Self>(conn)
            .await
            .optional()
    }

    pub async fn insert(
        conn: &mut AsyncPgConnection,
        new_user: NewUser,
    ) -> Result<Self, diesel::result::Error> {
        diesel::insert_into(users::table)
            .values(&new_user)
            .get_result::<Self>(conn)
            .await
    }

    pub async fn update_profile(
        &self,
        conn: &mut AsyncPgConnection,
        request: &UpdateProfileRequest,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::users::dsl;

        diesel::update(dsl::users.find(self.id))
            .set((
                dsl::company_name.eq(request
                    .company_name
                    .clone()
                    .or_else(|| self.company_name.clone())),
                dsl::phone_number.eq(request
                    .phone_number
                    .clone()
                    .or_else(|| self.phone_number.clone())),
                dsl::about_company.eq(request
                    .about_company
                    .clone()
                    .or_else(|| self.about_company.clone())),
                dsl::updated_at.eq(Utc::now()),
            ))
            .get_result::<Self>(conn)
            .await
    }
}
