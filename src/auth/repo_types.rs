use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::auth::permissions::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "gender", rename_all = "UPPERCASE")]
pub enum Gender {
    M,
    F,
}

/// User record in the database. Credential fields are never serialized;
/// responses additionally go through the `PublicUser` DTO.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub other_names: Option<String>,
    pub display_name: String,
    pub birthdate: Date,
    pub gender: Gender,
    pub country: String,
    pub email: String,
    pub phone_number: String,
    pub address: String,
    pub profile_picture: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub password_changed_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

impl User {
    /// A token issued before the last password change is a stale credential.
    pub fn changed_password_after(&self, token_iat: usize) -> bool {
        (self.password_changed_at.unix_timestamp() as usize) > token_iat
    }
}
