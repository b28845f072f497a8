use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::auth::permissions::Role;
use crate::auth::repo_types::{Gender, User};

/// Request body for sign-in. Fields are optional so a missing one is reported
/// as a 400 with the expected message instead of a deserialization rejection.
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// Profile fields collected from the multipart signup form.
#[derive(Debug, Default)]
pub struct SignUpForm {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub other_names: Option<String>,
    pub display_name: Option<String>,
    pub birthdate: Option<Date>,
    pub gender: Option<Gender>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub password: Option<String>,
    pub picture: Option<(bytes::Bytes, String)>,
}

/// Public part of the user returned to clients. Credential fields never
/// appear here.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
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
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            other_names: user.other_names,
            display_name: user.display_name,
            birthdate: user.birthdate,
            gender: user.gender,
            country: user.country,
            email: user.email,
            phone_number: user.phone_number,
            address: user.address,
            profile_picture: user.profile_picture,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Response returned after sign-in, signup and password changes.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub status: &'static str,
    pub token: String,
    pub data: AuthData,
}

#[derive(Debug, Serialize)]
pub struct AuthData {
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn public_user_excludes_credentials() {
        let user = PublicUser {
            id: Uuid::new_v4(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            other_names: None,
            display_name: "ada".into(),
            birthdate: date!(1990 - 01 - 01),
            gender: Gender::F,
            country: "UK".into(),
            email: "ada@example.com".into(),
            phone_number: "+440000000".into(),
            address: "1 Analytical Way".into(),
            profile_picture: "users/x/profile.png".into(),
            role: Role::User,
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("ada@example.com"));
        assert!(json.contains("displayName"));
        assert!(!json.to_lowercase().contains("password"));
    }

    #[test]
    fn auth_response_envelope_shape() {
        let user = PublicUser {
            id: Uuid::new_v4(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            other_names: None,
            display_name: "ada".into(),
            birthdate: date!(1990 - 01 - 01),
            gender: Gender::F,
            country: "UK".into(),
            email: "ada@example.com".into(),
            phone_number: "+440000000".into(),
            address: "1 Analytical Way".into(),
            profile_picture: "users/x/profile.png".into(),
            role: Role::User,
            created_at: OffsetDateTime::now_utc(),
        };
        let response = AuthResponse {
            status: "success",
            token: "a.b.c".into(),
            data: AuthData { user },
        };
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&response).unwrap()).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["token"], "a.b.c");
        assert!(value["data"]["user"]["email"].is_string());
    }
}
