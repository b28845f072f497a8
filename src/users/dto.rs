use serde::Serialize;

use crate::auth::dto::PublicUser;

/// Envelope for user-profile responses that carry no session token.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub status: &'static str,
    pub data: UserData,
}

#[derive(Debug, Serialize)]
pub struct UserData {
    pub user: PublicUser,
}

impl UserResponse {
    pub fn new(user: PublicUser) -> Self {
        Self {
            status: "success",
            data: UserData { user },
        }
    }
}
