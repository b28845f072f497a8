use anyhow::Context;
use axum::{
    extract::{FromRef, Multipart, Path, State},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            AuthData, AuthResponse, ForgotPasswordRequest, MessageResponse, ResetPasswordRequest,
            SignInRequest, SignUpForm, UpdatePasswordRequest,
        },
        jwt::JwtKeys,
        middleware::CurrentUser,
        password::{hash_password, verify_password, MIN_PASSWORD_LEN},
        permissions::Role,
        repo::NewUser,
        repo_types::{Gender, User},
        reset::{generate_reset_token, hash_reset_token, RESET_TOKEN_TTL_MINUTES},
    },
    error::{ApiError, ApiResult},
    state::AppState,
    storage::profile_picture_key,
};

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Sign a session token for the user and build the success envelope with the
/// `jwt` cookie attached.
fn token_response(
    state: &AppState,
    user: User,
    status: StatusCode,
) -> ApiResult<(StatusCode, HeaderMap, Json<AuthResponse>)> {
    let keys = JwtKeys::from_ref(state);
    let token = keys.sign(user.id, user.role)?;

    let max_age = state.config.jwt.cookie_ttl_hours * 60 * 60;
    let mut cookie = format!("jwt={}; Max-Age={}; Path=/; HttpOnly", token, max_age);
    if state.config.production {
        cookie.push_str("; Secure");
    }
    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        HeaderValue::from_str(&cookie).context("cookie header")?,
    );

    Ok((
        status,
        headers,
        Json(AuthResponse {
            status: "success",
            token,
            data: AuthData { user: user.into() },
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(payload): Json<SignInRequest>,
) -> ApiResult<(StatusCode, HeaderMap, Json<AuthResponse>)> {
    let (email, password) = match (payload.email, payload.password) {
        (Some(e), Some(p)) if !e.is_empty() && !p.is_empty() => (e, p),
        _ => {
            return Err(ApiError::Validation(
                "Please provide email and password!".into(),
            ))
        }
    };

    // One disclosure policy for both unknown email and wrong password.
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| {
            warn!(email = %email, "sign-in unknown email");
            ApiError::Authentication("Incorrect email or password".into())
        })?;

    if !verify_password(&password, &user.password_hash)? {
        warn!(user_id = %user.id, "sign-in invalid password");
        return Err(ApiError::Authentication("Incorrect email or password".into()));
    }

    info!(user_id = %user.id, "user signed in");
    token_response(&state, user, StatusCode::CREATED)
}

#[instrument(skip(state, multipart))]
pub async fn sign_up_user(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, HeaderMap, Json<AuthResponse>)> {
    sign_up(state, multipart, Role::User).await
}

#[instrument(skip(state, multipart))]
pub async fn sign_up_admin(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, HeaderMap, Json<AuthResponse>)> {
    sign_up(state, multipart, Role::Admin).await
}

/// Registration, parameterized by the role the endpoint grants. The role is
/// never read from the submitted form.
async fn sign_up(
    state: AppState,
    multipart: Multipart,
    role: Role,
) -> ApiResult<(StatusCode, HeaderMap, Json<AuthResponse>)> {
    info!(role = %role, "creating a new user");
    let form = collect_signup_form(multipart).await?;

    let (picture_body, picture_content_type) = form
        .picture
        .ok_or_else(|| ApiError::Validation("Profile picture not found.".into()))?;

    let email = form
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::Validation("Missing required profile fields.".into()))?;
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }

    let password = form
        .password
        .ok_or_else(|| ApiError::Validation("Missing required profile fields.".into()))?;
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation("Password too short".into()));
    }

    let (first_name, last_name, display_name, birthdate, gender, country, phone_number, address) =
        match (
            form.first_name,
            form.last_name,
            form.display_name,
            form.birthdate,
            form.gender,
            form.country,
            form.phone_number,
            form.address,
        ) {
            (Some(f), Some(l), Some(d), Some(b), Some(g), Some(c), Some(p), Some(a)) => {
                (f, l, d, b, g, c, p, a)
            }
            _ => return Err(ApiError::Validation("Missing required profile fields.".into())),
        };

    // Any existing account with this email rejects the registration.
    if User::email_exists(&state.db, &email).await? {
        warn!(email = %email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password(&password)?;

    let id = Uuid::new_v4();
    let key = profile_picture_key(id, &picture_content_type);
    state
        .storage
        .put_object(&key, picture_body, &picture_content_type)
        .await
        .map_err(|e| {
            error!(error = %e, "profile picture upload failed");
            ApiError::Integration("Could not store the profile picture.".into())
        })?;

    let new_user = NewUser {
        id,
        first_name,
        last_name,
        other_names: form.other_names,
        display_name,
        birthdate,
        gender,
        country,
        phone_number,
        address,
        email,
        profile_picture: key.clone(),
        role,
        password_hash,
    };

    let user = match User::create(&state.db, new_user).await {
        Ok(u) => u,
        Err(e) => {
            // The record never existed; drop the orphaned object.
            if let Err(del) = state.storage.delete_object(&key).await {
                warn!(error = %del, key = %key, "orphan cleanup failed");
            }
            error!(error = %e, "create user failed");
            return Err(e.into());
        }
    };

    info!(user_id = %user.id, role = %user.role, "user registered");
    token_response(&state, user, StatusCode::CREATED)
}

async fn collect_signup_form(mut multipart: Multipart) -> ApiResult<SignUpForm> {
    let mut form = SignUpForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::Validation("Invalid form data.".into()))?
    {
        let Some(name) = field.name().map(|s| s.to_string()) else {
            continue;
        };
        if name == "profilePicture" {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            if !content_type.starts_with("image/") {
                return Err(ApiError::Validation(
                    "Profile picture must be an image.".into(),
                ));
            }
            let body = field
                .bytes()
                .await
                .map_err(|_| ApiError::Validation("Invalid form data.".into()))?;
            form.picture = Some((body, content_type));
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|_| ApiError::Validation("Invalid form data.".into()))?;
        match name.as_str() {
            "firstName" => form.first_name = Some(value),
            "lastName" => form.last_name = Some(value),
            "otherNames" => form.other_names = Some(value),
            "displayName" => form.display_name = Some(value),
            "birthdate" => {
                let format = time::macros::format_description!("[year]-[month]-[day]");
                let date = time::Date::parse(&value, &format).map_err(|_| {
                    ApiError::Validation("Birthdate must be formatted YYYY-MM-DD.".into())
                })?;
                form.birthdate = Some(date);
            }
            "gender" => {
                form.gender = Some(match value.as_str() {
                    "M" => Gender::M,
                    "F" => Gender::F,
                    _ => return Err(ApiError::Validation("Gender must be M or F".into())),
                });
            }
            "country" => form.country = Some(value),
            "email" => form.email = Some(value.trim().to_lowercase()),
            "phoneNumber" => form.phone_number = Some(value),
            "address" => form.address = Some(value),
            "password" => form.password = Some(value),
            _ => {}
        }
    }

    Ok(form)
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let email = payload
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::Validation("Please provide user email".into()))?;

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found!".into()))?;

    let reset_token = generate_reset_token();
    let digest = hash_reset_token(&reset_token);
    let expires = OffsetDateTime::now_utc() + TimeDuration::minutes(RESET_TOKEN_TTL_MINUTES);
    User::set_reset_token(&state.db, user.id, &digest, expires).await?;

    let reset_url = format!(
        "{}/api/v1/users/resetPassword/{}",
        state.config.public_base_url, reset_token
    );
    let message = format!(
        "Forgot your password? Submit a PATCH request with your new password to: {}.\n\
         If you didn't forget your password, please ignore this email!",
        reset_url
    );

    if let Err(e) = state
        .mailer
        .send(
            &user.email,
            "Your password reset token (valid for 10 min)",
            &message,
        )
        .await
    {
        error!(error = %e, user_id = %user.id, "reset email send failed");
        // The stored digest must not outlive a failed send.
        if let Err(undo) = User::clear_reset_token(&state.db, user.id).await {
            error!(error = %undo, user_id = %user.id, "reset token rollback failed");
        }
        return Err(ApiError::Integration(
            "There was an error sending the email. Try again later!".into(),
        ));
    }

    info!(user_id = %user.id, "reset token sent");
    Ok(Json(MessageResponse {
        status: "success",
        message: "Token sent to email!",
    }))
}

#[instrument(skip(state, token, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<(StatusCode, HeaderMap, Json<AuthResponse>)> {
    let password = payload
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::Validation("New password is required".into()))?;
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation("Password too short".into()));
    }

    let digest = hash_reset_token(&token);
    let user = User::find_by_reset_token(&state.db, &digest, OffsetDateTime::now_utc())
        .await?
        .ok_or_else(|| ApiError::Validation("Token is invalid or has expired".into()))?;

    if verify_password(&password, &user.password_hash)? {
        return Err(ApiError::Authentication(
            "New password cannot be same as previous password".into(),
        ));
    }

    let hash = hash_password(&password)?;
    let user = User::update_password(&state.db, user.id, &hash).await?;

    info!(user_id = %user.id, "password reset");
    token_response(&state, user, StatusCode::OK)
}

#[instrument(skip(state, current, payload))]
pub async fn update_password(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    Json(payload): Json<UpdatePasswordRequest>,
) -> ApiResult<(StatusCode, HeaderMap, Json<AuthResponse>)> {
    let (current_password, new_password) = match (payload.current_password, payload.new_password) {
        (Some(c), Some(n)) if !c.is_empty() && !n.is_empty() => (c, n),
        _ => {
            return Err(ApiError::Validation(
                "Please provide current and new password!".into(),
            ))
        }
    };

    if !verify_password(&current_password, &current.password_hash)? {
        return Err(ApiError::Authentication(
            "Your current password is wrong".into(),
        ));
    }
    if new_password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation("Password too short".into()));
    }

    let hash = hash_password(&new_password)?;
    let user = User::update_password(&state.db, current.id, &hash).await?;

    info!(user_id = %user.id, "password updated");
    token_response(&state, user, StatusCode::CREATED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_regex_accepts_plain_addresses() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
    }

    #[test]
    fn email_regex_rejects_junk() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@x.com"));
    }

    #[tokio::test]
    async fn token_response_sets_cookie_and_envelope() {
        use crate::auth::repo_types::{Gender, User};
        use time::macros::date;

        let state = AppState::fake();
        let user = User {
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
            password_hash: "$argon2id$fake".into(),
            password_reset_token: None,
            password_reset_expires: None,
            password_changed_at: OffsetDateTime::now_utc(),
            created_at: OffsetDateTime::now_utc(),
        };
        let user_id = user.id;

        let (status, headers, Json(body)) =
            token_response(&state, user, StatusCode::CREATED).unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let cookie = headers.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("jwt="));
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Secure"));

        assert_eq!(body.status, "success");
        assert_eq!(body.data.user.id, user_id);

        let keys = JwtKeys::from_ref(&state);
        let claims = keys.verify(&body.token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::User);
    }
}
