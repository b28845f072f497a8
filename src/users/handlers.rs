use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{dto::PublicUser, middleware::CurrentUser, repo_types::User},
    error::{ApiError, ApiResult},
    state::AppState,
    storage::profile_picture_key,
    users::dto::UserResponse,
};

const PICTURE_URL_TTL_SECS: u64 = 10 * 60;

/// Public profile lookup. The stored object key is swapped for a short-lived
/// presigned URL before leaving the server.
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserResponse>> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found.".into()))?;

    let url = state
        .storage
        .presign_get(&user.profile_picture, PICTURE_URL_TTL_SECS)
        .await?;

    let mut public = PublicUser::from(user);
    public.profile_picture = url;
    Ok(Json(UserResponse::new(public)))
}

#[instrument(skip(state, multipart))]
pub async fn update_profile_picture(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CurrentUser(_actor): CurrentUser,
    mut multipart: Multipart,
) -> ApiResult<Json<UserResponse>> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found.".into()))?;

    let mut picture: Option<(bytes::Bytes, String)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::Validation("Invalid form data.".into()))?
    {
        if field.name() == Some("profilePicture") {
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
            picture = Some((body, content_type));
        }
    }
    let (body, content_type) =
        picture.ok_or_else(|| ApiError::Validation("Profile picture not found.".into()))?;

    let key = profile_picture_key(user.id, &content_type);
    state
        .storage
        .put_object(&key, body, &content_type)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user.id, "profile picture upload failed");
            ApiError::Integration("Could not store the profile picture.".into())
        })?;

    if user.profile_picture != key {
        if let Err(e) = state.storage.delete_object(&user.profile_picture).await {
            warn!(error = %e, key = %user.profile_picture, "stale picture cleanup failed");
        }
    }

    let updated = User::update_profile_picture(&state.db, user.id, &key).await?;
    info!(user_id = %updated.id, "profile picture updated");
    Ok(Json(UserResponse::new(updated.into())))
}

/// Explicit account deletion. Tokens for the removed user die at the gate's
/// user-lookup step from then on.
#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CurrentUser(_actor): CurrentUser,
) -> ApiResult<StatusCode> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found.".into()))?;

    if !User::delete(&state.db, user.id).await? {
        return Err(ApiError::NotFound("User not found.".into()));
    }

    if let Err(e) = state.storage.delete_object(&user.profile_picture).await {
        warn!(error = %e, key = %user.profile_picture, "picture cleanup failed");
    }

    info!(user_id = %user.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
