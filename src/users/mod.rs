use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, patch},
    Router,
};

use crate::auth::middleware::guard;
use crate::auth::permissions::ANY;
use crate::state::AppState;

mod dto;
pub mod handlers;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // Intentionally public route on a gated router.
        .route(
            "/users/:id",
            get(handlers::get_user)
                .route_layer(from_fn_with_state(state.clone(), guard(&[ANY]))),
        )
        .route(
            "/users/:id/profile-picture",
            patch(handlers::update_profile_picture).route_layer(from_fn_with_state(
                state.clone(),
                guard(&["patch:user-details"]),
            )),
        )
        .route(
            "/users/:id",
            delete(handlers::delete_user)
                .route_layer(from_fn_with_state(state, guard(&["delete:user"]))),
        )
}
