use axum::{
    middleware::from_fn_with_state,
    routing::{patch, post},
    Router,
};

use crate::state::AppState;

pub mod dto;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod permissions;
pub mod repo;
pub mod repo_types;
pub mod reset;

use self::middleware::guard;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/signin", post(handlers::sign_in))
        .route("/users/signup", post(handlers::sign_up_user))
        .route("/users/forgotPassword", post(handlers::forgot_password))
        .route(
            "/users/resetPassword/:token",
            patch(handlers::reset_password),
        )
        .route(
            "/users/updatePassword",
            patch(handlers::update_password).route_layer(from_fn_with_state(
                state.clone(),
                guard(&["patch:user-details"]),
            )),
        )
        .route(
            "/admin/signup",
            post(handlers::sign_up_admin)
                .route_layer(from_fn_with_state(state, guard(&["create:admin"]))),
        )
}
