//! Authentication backend for the crime record-management API.
//!
//! Registration, credential login, access/refresh token issuance and
//! rotation, and profile lookup over a pluggable user store.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::AppError;
pub use handlers::http::AppState;
pub use services::auth::AuthService;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use handlers::http;

/// Build the API router (banner, health, auth). Used by main and by integration tests.
pub fn create_app(state: AppState) -> axum::Router {
    let auth_routes = axum::Router::new()
        .route("/register", post(auth::register))
        .route(
            "/login",
            post(auth::login).layer(from_fn_with_state(
                state.clone(),
                middleware::rate_limit::limit_login,
            )),
        )
        .route("/me", get(auth::me))
        .route("/refresh-token", post(auth::refresh_token))
        .route("/refresh-session", post(auth::refresh_session));

    axum::Router::new()
        .route("/", get(http::root))
        .route("/health", get(http::health))
        .nest("/auth", auth_routes)
        .with_state(state)
}
