//! HTTP handlers: banner and health; shared state for every route.

use axum::{http::StatusCode, Json};
use serde_json::json;

use crate::auth::TokenCodec;
use crate::middleware::LoginLimiter;
use crate::services::AuthService;

/// Shared application state for all routes.
#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub login_limiter: LoginLimiter,
}

impl AppState {
    pub fn new(auth_service: AuthService) -> Self {
        Self {
            auth_service,
            login_limiter: LoginLimiter::default(),
        }
    }

    pub fn with_login_limiter(mut self, login_limiter: LoginLimiter) -> Self {
        self.login_limiter = login_limiter;
        self
    }

    pub fn auth_service(&self) -> &AuthService {
        &self.auth_service
    }
    pub fn tokens(&self) -> &TokenCodec {
        self.auth_service.tokens()
    }
    pub fn login_limiter(&self) -> &LoginLimiter {
        &self.login_limiter
    }
}

/// GET / — plain-text banner.
pub async fn root() -> &'static str {
    "Crime Management System API is running..."
}

/// GET /health — liveness probe.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": "casebook-auth" })),
    )
}
