//! Bearer-token extractor for protected routes.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tracing::debug;

use crate::auth::AccessClaims;
use crate::error::AppError;
use crate::handlers::http::AppState;

/// Verified access-token claims of the caller (`Authorization: Bearer <token>`).
///
/// Missing or malformed header → `Unauthorized`; a lapsed token →
/// `TokenExpired`; anything else wrong with the token → `InvalidToken`.
#[derive(Clone, Debug)]
pub struct AuthUser(pub AccessClaims);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Unauthorized)?;
        let token = bearer.token();
        if token.is_empty() {
            return Err(AppError::Unauthorized);
        }

        let claims = state.tokens().verify_access(token).map_err(|e| {
            debug!(reason = %e, "access token rejected");
            AppError::from(e)
        })?;
        Ok(AuthUser(claims))
    }
}
