//! Request extractors and per-route middleware.

pub mod auth;
pub mod rate_limit;
pub mod validated_json;

pub use auth::AuthUser;
pub use rate_limit::LoginLimiter;
pub use validated_json::ValidatedJson;
