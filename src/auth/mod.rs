//! Authentication: password hashing, JWT codec, HTTP handlers.

mod handlers;
mod jwt;
mod password;

pub use handlers::{login, me, refresh_session, refresh_token, register};
pub use jwt::{
    AccessClaims, RefreshClaims, TokenCodec, TokenError, ACCESS_TOKEN_TTL_SECS,
    REFRESH_TOKEN_TTL_SECS,
};
pub use password::CredentialHasher;
