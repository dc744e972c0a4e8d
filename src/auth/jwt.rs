//! Access and refresh token signing and verification (HS256 JWT).
//!
//! Each token class has its own secret. Issuer and audience are part of the
//! signed payload and checked on every verification. Verification failures
//! collapse into two kinds: [`TokenError::Expired`] when the signature holds
//! but `exp` has passed, [`TokenError::Invalid`] for everything else.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::Role;

/// Access tokens live one hour.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;
/// Refresh tokens live seven days.
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

const REFRESH_TOKEN_TYPE: &str = "refresh";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

struct Inner {
    access: KeyPair,
    refresh: KeyPair,
    issuer: String,
    audience: String,
    validation: Validation,
}

/// Signs and verifies both token classes. Cheap to clone; keys are shared.
#[derive(Clone)]
pub struct TokenCodec {
    inner: Arc<Inner>,
}

impl TokenCodec {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        let issuer = issuer.into();
        let audience = audience.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&issuer]);
        validation.set_audience(&[&audience]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "aud", "sub"]);

        Self {
            inner: Arc::new(Inner {
                access: KeyPair::from_secret(access_secret),
                refresh: KeyPair::from_secret(refresh_secret),
                issuer,
                audience,
                validation,
            }),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            &config.jwt_refresh_secret,
            config.jwt_issuer.clone(),
            config.jwt_audience.clone(),
        )
    }

    pub fn sign_access(&self, user_id: Uuid, role: Role) -> AppResult<String> {
        self.sign_access_at(user_id, role, Utc::now())
    }

    /// Mint an access token as if issued at `issued_at`.
    pub fn sign_access_at(
        &self,
        user_id: Uuid,
        role: Role,
        issued_at: DateTime<Utc>,
    ) -> AppResult<String> {
        let iat = issued_at.timestamp();
        let claims = AccessClaims {
            sub: user_id,
            role,
            iat,
            exp: iat + ACCESS_TOKEN_TTL_SECS,
            iss: self.inner.issuer.clone(),
            aud: self.inner.audience.clone(),
        };
        sign(&claims, &self.inner.access.encoding)
    }

    pub fn sign_refresh(&self, user_id: Uuid) -> AppResult<String> {
        self.sign_refresh_at(user_id, Utc::now())
    }

    /// Mint a refresh token as if issued at `issued_at`.
    pub fn sign_refresh_at(&self, user_id: Uuid, issued_at: DateTime<Utc>) -> AppResult<String> {
        let iat = issued_at.timestamp();
        let claims = RefreshClaims {
            sub: user_id,
            token_type: REFRESH_TOKEN_TYPE.to_string(),
            iat,
            exp: iat + REFRESH_TOKEN_TTL_SECS,
            iss: self.inner.issuer.clone(),
            aud: self.inner.audience.clone(),
        };
        sign(&claims, &self.inner.refresh.encoding)
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        verify(token, &self.inner.access.decoding, &self.inner.validation)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let claims: RefreshClaims =
            verify(token, &self.inner.refresh.decoding, &self.inner.validation)?;
        if claims.token_type != REFRESH_TOKEN_TYPE {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }
}

fn sign<T: Serialize>(claims: &T, key: &EncodingKey) -> AppResult<String> {
    encode(&Header::new(Algorithm::HS256), claims, key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("sign token: {}", e)))
}

// Signature is checked before any claim, so `ExpiredSignature` implies an authentic token.
fn verify<T: DeserializeOwned>(
    token: &str,
    key: &DecodingKey,
    validation: &Validation,
) -> Result<T, TokenError> {
    decode::<T>(token, key, validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })
}
