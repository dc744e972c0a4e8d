//! Registration, login, token refresh and profile lookup over a [`UserStore`].

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::auth::{CredentialHasher, TokenCodec, TokenError};
use crate::db::UserStore;
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, PublicUser, Role, User};

/// Hashed once and verified against when the login email is unknown, so both
/// rejection paths pay for one Argon2 verification.
const DECOY_PASSWORD: &str = "decoy-credential-never-issued";

/// Input for [`AuthService::register`]. Shape validation happens at the HTTP layer.
#[derive(Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// An access/refresh token pair plus the user it was minted for.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

/// Credential lifecycle: hashing, token minting and verification against the store.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    hasher: CredentialHasher,
    tokens: TokenCodec,
    decoy_digest: Arc<OnceCell<String>>,
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>, tokens: TokenCodec) -> Self {
        Self {
            store,
            hasher: CredentialHasher::new(),
            tokens,
            decoy_digest: Arc::new(OnceCell::new()),
        }
    }

    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    #[instrument(skip_all, fields(role = %input.role))]
    pub async fn register(&self, input: Registration) -> AppResult<PublicUser> {
        let email = normalize_email(&input.email);
        if self.store.find_by_email(&email).await?.is_some() {
            debug!(email = %email, "registration rejected: email taken");
            return Err(AppError::DuplicateEmail);
        }

        let password_hash = self.hash_password(input.password).await?;
        let user = self
            .store
            .insert(NewUser {
                name: input.name,
                email,
                password_hash,
                role: input.role,
            })
            .await?;

        info!(user_id = %user.id, "user registered");
        Ok(user.to_public())
    }

    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> AppResult<Session> {
        let email = normalize_email(email);
        let Some(user) = self.store.find_by_email(&email).await? else {
            self.verify_decoy(password).await?;
            debug!("login rejected: unknown email");
            return Err(AppError::InvalidCredentials);
        };

        if !self
            .verify_password(password.to_string(), user.password_hash.clone())
            .await?
        {
            debug!(user_id = %user.id, "login rejected: wrong password");
            return Err(AppError::InvalidCredentials);
        }

        let session = self.mint_session(&user)?;
        info!(user_id = %user.id, "user logged in");
        Ok(session)
    }

    /// New access token only; the refresh token keeps its original expiry.
    #[instrument(skip_all)]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> AppResult<String> {
        let claims = self
            .tokens
            .verify_refresh(refresh_token)
            .map_err(refresh_rejected)?;

        let Some(user) = self.store.find_by_id(claims.sub).await? else {
            debug!(user_id = %claims.sub, "refresh rejected: user no longer exists");
            return Err(AppError::InvalidRefreshToken);
        };

        self.tokens.sign_access(user.id, user.role)
    }

    /// Full rotation: a fresh access token and a fresh refresh token.
    #[instrument(skip_all)]
    pub async fn rotate_session(&self, refresh_token: &str) -> AppResult<Session> {
        let claims = self
            .tokens
            .verify_refresh(refresh_token)
            .map_err(refresh_rejected)?;

        let user = self
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::UserNotFound)?;

        let session = self.mint_session(&user)?;
        info!(user_id = %user.id, "session rotated");
        Ok(session)
    }

    /// `None` is a normal outcome; the caller decides whether it means 404.
    pub async fn get_user_by_id(&self, id: Uuid) -> AppResult<Option<PublicUser>> {
        Ok(self.store.find_by_id(id).await?.map(|u| u.to_public()))
    }

    fn mint_session(&self, user: &User) -> AppResult<Session> {
        Ok(Session {
            access_token: self.tokens.sign_access(user.id, user.role)?,
            refresh_token: self.tokens.sign_refresh(user.id)?,
            user: user.to_public(),
        })
    }

    async fn hash_password(&self, password: String) -> AppResult<String> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("hash task: {}", e)))?
    }

    async fn verify_decoy(&self, password: &str) -> AppResult<()> {
        let digest = self
            .decoy_digest
            .get_or_try_init(|| self.hash_password(DECOY_PASSWORD.to_string()))
            .await?
            .clone();
        self.verify_password(password.to_string(), digest).await?;
        Ok(())
    }

    async fn verify_password(&self, password: String, digest: String) -> AppResult<bool> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("verify task: {}", e)))?
    }
}

fn normalize_email(email: &str) -> String {
    email.to_lowercase()
}

// Expired and invalid refresh tokens get the same response at this boundary.
fn refresh_rejected(err: TokenError) -> AppError {
    debug!(reason = %err, "refresh token rejected");
    AppError::InvalidRefreshToken
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::REFRESH_TOKEN_TTL_SECS;
    use crate::db::MemoryUserStore;
    use chrono::{Duration, Utc};

    fn codec() -> TokenCodec {
        TokenCodec::new(
            "access-secret-for-tests-0123456789",
            "refresh-secret-for-tests-9876543210",
            "crime-management-api",
            "web-app",
        )
    }

    fn service() -> (AuthService, MemoryUserStore) {
        let store = MemoryUserStore::new();
        let service = AuthService::new(Arc::new(store.clone()), codec());
        (service, store)
    }

    fn alice() -> Registration {
        Registration {
            name: "Alice".to_string(),
            email: "ALICE@x.com".to_string(),
            password: "Abcd123!".to_string(),
            role: Role::Officer,
        }
    }

    #[tokio::test]
    async fn register_normalizes_email_and_hides_hash() {
        let (service, store) = service();
        let user = service.register(alice()).await.unwrap();
        assert_eq!(user.email, "alice@x.com");
        assert_eq!(user.role, Role::Officer);

        let stored = store.find_by_email("alice@x.com").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "Abcd123!");

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email_case_insensitively() {
        let (service, _) = service();
        service.register(alice()).await.unwrap();
        let mut again = alice();
        again.email = "alice@X.COM".to_string();
        assert!(matches!(
            service.register(again).await,
            Err(AppError::DuplicateEmail)
        ));
    }

    #[tokio::test]
    async fn concurrent_duplicate_registration_has_one_winner() {
        let (service, store) = service();
        let (a, b) = tokio::join!(service.register(alice()), service.register(alice()));
        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|r| matches!(r, Err(AppError::DuplicateEmail)))
                .count(),
            1
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn login_returns_tokens_for_user() {
        let (service, _) = service();
        let registered = service.register(alice()).await.unwrap();
        let session = service.login("alice@x.com", "Abcd123!").await.unwrap();

        assert_eq!(session.user, registered);
        assert_eq!(session.user.role, Role::Officer);
        let access = service.tokens().verify_access(&session.access_token).unwrap();
        assert_eq!(access.sub, registered.id);
        assert_eq!(access.role, Role::Officer);
        let refresh = service.tokens().verify_refresh(&session.refresh_token).unwrap();
        assert_eq!(refresh.sub, registered.id);
    }

    #[tokio::test]
    async fn login_accepts_mixed_case_email() {
        let (service, _) = service();
        service.register(alice()).await.unwrap();
        assert!(service.login("Alice@X.com", "Abcd123!").await.is_ok());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let (service, _) = service();
        service.register(alice()).await.unwrap();
        let wrong = service.login("alice@x.com", "wrong").await.unwrap_err();
        let unknown = service.login("bob@x.com", "Abcd123!").await.unwrap_err();
        assert!(matches!(wrong, AppError::InvalidCredentials));
        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn unknown_email_still_runs_a_password_verification() {
        let (service, _) = service();
        assert!(!service.decoy_digest.initialized());

        let err = service.login("nobody@x.com", "Abcd123!").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
        let digest = service.decoy_digest.get().cloned().unwrap();
        assert!(digest.starts_with("$argon2id$"));

        // The decoy digest is reused and never admits a login.
        let err = service
            .login("nobody@x.com", DECOY_PASSWORD)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
        assert_eq!(service.decoy_digest.get(), Some(&digest));

        // Clones share the digest.
        assert!(service.clone().decoy_digest.initialized());
    }

    #[tokio::test]
    async fn refresh_access_token_carries_same_identity() {
        let (service, _) = service();
        let user = service.register(alice()).await.unwrap();
        let session = service.login("alice@x.com", "Abcd123!").await.unwrap();

        let access = service
            .refresh_access_token(&session.refresh_token)
            .await
            .unwrap();
        let claims = service.tokens().verify_access(&access).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Officer);
    }

    #[tokio::test]
    async fn refresh_with_expired_token_is_invalid_refresh() {
        let (service, _) = service();
        let user = service.register(alice()).await.unwrap();
        let issued = Utc::now() - Duration::seconds(REFRESH_TOKEN_TTL_SECS + 60);
        let stale = service.tokens().sign_refresh_at(user.id, issued).unwrap();

        assert!(matches!(
            service.refresh_access_token(&stale).await,
            Err(AppError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn refresh_rejects_access_token_and_garbage() {
        let (service, _) = service();
        service.register(alice()).await.unwrap();
        let session = service.login("alice@x.com", "Abcd123!").await.unwrap();

        assert!(matches!(
            service.refresh_access_token(&session.access_token).await,
            Err(AppError::InvalidRefreshToken)
        ));
        assert!(matches!(
            service.refresh_access_token("garbage").await,
            Err(AppError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn refresh_for_deleted_user_is_invalid_refresh() {
        let (service, store) = service();
        let user = service.register(alice()).await.unwrap();
        let session = service.login("alice@x.com", "Abcd123!").await.unwrap();
        store.remove(user.id).await;

        assert!(matches!(
            service.refresh_access_token(&session.refresh_token).await,
            Err(AppError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn rotate_session_mints_both_tokens() {
        let (service, _) = service();
        let user = service.register(alice()).await.unwrap();
        let session = service.login("alice@x.com", "Abcd123!").await.unwrap();

        let rotated = service.rotate_session(&session.refresh_token).await.unwrap();
        assert_eq!(rotated.user, user);
        let access = service.tokens().verify_access(&rotated.access_token).unwrap();
        let refresh = service.tokens().verify_refresh(&rotated.refresh_token).unwrap();
        assert_eq!(access.sub, user.id);
        assert_eq!(refresh.sub, user.id);
    }

    #[tokio::test]
    async fn rotate_session_for_deleted_user_is_not_found() {
        let (service, store) = service();
        let user = service.register(alice()).await.unwrap();
        let session = service.login("alice@x.com", "Abcd123!").await.unwrap();
        store.remove(user.id).await;

        assert!(matches!(
            service.rotate_session(&session.refresh_token).await,
            Err(AppError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn rotate_session_rejects_expired_token() {
        let (service, _) = service();
        let user = service.register(alice()).await.unwrap();
        let issued = Utc::now() - Duration::days(8);
        let stale = service.tokens().sign_refresh_at(user.id, issued).unwrap();
        assert!(matches!(
            service.rotate_session(&stale).await,
            Err(AppError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn get_user_by_id_is_stable_and_optional() {
        let (service, _) = service();
        let user = service.register(alice()).await.unwrap();

        let first = service.get_user_by_id(user.id).await.unwrap();
        let second = service.get_user_by_id(user.id).await.unwrap();
        assert_eq!(first, Some(user));
        assert_eq!(first, second);
        assert_eq!(service.get_user_by_id(Uuid::new_v4()).await.unwrap(), None);
    }
}
