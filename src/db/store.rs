//! Storage contract consumed by the auth service.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{NewUser, User};

/// Durable user records keyed by unique id and unique (lowercase) email.
///
/// Implementations must enforce email uniqueness themselves: `insert` fails
/// with [`AppError::DuplicateEmail`](crate::error::AppError::DuplicateEmail)
/// when the email is taken, even if a prior `find_by_email` returned nothing.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn insert(&self, user: NewUser) -> AppResult<User>;
}
