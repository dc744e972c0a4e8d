//! Business logic: the credential lifecycle.

pub mod auth;

pub use auth::{AuthService, Registration, Session};
