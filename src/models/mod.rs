//! Data models: users and roles.

pub mod user;

pub use user::*;
