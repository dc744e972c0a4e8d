//! Shared application state and service-level HTTP handlers.

pub mod http;

pub use http::*;
