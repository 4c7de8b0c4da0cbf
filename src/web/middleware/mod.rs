//! Middleware for the web adapter.

mod auth;

pub use auth::{principal_from_header, trusted_principal};
