//! Request extractors.
//!
//! - [`auth::AuthUser`] -- the authenticated employee, from a JWT Bearer token.

pub mod auth;
