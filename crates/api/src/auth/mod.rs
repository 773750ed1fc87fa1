//! Authentication primitives.
//!
//! Tokens are issued by the portal's auth service; this server only validates
//! them. [`jwt`] holds the claims shape and HS256 validation.

pub mod jwt;
