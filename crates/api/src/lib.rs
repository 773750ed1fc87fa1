//! hrchat API server library.
//!
//! Exposes the building blocks (config, state, error handling, generation
//! engine, streaming gateway, routes) so integration tests and the binary
//! entrypoint share them.

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
