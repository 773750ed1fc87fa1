use std::sync::Arc;

use hrchat_db::store::SessionStore;

use crate::config::ServerConfig;
use crate::gateway::StreamingGateway;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Session store (Postgres or in-memory).
    pub store: Arc<dyn SessionStore>,
    /// Streaming gateway; shares `store` and owns the in-flight registry.
    pub gateway: Arc<StreamingGateway>,
    /// Server configuration (read by the auth extractor).
    pub config: Arc<ServerConfig>,
}
