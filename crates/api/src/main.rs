use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hrchat_api::config::ServerConfig;
use hrchat_api::engine::build_generator;
use hrchat_api::gateway::StreamingGateway;
use hrchat_api::router::build_app_router;
use hrchat_api::state::AppState;
use hrchat_db::store::{MemorySessionStore, PgSessionStore, SessionStore};
use tokio::sync::Notify;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hrchat_api=debug,hrchat_db=debug,tower_http=debug".into());
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Session store ---
    let store: Arc<dyn SessionStore> = match config.database_url.as_deref() {
        Some(database_url) => {
            let pool = hrchat_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            hrchat_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            hrchat_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgSessionStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, chat sessions are kept in memory only");
            Arc::new(MemorySessionStore::new())
        }
    };

    // --- Generation ---
    let generator = build_generator(&config.generation);
    tracing::info!(
        generator = generator.name(),
        timeout_secs = config.generation.timeout_secs,
        history_window = config.generation.history_window,
        "Reply generator ready"
    );

    let gateway = Arc::new(StreamingGateway::new(
        Arc::clone(&store),
        generator,
        config.generation.timeout(),
        config.generation.history_window,
    ));

    // --- App state ---
    let state = AppState {
        store,
        gateway: Arc::clone(&gateway),
        config: Arc::new(config.clone()),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    // Graceful shutdown waits for open reply streams; bound that wait.
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let signalled = Arc::new(Notify::new());
    let on_signal = Arc::clone(&signalled);

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            on_signal.notify_one();
        })
        .into_future();

    tokio::select! {
        result = server => {
            result.expect("Server error");
        }
        () = async {
            signalled.notified().await;
            tokio::time::sleep(shutdown_timeout).await;
        } => {
            tracing::warn!(
                active_exchanges = gateway.in_flight().active_count(),
                timeout_secs = shutdown_timeout.as_secs(),
                "Open reply streams did not finish in time, exiting"
            );
        }
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
