use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kinship_api::config::ServerConfig;
use kinship_api::connections::ConnectionService;
use kinship_api::router::build_app_router;
use kinship_api::state::AppState;
use kinship_api::ws::{self, EventRouter, SessionRegistry};
use kinship_db::PgStore;
use kinship_events::{ActivityPersistence, EventBus};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kinship_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let ladder = config
        .load_trust_ladder()
        .expect("Failed to load trust levels");
    tracing::info!(levels = ladder.levels().len(), "Trust ladder loaded");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = kinship_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    kinship_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    kinship_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Session registry and event router ---
    let sessions = Arc::new(SessionRegistry::new(config.session_channel_capacity));
    let event_router = EventRouter::new(Arc::clone(&sessions), config.session_write_timeout());

    // --- Heartbeat ---
    let heartbeat_cancel = CancellationToken::new();
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&sessions), heartbeat_cancel.clone());

    // --- Activity bus ---
    let event_bus = Arc::new(EventBus::default());
    let persistence_handle = tokio::spawn(ActivityPersistence::run(
        pool.clone(),
        event_bus.subscribe(),
    ));
    tracing::info!("Activity persistence started");

    // --- Connection service ---
    let connections = Arc::new(ConnectionService::with_backend(
        Arc::new(PgStore::new(pool.clone())),
        Arc::new(ladder),
        event_router,
        Arc::clone(&event_bus),
    ));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        sessions: Arc::clone(&sessions),
        connections: Arc::clone(&connections),
        event_bus: Arc::clone(&event_bus),
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

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // The service and bus hold the last senders; dropping them closes the
    // channel so persistence drains and exits.
    drop(connections);
    drop(event_bus);
    if tokio::time::timeout(config.shutdown_timeout(), persistence_handle)
        .await
        .is_err()
    {
        tracing::warn!("Activity persistence did not finish before the shutdown timeout");
    }

    let session_count = sessions.session_count().await;
    tracing::info!(session_count, "Closing remaining real-time sessions");
    sessions.shutdown_all().await;

    heartbeat_cancel.cancel();
    let _ = heartbeat_handle.await;
    tracing::info!("Heartbeat task stopped");

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
        () = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
