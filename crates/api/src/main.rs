use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use flowgate_engine::{FileLocationSource, Instance, InstanceSettings};
use flowgate_schema::{SCHEMA, SCHEMA_VERSION};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flowgate_api::config::ServerConfig;
use flowgate_api::router::build_app_router;
use flowgate_api::state::AppState;
use flowgate_api::ws;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowgate_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Schema ---
    // A type missing from the registry is a build defect; refuse to serve.
    SCHEMA
        .validate()
        .unwrap_or_else(|e| panic!("Schema registry is inconsistent: {e}"));
    tracing::info!(
        version = SCHEMA_VERSION,
        types = SCHEMA.types().len(),
        operations = SCHEMA.operations().len(),
        fingerprint = %SCHEMA.fingerprint(),
        "Schema registry validated"
    );

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Engine ---
    let instance = Arc::new(Instance::new(InstanceSettings {
        step_delay: config.step_delay,
    }));
    for spec in &config.locations {
        let source = FileLocationSource::from_spec(spec)
            .unwrap_or_else(|| panic!("Invalid location spec '{spec}', expected name=path"));
        instance.add_location(Arc::new(source)).await;
    }
    let locations = instance.locations().await;
    tracing::info!(
        locations = locations.len(),
        failed = locations.iter().filter(|l| l.load_error.is_some()).count(),
        "Workspace ready"
    );

    // --- WebSocket manager ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    // --- App state ---
    let state = AppState {
        instance,
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
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

    let shutdown = CancellationToken::new();
    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let server_handle = tokio::spawn(async move { server.await });

    shutdown_signal().await;

    // Log subscriptions never end on their own; close them so the
    // graceful shutdown can drain.
    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing log subscriptions");
    ws_manager.shutdown_all().await;
    shutdown.cancel();

    match tokio::time::timeout(Duration::from_secs(config.shutdown_timeout_secs), server_handle).await {
        Ok(Ok(Ok(()))) => tracing::info!("Server drained"),
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "Server error"),
        Ok(Err(e)) => tracing::error!(error = %e, "Server task failed"),
        Err(_) => tracing::warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Shutdown timed out with requests still in flight"
        ),
    }

    heartbeat_handle.abort();
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
