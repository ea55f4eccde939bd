mod config;
mod worker;

use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use roadeye_api::notify::BroadcastPublisher;
use roadeye_api::session::SessionIssuer;
use roadeye_api::{AppState, AppStateInner};
use roadeye_db::Database;

use crate::config::Config;

/// Buffered notifications per worker before it starts lagging.
const NOTIFICATION_CAPACITY: usize = 1024;
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "roadeye=debug,roadeye_api=debug,roadeye_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    let db = Database::open(&config.db_path)?;
    info!("Database ready at {}", config.db_path.display());

    let publisher = BroadcastPublisher::new(NOTIFICATION_CAPACITY);
    let worker = tokio::spawn(worker::run_notification_loop(publisher.subscribe()));

    let state: AppState = Arc::new(AppStateInner {
        db,
        sessions: SessionIssuer::new(&config.session),
        hazards: config.hazards.clone(),
        publisher: Arc::new(publisher),
        request_timeout: config.request_timeout,
    });

    let app = roadeye_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!(
        "Confirm threshold {} votes, max radius {} km, request timeout {:?}",
        config.hazards.confirm_threshold, config.hazards.max_radius_km, config.request_timeout
    );
    info!("RoadEye server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router (and with it the last publisher) is gone; let the worker drain.
    match tokio::time::timeout(WORKER_DRAIN_TIMEOUT, worker).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Notification worker ended abnormally: {}", e),
        Err(_) => warn!("Notification worker still busy after {:?}, abandoning", WORKER_DRAIN_TIMEOUT),
    }
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
