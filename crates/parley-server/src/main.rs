mod config;
mod routes;

use std::sync::Arc;

use tracing::{info, warn};

use parley_api::{AppState, AppStateInner, MessagePipeline};
use parley_classifier::Classifier;
use parley_crypto::ShiftCipher;
use parley_db::Database;
use parley_gateway::{Dispatcher, PresenceRegistry};

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env();
    if config.uses_placeholder_secret() {
        warn!("PARLEY_JWT_SECRET is unset or still a placeholder; do not run this in production");
    }

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);

    // Shared state
    let presence = PresenceRegistry::new();
    let dispatcher = Dispatcher::new(presence);
    let classifier = Arc::new(Classifier::new(config.classifier.clone())?);
    let pipeline = MessagePipeline::new(
        db.clone(),
        classifier.clone(),
        ShiftCipher::new(config.cipher_shift),
        dispatcher.clone(),
    );
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        dispatcher,
        pipeline,
        classifier,
    });

    let app = routes::build_router(state);

    info!("Parley server listening on {}", config.http_addr);
    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

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
                warn!("failed to install SIGTERM handler: {}", e);
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
