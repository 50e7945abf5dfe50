use std::sync::Arc;

use anyhow::Result;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aquamonitor_service::{
    alerts::{AlertService, CooldownGate},
    api::{self, AppState},
    archiver::ArchiverService,
    config::Config,
    db,
    push::{EmulatedTransport, GatewayClient, PushTransport},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent — env vars may be set externally)
    let _ = dotenvy::dotenv();

    // Initialise tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // Load config
    let config = Config::from_env()?;

    // Connect to DB and run migrations
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database ready");

    // Push transport: real gateway when configured, emulator otherwise
    let transport: Arc<dyn PushTransport> = match &config.push_gateway {
        Some(gateway) => Arc::new(GatewayClient::new(gateway)),
        None => {
            info!("No push gateway configured, notifications run in emulator mode");
            Arc::new(EmulatedTransport)
        }
    };

    let alerts = AlertService::new(
        pool.clone(),
        transport,
        CooldownGate::new(pool.clone(), config.notification_cooldown_minutes),
    );

    // Spawn the periodic archiver loop
    {
        let archiver = ArchiverService::new(pool.clone(), config.archive_interval_secs);
        tokio::spawn(archiver.run());
    }

    // Start HTTP server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(AppState { pool, alerts }))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
