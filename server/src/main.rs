//! Check-in HTTP server.
//!
//! Connects to Postgres, applies migrations and serves the API plus a
//! Prometheus scrape endpoint until SIGTERM or Ctrl+C.

use anyhow::Context;
use checkin_postgres::PostgresStore;
use checkin_runtime::CheckinEnvironment;
use checkin_runtime::metrics::MetricsExporter;
use checkin_server::server::metrics_router;
use checkin_server::{AppState, Config, build_router};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,checkin=debug,sqlx=warn,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting check-in server");

    let config = Config::from_env();
    info!(
        address = %config.server_addr(),
        metrics_address = %config.metrics_addr(),
        bucket_minutes = config.analytics.bucket_minutes,
        "Configuration loaded"
    );

    let mut exporter = MetricsExporter::new();
    exporter.install().context("installing metrics exporter")?;
    let exporter = Arc::new(exporter);

    info!("Connecting to database...");
    let store = Arc::new(
        PostgresStore::connect(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(config.database.connect_timeout),
        )
        .await
        .context("connecting to database")?,
    );
    store.migrate().await.context("running migrations")?;
    info!("Database ready");

    let env = CheckinEnvironment::from_store(store.clone());
    let state = AppState::new(env, config.analytics_config(), store);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.server_addr())
        .await
        .with_context(|| format!("binding {}", config.server_addr()))?;
    let metrics_listener = tokio::net::TcpListener::bind(config.metrics_addr())
        .await
        .with_context(|| format!("binding {}", config.metrics_addr()))?;
    info!(address = %config.server_addr(), "Server listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let mut api = tokio::spawn({
        let shutdown = shutdown_rx.clone();
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(wait_for(shutdown))
                .await
        }
    });
    let metrics = tokio::spawn(async move {
        axum::serve(metrics_listener, metrics_router(exporter))
            .with_graceful_shutdown(wait_for(shutdown_rx))
            .await
    });

    tokio::select! {
        () = shutdown_signal() => {}
        result = &mut api => {
            metrics.abort();
            result.context("server task panicked")?.context("server failed")?;
            return Ok(());
        }
    }

    shutdown_tx.send_replace(());
    let deadline = Duration::from_secs(config.server.shutdown_timeout);
    match tokio::time::timeout(deadline, api).await {
        Ok(joined) => joined.context("server task panicked")?.context("server failed")?,
        Err(_) => warn!(timeout_secs = deadline.as_secs(), "Shutdown timed out, dropping open connections"),
    }
    if let Err(err) = metrics.await {
        error!(error = %err, "Metrics server task failed");
    }

    info!("Server stopped");
    Ok(())
}

async fn wait_for(mut shutdown: watch::Receiver<()>) {
    // A dropped sender also means shut down.
    let _ = shutdown.changed().await;
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
