//! fileportal -- local edge emulator for the S3 file portal.
//!
//! Serves the listing page, download redirects, origin fetches and the
//! upload URL API from one process.  SIGTERM/SIGINT stop accepting
//! connections and wait for in-flight requests up to
//! `server.shutdown_timeout` seconds.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use fileportal::handlers::upload::UploadUrlIssuer;
use fileportal::logging::{init_tracing, LogOutput};

/// Command-line arguments for the file portal server.
#[derive(Parser, Debug)]
#[command(
    name = "fileportal",
    version,
    about = "Browsable S3 file portal with an edge emulator"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "fileportal.example.yaml")]
    config: String,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = fileportal::config::load_config(&cli.config)?;
    init_tracing(&config.logging, LogOutput::Stdout)?;
    info!("Loaded configuration from {}", cli.config);

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    if config.observability.metrics {
        fileportal::metrics::init_metrics()?;
        fileportal::metrics::describe_metrics();
        info!("Prometheus metrics initialized");
    }

    if config.edge.origin_domain.is_empty() {
        warn!("edge.origin_domain is empty; edge requests will fail with 502");
    }

    let store = fileportal::storage::from_config(&config.storage).await?;
    info!("Storage backend '{}' initialized", config.storage.backend);

    let uploads = UploadUrlIssuer::from_env(store.clone(), &config.upload.bucket_env)?;
    info!("Upload URLs will target bucket {}", uploads.bucket());

    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout);
    let state = Arc::new(fileportal::AppState::new(config, store, uploads));
    let app = fileportal::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("fileportal listening on {}", bind_addr);

    let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = drain_tx.send(());
        })
        .into_future();

    tokio::select! {
        result = server => result?,
        _ = async {
            let _ = drain_rx.await;
            tokio::time::sleep(shutdown_timeout).await;
        } => {
            warn!("In-flight requests still running after {:?}; exiting", shutdown_timeout);
        }
    }

    info!("fileportal shut down");
    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        },
    }
}
