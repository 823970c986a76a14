//! Axum API server binary.

use std::net::SocketAddr;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vlog_api::{create_router, metrics, ApiConfig, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        eprintln!("rustls crypto provider already installed");
    }

    init_tracing();

    info!("Starting vlog-api");

    let config = ApiConfig::from_env();
    info!(host = %config.host, port = config.port, environment = %config.environment, "API config");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let state = match AppState::from_env(config.clone(), shutdown_rx).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to create application state");
            std::process::exit(1);
        }
    };

    let metrics_handle = if config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                warn!(error = %e, "Failed to install Prometheus recorder");
                None
            }
        }
    } else {
        None
    };

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, "Invalid bind address");
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, addr = %addr, "Failed to bind");
            std::process::exit(1);
        }
    };

    info!(addr = %addr, "Listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
            // Stops in-process generation polling.
            let _ = shutdown_tx.send(true);
        })
        .await;

    if let Err(e) = served {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vlog=info,vlog_api=info,vlog_worker=info,vlog_store=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}
