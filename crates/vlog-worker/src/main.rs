//! Queue relay binary.
//!
//! Delivers tasks from the Redis stream to the API task webhooks.

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vlog_queue::TaskQueue;
use vlog_worker::{RelayConfig, RelayExecutor};

#[tokio::main]
async fn main() {
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        eprintln!("rustls crypto provider already installed");
    }

    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting vlog-relay");

    let config = RelayConfig::from_env();
    info!(config = ?config, "Relay config");

    let queue = match TaskQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!(error = %e, "Failed to create task queue");
            std::process::exit(1);
        }
    };

    let executor = match RelayExecutor::new(config, queue) {
        Ok(e) => e,
        Err(e) => {
            error!(error = %e, "Failed to create relay");
            std::process::exit(1);
        }
    };

    let shutdown = executor.shutdown_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = shutdown.send(true);
    });

    if let Err(e) = executor.run().await {
        error!(error = %e, "Relay error");
        std::process::exit(1);
    }

    info!("Relay shutdown complete");
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vlog=info,vlog_worker=info,vlog_queue=info"));

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
