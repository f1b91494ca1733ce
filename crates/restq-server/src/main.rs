#![doc = include_str!("../README.md")]

mod server;

use clap::Parser;
use restq::Coordinator;
use server::config::{CliArgs, ServerConfig};
use server::http::serve;
use server::service::handler::QueueService;
use server::shutdown::{grace_expired, shutdown_signal};
use server::telemetry::{init_telemetry, shutdown_telemetry};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let listener = TcpListener::bind(config.addr).await?;
    log_startup_info(&config);

    let coordinator = Coordinator::new();
    let app = QueueService::new(coordinator.clone()).router();
    let draining = CancellationToken::new();

    let server = serve(
        listener,
        app,
        config.limits,
        shutdown_signal(coordinator, draining.clone()),
    );

    tokio::select! {
        () = server => tracing::info!("Service shut down successfully"),
        () = grace_expired(draining, config.shutdown_grace) => {
            tracing::warn!(
                "Grace period of {:?} elapsed, terminating outstanding requests",
                config.shutdown_grace
            );
        }
    }

    shutdown_telemetry(providers);
    Ok(())
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting queue service on {} with full config: {:#?}",
            config.addr,
            config
        );
    } else {
        tracing::info!("Starting queue service on {}", config.addr);
    }
}
