use std::net::{IpAddr, SocketAddr};

use chrono::Utc;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally::api;
use tally::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse args and env vars
    let args = cli::Cli::parse();
    let settings = args.into_settings();

    // Socket server listen address setup
    let listen_address: IpAddr = settings.listen_address.parse()?;
    let socket_address = SocketAddr::from((listen_address, settings.listen_port));

    // Build Axum Router over the shared vote state
    let (shared, api) = api::api(&settings)?;

    // Sweep idle client histories so the detector map stays bounded
    let sweep_interval = tokio::time::Duration::from_millis(settings.detector.time_window_ms as u64);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Ok(mut core) = shared.core.lock() {
                let removed = core.detector.sweep_stale(Utc::now().timestamp_millis());
                if removed > 0 {
                    debug!(removed, "swept stale client histories");
                }
            }
        }
    });

    // Start server; connect info feeds the per-client identity
    info!("Starting Tally on {}", socket_address);
    axum::Server::bind(&socket_address)
        .serve(api.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    Ok(())
}
