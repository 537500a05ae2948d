use anyhow::{Context, Result};
use network_device_dashboard::api;
use network_device_dashboard::config::{Config, PingMode};
use network_device_dashboard::dashboard::Dashboard;
use network_device_dashboard::logging::init_logging;
use network_device_dashboard::network::{excluded_addresses, get_local_network_info};
use network_device_dashboard::ping::build_pinger;
use network_device_dashboard::scanner::ArpCommand;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    init_logging(config.log_dir.as_deref())?;

    let network = match get_local_network_info() {
        Ok(info) => {
            tracing::info!(
                "Interface {} on {} (gateway {})",
                info.interface,
                info.network_range,
                info.gateway.as_deref().unwrap_or("none")
            );
            Some(info)
        }
        Err(e) => {
            tracing::warn!("Could not detect the local network: {:#}", e);
            None
        }
    };

    let excluded = excluded_addresses(
        network.as_ref().and_then(|info| info.network()),
        &config.arp_exclude,
    );
    tracing::debug!("Excluding neighbor entries for {:?}", excluded);

    let pinger = build_pinger(config.ping_mode == PingMode::Icmp, config.ping_timeout).await;
    let neighbors = Arc::new(ArpCommand::new(excluded));

    let dashboard = Dashboard::new(&config, pinger, neighbors).with_network(network);
    let app = api::router(Arc::new(dashboard));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    tracing::info!(
        "Serving device dashboard on {} (data in {})",
        config.listen_addr,
        config.cache_dir.display()
    );

    axum::serve(listener, app)
        .await
        .context("HTTP server failed")?;
    Ok(())
}
