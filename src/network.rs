use anyhow::{anyhow, Result};
use ipnetwork::Ipv4Network;
use serde::Serialize;
use std::net::Ipv4Addr;

/// Multicast DNS group; shows up in every neighbor table that has seen mDNS traffic.
pub const MDNS_GROUP: &str = "224.0.0.251";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkInfo {
    pub interface: String,
    pub network_range: String,
    pub gateway: Option<String>,
}

impl NetworkInfo {
    pub fn network(&self) -> Option<Ipv4Network> {
        self.network_range.parse().ok()
    }
}

/// Reads the default interface's IPv4 network and gateway.
pub fn get_local_network_info() -> Result<NetworkInfo> {
    let interface = default_net::get_default_interface()
        .map_err(|e| anyhow!("Failed to get default interface: {}", e))?;

    let ipv4 = interface
        .ipv4
        .first()
        .ok_or_else(|| anyhow!("No IPv4 address on {}", interface.name))?;
    let network = Ipv4Network::new(ipv4.addr, ipv4.prefix_len)?;

    let gateway = default_net::get_default_gateway()
        .ok()
        .map(|gateway| gateway.ip_addr.to_string());

    Ok(NetworkInfo {
        interface: interface.name,
        network_range: format!("{}/{}", network.network(), network.prefix()),
        gateway,
    })
}

/// Addresses whose neighbor entries never correspond to a device.
pub fn excluded_addresses(network: Option<Ipv4Network>, extra: &[String]) -> Vec<String> {
    let mut excluded = vec![MDNS_GROUP.to_string()];
    if let Some(network) = network.filter(|net| net.prefix() < 31) {
        excluded.push(network.network().to_string());
        excluded.push(network.broadcast().to_string());
    }
    excluded.push(Ipv4Addr::BROADCAST.to_string());
    for addr in extra {
        if !excluded.contains(addr) {
            excluded.push(addr.clone());
        }
    }
    excluded
}
