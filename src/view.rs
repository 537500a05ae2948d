//! Merging of the live neighbor scan with the persisted name map and IP cache.

use crate::models::{is_registered, DeviceStatus, UNKNOWN_NAME};
use crate::scanner::Neighbor;
use crate::store::MacMap;
use chrono::{DateTime, Local};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// A device before liveness, vendor and icon are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedDevice {
    pub mac: String,
    pub ip: String,
    pub name: String,
    pub found_via_arp: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub devices: Vec<MergedDevice>,
    pub ip_cache: MacMap,
    pub last_seen: MacMap,
}

/// Folds a scan into the IP cache and last-seen map, then lists every known device in display order.
///
/// The scan is authoritative for IPs. Devices that were not seen keep their cached IP (or none).
pub fn merge_scan(
    scan: &[Neighbor],
    names: &MacMap,
    mut ip_cache: MacMap,
    mut last_seen: MacMap,
    now: i64,
) -> MergeOutcome {
    let mut devices: Vec<MergedDevice> = Vec::new();
    let mut listed: HashSet<String> = HashSet::new();

    for neighbor in scan {
        if ip_cache.get(&neighbor.mac) != Some(&neighbor.ip) {
            ip_cache.insert(neighbor.mac.clone(), neighbor.ip.clone());
        }
        last_seen.insert(neighbor.mac.clone(), now.to_string());

        let device = MergedDevice {
            mac: neighbor.mac.clone(),
            ip: neighbor.ip.clone(),
            name: name_for(names, &neighbor.mac),
            found_via_arp: true,
        };
        // A MAC listed twice in one scan keeps its last reported IP.
        if listed.insert(neighbor.mac.clone()) {
            devices.push(device);
        } else if let Some(existing) = devices.iter_mut().find(|d| d.mac == neighbor.mac) {
            *existing = device;
        }
    }

    for (mac, name) in names {
        if listed.insert(mac.clone()) {
            devices.push(MergedDevice {
                mac: mac.clone(),
                ip: ip_cache.get(mac).cloned().unwrap_or_default(),
                name: name.clone(),
                found_via_arp: false,
            });
        }
    }

    for (mac, ip) in &ip_cache {
        if listed.insert(mac.clone()) {
            devices.push(MergedDevice {
                mac: mac.clone(),
                ip: ip.clone(),
                name: UNKNOWN_NAME.to_string(),
                found_via_arp: false,
            });
        }
    }

    sort_devices(&mut devices);

    MergeOutcome {
        devices,
        ip_cache,
        last_seen,
    }
}

fn name_for(names: &MacMap, mac: &str) -> String {
    names
        .get(mac)
        .cloned()
        .unwrap_or_else(|| UNKNOWN_NAME.to_string())
}

fn ip_key(ip: &str) -> Option<u32> {
    ip.parse::<Ipv4Addr>().ok().map(u32::from)
}

/// Numeric IPv4 order; devices without a usable IP go last, ordered by MAC.
pub fn sort_devices(devices: &mut [MergedDevice]) {
    devices.sort_by(|a, b| match (ip_key(&a.ip), ip_key(&b.ip)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.mac.cmp(&b.mac)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.mac.cmp(&b.mac),
    });
}

/// Empty IP is never alive, whatever the probe would say.
pub fn classify(ip: &str, probe_alive: bool, name: &str) -> DeviceStatus {
    let alive = !ip.is_empty() && probe_alive;
    DeviceStatus::classify(alive, is_registered(name))
}

pub const NEVER_SEEN: &str = "never";

pub fn parse_last_seen(raw: Option<&String>) -> Option<i64> {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
}

pub fn format_last_seen(timestamp: Option<i64>) -> String {
    timestamp
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|utc| {
            utc.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| NEVER_SEEN.to_string())
}
