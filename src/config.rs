//! Runtime configuration: compiled-in defaults, overridable through `NDD_*` environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Directory holding the persisted CSV files
pub const DEFAULT_CACHE_DIR: &str = "cache";

/// Backups kept per persisted file
pub const BACKUP_GENERATIONS: usize = 5;

/// Upper bound on a single liveness probe
pub const PING_TIMEOUT: Duration = Duration::from_millis(1000);

pub const DEVICE_NAMES_FILE: &str = "device_names.csv";
pub const MAC_IP_CACHE_FILE: &str = "mac_ipaddress.csv";
pub const LAST_DETECTED_FILE: &str = "last_detected.csv";
pub const DEVICE_ICONS_FILE: &str = "device_icons.csv";
pub const OUI_DB_FILE: &str = "oui.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingMode {
    Command,
    Icmp,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub cache_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub backup_generations: usize,
    pub oui_file: PathBuf,
    pub ping_timeout: Duration,
    pub ping_mode: PingMode,
    pub arp_exclude: Vec<String>,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        let cache_dir = cache_dir.into();
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            backup_dir: cache_dir.join("backup"),
            oui_file: cache_dir.join(OUI_DB_FILE),
            cache_dir,
            backup_generations: BACKUP_GENERATIONS,
            ping_timeout: PING_TIMEOUT,
            ping_mode: PingMode::Command,
            arp_exclude: Vec::new(),
            log_dir: None,
        }
    }

    pub fn from_env() -> Self {
        let cache_dir = env_var("NDD_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));
        let mut config = Self::with_cache_dir(cache_dir);

        let listen = env_var("NDD_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        match listen.parse() {
            Ok(addr) => config.listen_addr = addr,
            Err(e) => tracing::warn!("Ignoring NDD_LISTEN_ADDR={:?}: {}", listen, e),
        }

        if let Some(dir) = env_var("NDD_BACKUP_DIR") {
            config.backup_dir = PathBuf::from(dir);
        }
        if let Some(file) = env_var("NDD_OUI_FILE") {
            config.oui_file = PathBuf::from(file);
        }
        config.backup_generations =
            env_parse_usize("NDD_BACKUP_GENERATIONS", BACKUP_GENERATIONS, 1, 100);
        config.ping_timeout = Duration::from_millis(env_parse_u64(
            "NDD_PING_TIMEOUT_MS",
            PING_TIMEOUT.as_millis() as u64,
            100,
            10_000,
        ));
        config.ping_mode = match env_var("NDD_PING_MODE").map(|v| v.to_ascii_lowercase()) {
            Some(mode) if mode == "icmp" => PingMode::Icmp,
            _ => PingMode::Command,
        };
        config.arp_exclude = env_var("NDD_ARP_EXCLUDE")
            .map(|list| split_list(&list))
            .unwrap_or_default();
        config.log_dir = env_var("NDD_LOG_DIR").map(PathBuf::from);

        config
    }

    pub fn device_names_path(&self) -> PathBuf {
        self.cache_dir.join(DEVICE_NAMES_FILE)
    }

    pub fn ip_cache_path(&self) -> PathBuf {
        self.cache_dir.join(MAC_IP_CACHE_FILE)
    }

    pub fn last_detected_path(&self) -> PathBuf {
        self.cache_dir.join(LAST_DETECTED_FILE)
    }

    pub fn device_icons_path(&self) -> PathBuf {
        self.cache_dir.join(DEVICE_ICONS_FILE)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse_u64(name: &str, default: u64, min: u64, max: u64) -> u64 {
    match env_var(name).and_then(|v| v.parse::<u64>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}

fn env_parse_usize(name: &str, default: usize, min: usize, max: usize) -> usize {
    match env_var(name).and_then(|v| v.parse::<usize>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
