use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::future::Future;
use std::pin::Pin;

use crate::mac::normalize_mac;

pub type LinesFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + 'a>>;

/// Source of raw neighbor-table lines, e.g. the output of `arp -an`.
pub trait NeighborSource: Send + Sync {
    fn neighbor_lines(&self) -> LinesFuture<'_>;
}

/// `(ip) ... mac`, where the MAC octets may mix `:` and `-`.
static ARP_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(([\d.]+)\).*?((?:[0-9a-fA-F]{1,2}[:\-]){5}[0-9a-fA-F]{1,2})")
        .expect("ARP line pattern is valid")
});

/// An IP/MAC pair read from the neighbor table. `mac` is canonical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbor {
    pub ip: String,
    pub mac: String,
}

pub fn parse_neighbor_line(line: &str) -> Option<Neighbor> {
    let caps = ARP_LINE.captures(line)?;
    let ip = caps.get(1)?.as_str().to_string();
    let mac = normalize_mac(&caps.get(2)?.as_str().replace('-', ":"));
    Some(Neighbor { ip, mac })
}

pub fn parse_neighbor_lines<S: AsRef<str>>(lines: &[S]) -> Vec<Neighbor> {
    lines
        .iter()
        .map(AsRef::as_ref)
        .filter(|line| !line.trim().is_empty())
        .filter_map(parse_neighbor_line)
        .collect()
}

/// Runs `arp -an` and drops multicast, broadcast and incomplete entries.
#[derive(Debug, Clone)]
pub struct ArpCommand {
    excluded: Vec<String>,
}

impl ArpCommand {
    pub fn new(excluded: Vec<String>) -> Self {
        Self { excluded }
    }

    fn keep(&self, line: &str) -> bool {
        if line.contains("incomplete") {
            return false;
        }
        // Match "(addr)" so 192.168.1.1 does not exclude 192.168.1.10.
        !self
            .excluded
            .iter()
            .any(|addr| line.contains(&format!("({})", addr)))
    }

    pub fn filter_output(&self, output: &str) -> Vec<String> {
        output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter(|line| self.keep(line))
            .map(str::to_string)
            .collect()
    }

    async fn run(&self) -> Result<Vec<String>> {
        let output = tokio::process::Command::new("arp")
            .arg("-an")
            .output()
            .await
            .context("failed to run arp")?;

        if !output.status.success() && output.stdout.is_empty() {
            bail!(
                "arp exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(self.filter_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl NeighborSource for ArpCommand {
    fn neighbor_lines(&self) -> LinesFuture<'_> {
        Box::pin(self.run())
    }
}
