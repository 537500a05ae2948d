use anyhow::{anyhow, Context, Result};
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// One echo request, bounded wait, boolean answer.
pub trait Pinger: Send + Sync {
    fn probe<'a>(&'a self, ip: &'a str) -> ProbeFuture<'a>;
}

const SUCCESS_MARKERS: &[&str] = &["1 packets received", "1 received", "bytes from"];

/// Shells out to the platform `ping`.
#[derive(Debug, Clone)]
pub struct CommandPinger {
    timeout: Duration,
}

impl CommandPinger {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn command(&self, ip: &str) -> Command {
        let mut cmd = Command::new("ping");
        if cfg!(windows) {
            let wait_ms = self.timeout.as_millis().to_string();
            cmd.args(["-n", "1", "-w", wait_ms.as_str(), ip]);
        } else {
            let wait_secs = self.timeout.as_secs().max(1).to_string();
            cmd.args(["-c", "1", "-W", wait_secs.as_str(), ip]);
        }
        cmd.kill_on_drop(true);
        cmd
    }

    async fn run(&self, ip: &str) -> Result<String> {
        // The ping's own -W/-w is not a hard limit everywhere.
        let ceiling = self.timeout + Duration::from_secs(1);
        let output = tokio::time::timeout(ceiling, self.command(ip).output())
            .await
            .map_err(|_| anyhow!("ping {} exceeded {:?}", ip, ceiling))?
            .context("failed to spawn ping")?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(text)
    }
}

impl Pinger for CommandPinger {
    fn probe<'a>(&'a self, ip: &'a str) -> ProbeFuture<'a> {
        Box::pin(async move {
            if ip.is_empty() {
                return false;
            }
            match self.run(ip).await {
                Ok(output) => reports_alive(&output),
                Err(e) => {
                    tracing::warn!("Ping {} failed: {:#}", ip, e);
                    false
                }
            }
        })
    }
}

pub fn reports_alive(output: &str) -> bool {
    if SUCCESS_MARKERS.iter().any(|marker| output.contains(marker)) {
        return true;
    }
    // Windows answers "Reply from <gateway>: Destination host unreachable" for dead hosts.
    output
        .lines()
        .any(|line| line.contains("Reply from") && !line.contains("unreachable"))
}

/// Raw-socket ICMP echo. Needs CAP_NET_RAW or administrator rights.
pub struct IcmpPinger {
    pinger: tokio_icmp_echo::Pinger,
    timeout: Duration,
}

impl IcmpPinger {
    pub async fn new(timeout: Duration) -> Result<Self> {
        let pinger = tokio_icmp_echo::Pinger::new()
            .await
            .map_err(|e| anyhow!("failed to open ICMP socket: {:?}", e))?;
        Ok(Self { pinger, timeout })
    }
}

impl Pinger for IcmpPinger {
    fn probe<'a>(&'a self, ip: &'a str) -> ProbeFuture<'a> {
        Box::pin(async move {
            let addr: IpAddr = match ip.parse() {
                Ok(addr) => addr,
                Err(_) => {
                    if !ip.is_empty() {
                        tracing::debug!("Not pinging unparseable address {:?}", ip);
                    }
                    return false;
                }
            };
            let ident = rand::random::<u16>();
            match self.pinger.ping(addr, ident, 0, self.timeout).await {
                Ok(reply) => reply.is_some(),
                Err(e) => {
                    tracing::warn!("ICMP echo to {} failed: {:?}", ip, e);
                    false
                }
            }
        })
    }
}

/// Raw ICMP when asked for and available, otherwise the ping command.
pub async fn build_pinger(prefer_icmp: bool, timeout: Duration) -> Arc<dyn Pinger> {
    if prefer_icmp {
        match IcmpPinger::new(timeout).await {
            Ok(pinger) => return Arc::new(pinger),
            Err(e) => tracing::warn!("{:#}; falling back to the ping command", e),
        }
    }
    Arc::new(CommandPinger::new(timeout))
}
