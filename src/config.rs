//! Configuration for the prober

use std::{
    net::{IpAddr, SocketAddr},
    path::Path,
    str::FromStr,
    time::Duration,
};

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

/// Port used for DNS server entries that do not carry one.
const DNS_PORT: u16 = 53;

/// Prober configuration
///
/// The config is usually read from a TOML file with [`Self::read_from_file`].
/// Every field has a default, so an empty file yields the same config as
/// [`Default`]. The default DNS server list is empty and fails validation,
/// servers always have to be configured explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Port the metrics endpoint listens on.
    #[serde(default = "defaults::port")]
    pub port: u16,
    /// Timeout for a single DNS lookup, in seconds.
    #[serde(default = "defaults::timeout")]
    pub timeout: u64,
    /// Minutes between two measurement passes.
    #[serde(default = "defaults::interval")]
    pub interval: u64,
    /// The hostname to look up.
    #[serde(default = "defaults::hostname")]
    pub hostname: String,
    /// The DNS servers to probe.
    ///
    /// Entries are IP addresses with an optional port, port 53 is used when
    /// none is given. The list must not be empty.
    #[serde(default)]
    pub dns_servers: Vec<String>,
}

/// Defaults for fields of [`Config`].
///
/// These are the defaults that serde will fill in.
mod defaults {
    pub(crate) fn port() -> u16 {
        8080
    }

    pub(crate) fn timeout() -> u64 {
        5
    }

    pub(crate) fn interval() -> u64 {
        15
    }

    pub(crate) fn hostname() -> String {
        "google.com".to_string()
    }
}

impl Config {
    /// Parse the config from a TOML string.
    pub fn from_str(config: &str) -> Result<Self> {
        toml::from_str(config).context("config must be valid toml")
    }

    /// Read the config from a TOML file.
    pub async fn read_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("failed to read {}", path.as_ref().display()))?;
        Self::from_str(&s)
    }

    /// Timeout applied to each individual lookup.
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Time between the start of two measurement passes.
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.interval * 60)
    }

    /// Parse and validate the configured DNS server list.
    ///
    /// Fails if the list is empty or contains an entry that is not an IP
    /// address with an optional port.
    pub fn nameservers(&self) -> Result<Vec<Nameserver>> {
        if self.dns_servers.is_empty() {
            bail!("no DNS servers configured");
        }
        self.dns_servers.iter().map(|s| s.parse()).collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: defaults::port(),
            timeout: defaults::timeout(),
            interval: defaults::interval(),
            hostname: defaults::hostname(),
            dns_servers: Vec::new(),
        }
    }
}

/// A DNS server to probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nameserver {
    /// The server as configured. Used as the metric label.
    pub label: String,
    /// The address queries are sent to.
    pub addr: SocketAddr,
}

impl FromStr for Nameserver {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let addr = match s.parse::<SocketAddr>() {
            Ok(addr) => addr,
            Err(_) => {
                let ip = s
                    .parse::<IpAddr>()
                    .map_err(|_| anyhow!("invalid DNS server address: {s:?}"))?;
                SocketAddr::new(ip, DNS_PORT)
            }
        };
        Ok(Self {
            label: s.to_string(),
            addr,
        })
    }
}
