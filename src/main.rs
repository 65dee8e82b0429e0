use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use dns_prober::{config::Config, server::run_with_config_until_ctrl_c};
use tracing::debug;
use tracing_subscriber::{EnvFilter, prelude::*};

/// Measure DNS lookup latency and expose the results as prometheus metrics.
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Cli {
    /// Path to config file
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Port for the metrics endpoint
    #[clap(short, long, env = "PORT")]
    port: Option<u16>,
    /// Timeout for a single DNS lookup, in seconds
    #[clap(short, long, env = "TIMEOUT")]
    timeout: Option<u64>,
    /// Minutes between two measurement passes
    #[clap(short, long, env = "INTERVAL")]
    interval: Option<u64>,
    /// Hostname to look up
    #[clap(short = 'n', long = "name", env = "LOOKUP_HOSTNAME")]
    hostname: Option<String>,
    /// DNS server to probe, may be given multiple times
    #[clap(
        short = 'd',
        long = "dns-server",
        env = "DNS_ADDRESS",
        value_delimiter = ' '
    )]
    dns_servers: Option<Vec<String>>,
}

impl Cli {
    /// Override config file values with anything set on the command line or
    /// through the environment.
    fn apply(self, config: &mut Config) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(interval) = self.interval {
            config.interval = interval;
        }
        if let Some(hostname) = self.hostname {
            config.hostname = hostname;
        }
        if let Some(dns_servers) = self.dns_servers {
            config.dns_servers = dns_servers;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();
    let args = Cli::parse();

    let mut config = match &args.config {
        Some(path) => {
            debug!("loading config from {}", path.display());
            Config::read_from_file(path).await?
        }
        None => {
            debug!("using default config");
            Config::default()
        }
    };
    args.apply(&mut config);

    run_with_config_until_ctrl_c(config).await
}
