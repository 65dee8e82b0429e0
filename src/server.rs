//! The main server which combines the prober and the HTTP server.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use anyhow::{Context, Result};
use prometheus_client::registry::Registry;
use tracing::{error, info};

use crate::{
    config::Config,
    http::HttpServer,
    metrics::Metrics,
    probe::{Prober, ProberHandle},
    state::AppState,
};

/// Spawn the server and run until the `Ctrl-C` signal is received, then shutdown.
pub async fn run_with_config_until_ctrl_c(config: Config) -> Result<()> {
    let server = Server::spawn(config).await?;
    tokio::signal::ctrl_c().await?;
    info!("shutdown");
    server.shutdown().await?;
    Ok(())
}

/// The DNS prober with its metrics endpoint.
pub struct Server {
    prober: ProberHandle,
    http_server: Option<HttpServer>,
}

impl Server {
    /// Spawn the server.
    ///
    /// This starts the measurement loop and the HTTP server serving the
    /// collected metrics. Determining the local hostname or validating the
    /// DNS server list can fail, a failure to bind the HTTP listener is only
    /// logged and leaves the measurement loop running.
    pub async fn spawn(config: Config) -> Result<Self> {
        Self::spawn_inner(config, IpAddr::V4(Ipv4Addr::UNSPECIFIED)).await
    }

    async fn spawn_inner(config: Config, bind_ip: IpAddr) -> Result<Self> {
        let host = local_hostname()?;
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        let prober = Prober::new(&config, host, Arc::new(metrics))?.spawn();

        let bind_addr = SocketAddr::from((bind_ip, config.port));
        let state = AppState {
            registry: Arc::new(registry),
        };
        let http_server = match HttpServer::spawn(bind_addr, state).await {
            Ok(http_server) => Some(http_server),
            Err(err) => {
                error!("failed to start HTTP server: {err:#}");
                None
            }
        };

        info!(
            interval_minutes = config.interval,
            port = config.port,
            "server started"
        );
        Ok(Self {
            prober,
            http_server,
        })
    }

    /// Cancel the server tasks and wait for all tasks to complete.
    pub async fn shutdown(self) -> Result<()> {
        self.prober.shutdown().await?;
        if let Some(http_server) = self.http_server {
            http_server.shutdown().await?;
        }
        Ok(())
    }

    /// Spawn a server suitable for testing, with the HTTP server bound to a
    /// random port on localhost.
    ///
    /// Returns the server handle and the base [`url::Url`] of the HTTP server.
    #[cfg(test)]
    pub async fn spawn_for_tests(mut config: Config) -> Result<(Self, url::Url)> {
        config.port = 0;
        let server = Self::spawn_inner(config, IpAddr::V4(Ipv4Addr::LOCALHOST)).await?;
        let http_server = server
            .http_server
            .as_ref()
            .context("HTTP server did not start")?;
        let url = format!("http://127.0.0.1:{}", http_server.addr().port()).parse()?;
        Ok((server, url))
    }
}

/// Hostname of the machine we are running on.
///
/// Only used as the `host` label on the metrics.
fn local_hostname() -> Result<String> {
    let hostname = hostname::get().context("failed to read the local hostname")?;
    Ok(hostname.to_string_lossy().into_owned())
}
