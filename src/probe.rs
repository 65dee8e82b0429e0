//! The measurement loop

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::time::{self, Instant};
use tokio_util::{sync::CancellationToken, task::AbortOnDropHandle};
use tracing::{Instrument, debug, error, info_span};

use crate::{
    config::{Config, Nameserver},
    metrics::{ProbeLabels, ProbeSink},
    resolver::nameserver_resolver,
};

/// Periodically measures DNS lookup latency against a set of nameservers.
///
/// Every pass probes the nameservers sequentially, in configured order, with
/// a fresh resolver per lookup. A successful lookup stores its duration in
/// the sink, a failed one counts as an error for that nameserver and does not
/// affect the rest of the pass. The first pass starts immediately on spawn,
/// every further pass a full interval after the previous one finished.
pub struct Prober {
    hostname: String,
    host: String,
    nameservers: Vec<Nameserver>,
    timeout: Duration,
    interval: Duration,
    sink: Arc<dyn ProbeSink>,
}

impl Prober {
    /// Create a prober from the config.
    ///
    /// `host` is the identity of the probing machine, used as a metric label.
    /// Fails if the configured DNS server list does not validate.
    pub fn new(config: &Config, host: String, sink: Arc<dyn ProbeSink>) -> Result<Self> {
        let nameservers = config.nameservers()?;
        Ok(Self {
            hostname: config.hostname.clone(),
            host,
            nameservers,
            timeout: config.lookup_timeout(),
            interval: config.probe_interval(),
            sink,
        })
    }

    /// Spawn the measurement loop as a background task.
    pub fn spawn(self) -> ProberHandle {
        let cancel = CancellationToken::new();
        let cancel_loop = cancel.clone();
        let task = tokio::task::spawn(
            async move { self.run(cancel_loop).await }.instrument(info_span!("prober")),
        );
        ProberHandle {
            cancel,
            handle: AbortOnDropHandle::new(task),
        }
    }

    // The idle sleep starts only once the pass is done, a slow pass stretches
    // the period and never shortens the idle time.
    async fn run(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.run_once() => {}
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = time::sleep(self.interval) => {}
            }
        }
        debug!("prober stopped");
    }

    /// Probe every nameserver once, in configured order.
    pub async fn run_once(&self) {
        for ns in &self.nameservers {
            let labels = ProbeLabels {
                host: self.host.clone(),
                url: self.hostname.clone(),
                dns_server: ns.label.clone(),
            };
            match self.probe(ns).await {
                Ok(elapsed) => {
                    debug!(dns_server = %ns.label, ?elapsed, "lookup succeeded");
                    self.sink.record_lookup(&labels, elapsed);
                }
                Err(err) => {
                    error!(dns_server = %ns.label, "failed to perform DNS lookup: {err:#}");
                    self.sink.record_failure(&labels);
                }
            }
        }
    }

    /// Time a single lookup against one nameserver.
    ///
    /// The resolver carries the timeout as well, but the outer timeout bounds
    /// the lookup as a whole.
    async fn probe(&self, ns: &Nameserver) -> Result<Duration> {
        let resolver = nameserver_resolver(ns.addr, self.timeout);
        let start = Instant::now();
        time::timeout(self.timeout, resolver.lookup_ip(self.hostname.as_str())).await??;
        Ok(start.elapsed())
    }
}

/// Handle to a running [`Prober`] task.
///
/// Dropping the handle aborts the task.
#[derive(Debug)]
pub struct ProberHandle {
    cancel: CancellationToken,
    handle: AbortOnDropHandle<()>,
}

impl ProberHandle {
    /// Stop the measurement loop and wait for the task to finish.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        self.handle.await?;
        Ok(())
    }
}
