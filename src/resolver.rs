//! Construction of per-nameserver resolvers

use std::{net::SocketAddr, time::Duration};

use hickory_resolver::{
    Resolver, TokioResolver,
    config::{LookupIpStrategy, NameServerConfig, ResolveHosts, ResolverConfig, ResolverOpts},
    name_server::TokioConnectionProvider,
    proto::xfer::Protocol,
};

/// Build a resolver that sends every query to a single nameserver over UDP.
///
/// The host's resolver configuration, the hosts file, caching and
/// retransmissions are all disabled, so one lookup corresponds to one
/// question on the wire, bounded by `timeout`. Connectivity problems do not
/// surface here but as errors of the lookup itself.
pub fn nameserver_resolver(nameserver: SocketAddr, timeout: Duration) -> TokioResolver {
    let mut config = ResolverConfig::new();
    config.add_name_server(NameServerConfig::new(nameserver, Protocol::Udp));

    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    // no retries, a probe is exactly one query
    opts.attempts = 0;
    opts.cache_size = 0;
    opts.use_hosts_file = ResolveHosts::Never;
    // either address family satisfies a probe
    opts.ip_strategy = LookupIpStrategy::Ipv4thenIpv6;

    Resolver::builder_with_config(config, TokioConnectionProvider::default())
        .with_options(opts)
        .build()
}
