//! Test nameservers and capturing sinks.

use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
    sync::Mutex,
    time::Duration,
};

use hickory_resolver::proto::{
    op::{Message, MessageType, ResponseCode},
    rr::{RData, Record},
    serialize::binary::BinDecodable,
};
use tokio::{net::UdpSocket, sync::oneshot, time};
use tracing::{debug, error};

use crate::metrics::{ProbeLabels, ProbeSink};

/// Behavior of a test nameserver.
#[derive(Debug, Clone, Copy)]
pub enum Responder {
    /// Answer every query with an A record for this address.
    Answer(Ipv4Addr),
    /// Answer after waiting, to simulate a slow nameserver.
    AnswerAfter(Ipv4Addr, Duration),
    /// Reply to every query with SERVFAIL.
    Fail,
    /// Never reply.
    Ignore,
}

/// Stops the test nameserver when dropped.
#[derive(Debug)]
pub struct ServerGuard(#[allow(dead_code)] oneshot::Sender<()>);

/// Run a UDP nameserver on localhost that answers according to `responder`.
pub async fn run_dns_server(responder: Responder) -> io::Result<(SocketAddr, ServerGuard)> {
    let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await?;
    let addr = socket.local_addr()?;
    let (tx, mut rx) = oneshot::channel();
    tokio::task::spawn(async move {
        tokio::select! {
            _ = &mut rx => {
                debug!("test nameserver stopped");
            }
            res = serve(socket, responder) => {
                if let Err(err) = res {
                    error!("test nameserver failed: {err}");
                }
            }
        }
    });
    Ok((addr, ServerGuard(tx)))
}

async fn serve(socket: UdpSocket, responder: Responder) -> io::Result<()> {
    let mut buf = [0u8; 1400];
    loop {
        let (len, from) = socket.recv_from(&mut buf).await?;
        let query = Message::from_bytes(&buf[..len])?;
        debug!(queries = ?query.queries(), %from, "received query");
        let mut reply = query.clone();
        reply.set_message_type(MessageType::Response);
        match responder {
            Responder::Answer(ip) => answer(&query, &mut reply, ip),
            Responder::AnswerAfter(ip, delay) => {
                time::sleep(delay).await;
                answer(&query, &mut reply, ip);
            }
            Responder::Fail => {
                reply.set_response_code(ResponseCode::ServFail);
            }
            Responder::Ignore => {
                debug!(%from, "dropping query");
                continue;
            }
        }
        let reply = reply.to_vec()?;
        socket.send_to(&reply, from).await?;
    }
}

fn answer(query: &Message, reply: &mut Message, ip: Ipv4Addr) {
    for query in query.queries() {
        let record = Record::from_rdata(query.name().clone(), 300, RData::A(ip.into()));
        reply.add_answer(record);
    }
}

/// What a sink was told about one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A successful lookup with its duration.
    Lookup(Duration),
    /// A failed lookup.
    Failure,
}

/// A [`ProbeSink`] that stores every outcome in the order it was recorded.
#[derive(Debug, Default)]
pub struct RecordingSink {
    outcomes: Mutex<Vec<(ProbeLabels, Outcome)>>,
}

impl RecordingSink {
    /// All outcomes recorded so far, oldest first.
    pub fn outcomes(&self) -> Vec<(ProbeLabels, Outcome)> {
        self.outcomes.lock().expect("poisoned").clone()
    }

    /// Durations of the successful lookups recorded for `dns_server`.
    pub fn lookups(&self, dns_server: &str) -> Vec<Duration> {
        self.outcomes()
            .into_iter()
            .filter_map(|(labels, outcome)| match outcome {
                Outcome::Lookup(duration) if labels.dns_server == dns_server => Some(duration),
                _ => None,
            })
            .collect()
    }

    /// Number of failures recorded for `dns_server`.
    pub fn failures(&self, dns_server: &str) -> usize {
        self.outcomes()
            .iter()
            .filter(|(labels, outcome)| {
                *outcome == Outcome::Failure && labels.dns_server == dns_server
            })
            .count()
    }
}

impl ProbeSink for RecordingSink {
    fn record_lookup(&self, labels: &ProbeLabels, duration: Duration) {
        self.outcomes
            .lock()
            .expect("poisoned")
            .push((labels.clone(), Outcome::Lookup(duration)));
    }

    fn record_failure(&self, labels: &ProbeLabels) {
        self.outcomes
            .lock()
            .expect("poisoned")
            .push((labels.clone(), Outcome::Failure));
    }
}
