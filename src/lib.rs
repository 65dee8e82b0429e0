//! A DNS lookup latency prober with a prometheus metrics endpoint

#![deny(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod http;
pub mod metrics;
pub mod probe;
pub mod resolver;
pub mod server;
pub mod state;

#[cfg(test)]
mod test_utils;
