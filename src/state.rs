//! Shared state for the HTTP server

use std::sync::Arc;

use prometheus_client::registry::Registry;

/// The shared app state.
#[derive(Clone)]
pub struct AppState {
    /// Registry holding the probe metrics, rendered by the metrics endpoint.
    pub registry: Arc<Registry>,
}
