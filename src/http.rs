//! HTTP server exposing the metrics

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use tokio::{net::TcpListener, task::JoinSet};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::state::AppState;

/// The HTTP server half of the prober.
pub struct HttpServer {
    tasks: JoinSet<std::io::Result<()>>,
    addr: SocketAddr,
}

impl HttpServer {
    /// Bind the listener and spawn the serve task.
    pub async fn spawn(bind_addr: SocketAddr, state: AppState) -> Result<HttpServer> {
        let app = create_app(state);
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("failed to bind to {bind_addr}"))?;
        let addr = listener.local_addr()?;
        let mut tasks = JoinSet::new();
        tasks.spawn(async move { axum::serve(listener, app).await });
        info!("HTTP server listening on {addr}");
        Ok(HttpServer { tasks, addr })
    }

    /// Get the bound address of the HTTP socket.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shutdown the server and wait for all tasks to complete.
    pub async fn shutdown(mut self) -> Result<()> {
        self.tasks.abort_all();
        self.run_until_done().await?;
        Ok(())
    }

    /// Wait for all tasks to complete.
    ///
    /// Runs forever unless tasks fail.
    pub async fn run_until_done(mut self) -> Result<()> {
        let mut final_res: anyhow::Result<()> = Ok(());
        while let Some(res) = self.tasks.join_next().await {
            match res {
                Ok(Ok(())) => {}
                Err(err) if err.is_cancelled() => {}
                Ok(Err(err)) => {
                    warn!(?err, "task failed");
                    final_res = Err(anyhow::Error::from(err));
                }
                Err(err) => {
                    warn!(?err, "task panicked");
                    final_res = Err(err.into());
                }
            }
        }
        final_res
    }
}

fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::permanent("/metrics") }))
        .route("/metrics", get(metrics))
        .route("/healthcheck", get(|| async { "OK" }))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Render the registry in the prometheus text format.
async fn metrics(State(state): State<AppState>) -> Response {
    let mut buf = String::new();
    match encode(&mut buf, &state.registry) {
        Ok(()) => ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], buf).into_response(),
        Err(err) => {
            warn!("failed to encode metrics: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
