use crate::server::ServerState;
use axum::{response::Json, routing::get, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

/// Service info response, served at `/`.
#[derive(Serialize)]
struct InfoResponse {
    service: &'static str,
    version: &'static str,
    connected_clients: usize,
}

/// Liveness response, served at `/health`.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    clients: usize,
}

/// Serve the read-only probes (`/`, `/health`) and the Prometheus
/// scrape endpoint (`/metrics`) on a separate listener.
///
/// # Errors
///
/// Returns an error if installing the metrics recorder or binding the
/// probe HTTP server fails.
pub async fn start_probe_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    let info_state = Arc::clone(&state);
    let app = Router::new()
        .route("/", get(move || info_handler(Arc::clone(&info_state))))
        .route("/health", get(move || health_handler(Arc::clone(&state))))
        .route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("probe server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Info handler - reports the count of live registered connections.
async fn info_handler(state: Arc<ServerState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        service: "E2EE Signaling Relay",
        version: env!("CARGO_PKG_VERSION"),
        connected_clients: state.registry.len(),
    })
}

/// Liveness handler - returns 200 while the process is serving.
async fn health_handler(state: Arc<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        clients: state.registry.len(),
    })
}

/// Connection count gauges.
pub mod gauges {
    /// Increment the active connections gauge.
    pub fn inc_connections_active() {
        metrics::gauge!("relay_connections_active").increment(1.0);
    }

    /// Decrement the active connections gauge.
    pub fn dec_connections_active() {
        metrics::gauge!("relay_connections_active").decrement(1.0);
    }
}

/// Event counters.
pub mod counters {
    /// Increment the registrations counter.
    pub fn registrations_total() {
        metrics::counter!("relay_registrations_total").increment(1);
    }

    /// Increment the relayed-frames counter with the given kind label.
    pub fn frames_relayed_total(kind: &'static str) {
        metrics::counter!("relay_frames_relayed_total", "kind" => kind).increment(1);
    }

    /// Increment the dropped-frames counter with the given reason label.
    pub fn frames_dropped_total(reason: &'static str) {
        metrics::counter!("relay_frames_dropped_total", "reason" => reason).increment(1);
    }

    /// Increment the counter of connections evicted on failed sends.
    pub fn connections_evicted_total() {
        metrics::counter!("relay_connections_evicted_total").increment(1);
    }
}

/// Latency histograms.
pub mod histograms {
    /// Record a frame dispatch latency observation in seconds.
    pub fn dispatch_seconds(value: f64) {
        metrics::histogram!("relay_dispatch_seconds").record(value);
    }
}
