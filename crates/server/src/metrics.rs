//! Prometheus metrics (§4.11): connections, per-type message counts, STT
//! transcript latency, and cancellations by source.
//!
//! The TTS job, reasoning backend, and ordering-gate drain latency
//! histograms are recorded where they're actually measured, inside
//! `voice-agent-pipeline` (`tts/pool.rs`, `reply_pipeline.rs`) — the global
//! `metrics` recorder this module installs in `init_metrics` is what those
//! call sites report into, so the series still show up on `/metrics`
//! without the pipeline crate depending on this one.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Installs the global Prometheus recorder. Must be called exactly once,
/// before any `record_*` call, typically at process startup.
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    let _ = HANDLE.set(handle.clone());
    handle
}

/// Renders the current snapshot for the `/metrics` route. Returns an empty
/// body if `init_metrics` was never called (e.g. in unit tests).
pub fn render() -> String {
    HANDLE.get().map(|h| h.render()).unwrap_or_default()
}

pub fn record_connection_opened() {
    metrics::counter!("voice_agent_connections_opened_total").increment(1);
}

pub fn record_message_received(message_type: &str) {
    metrics::counter!("voice_agent_messages_received_total", "type" => message_type.to_string())
        .increment(1);
}

pub fn record_stt_latency_seconds(seconds: f64) {
    metrics::histogram!("voice_agent_stt_latency_seconds").record(seconds);
}

pub fn record_cancellation(source: &str) {
    metrics::counter!("voice_agent_cancellations_total", "source" => source.to_string())
        .increment(1);
}

pub fn record_error(kind: &str) {
    metrics::counter!("voice_agent_errors_total", "kind" => kind.to_string()).increment(1);
}
