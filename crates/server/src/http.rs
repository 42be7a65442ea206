//! Admin HTTP surface (§4.11, §6): health, readiness, Prometheus metrics,
//! and a config hot-reload trigger. Deliberately minimal — no document
//! ingestion, session CRUD, or tool registration endpoints exist here.

use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::websocket::ws_handler;

const READINESS_PROBE_SESSION_ID: &str = "__readiness_probe__";

pub fn create_router(state: AppState) -> Router {
    let config = state.get_config();
    let cors = build_cors_layer(&config.server.cors_origins, config.server.cors_enabled);

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .route("/admin/reload-config", post(reload_config))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Builds the CORS layer from configured origins: permissive (with a
/// warning) if CORS is disabled outright, a localhost default if enabled
/// with no origins configured, or the explicit allowlist with credentials
/// otherwise.
pub fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled; accepting requests from any origin");
        return CorsLayer::permissive();
    }

    if origins.is_empty() {
        tracing::info!("no CORS origins configured; defaulting to http://localhost:3000");
        return CorsLayer::new()
            .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::error!(origin = %o, "failed to parse CORS origin, skipping");
                None
            }
        })
        .collect();

    if parsed.is_empty() {
        tracing::error!("no configured CORS origin parsed successfully; falling back to http://localhost:3000");
        return CorsLayer::new()
            .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any);
    }

    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(true)
}

async fn health_check() -> impl IntoResponse {
    Json(json!({"status": "healthy", "version": env!("CARGO_PKG_VERSION")}))
}

async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let session_ok = state
        .session_store
        .get_or_create(Some(READINESS_PROBE_SESSION_ID))
        .await
        .is_ok();

    let rag_configured = state.retriever.is_some();

    if session_ok {
        (
            StatusCode::OK,
            Json(json!({"status": "ready", "session_store": "ok", "rag_configured": rag_configured})),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "not_ready", "session_store": "unreachable"})),
        )
    }
}

async fn metrics_handler() -> impl IntoResponse {
    crate::metrics::render()
}

async fn reload_config(State(state): State<AppState>) -> impl IntoResponse {
    match state.reload_config() {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "reloaded"}))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status": "error", "message": e.to_string()})),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_agent_config::Settings;

    #[test]
    fn router_builds_from_default_settings() {
        let state = AppState::new(Settings::default()).expect("state should build from defaults");
        let _router = create_router(state);
    }

    #[test]
    fn disabled_cors_is_permissive() {
        let _layer = build_cors_layer(&[], false);
    }

    #[test]
    fn empty_origins_falls_back_to_localhost() {
        let _layer = build_cors_layer(&[], true);
    }
}
