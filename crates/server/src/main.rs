//! Process entry point: loads settings, wires up observability, optional
//! ScyllaDB-backed sessions and Qdrant-backed retrieval, and serves the
//! gateway until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;

use voice_agent_config::Settings;
use voice_agent_server::state::{build_retriever, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("VOICE_AGENT_ENV").ok();
    let config = match voice_agent_config::load_settings(env.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration ({e}); falling back to defaults");
            Settings::default()
        }
    };

    init_tracing(&config);

    tracing::info!(
        environment = ?config.environment,
        port = config.server.port,
        "starting voice agent gateway"
    );

    if config.observability.metrics_enabled {
        voice_agent_server::metrics::init_metrics();
    }

    let mut state = AppState::new(config.clone())?.with_env(env.clone());

    if config.persistence.enabled {
        match init_persistence(&config).await {
            Ok(store) => {
                state = state.with_session_store(store);
                tracing::info!("scylla-backed session store ready");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to initialize scylla session store; falling back to in-memory sessions");
            }
        }
    }

    if config.rag.enabled {
        if let Some(retriever) = build_retriever(&config) {
            state = state.with_retriever(retriever);
            tracing::info!("document retrieval ready");
        } else {
            tracing::warn!("rag is enabled but the vector store could not be constructed; document mode will retrieve no passages");
        }
    }

    let app = voice_agent_server::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn init_persistence(
    config: &Settings,
) -> Result<Arc<dyn voice_agent_core::SessionStore>, voice_agent_persistence::PersistenceError> {
    let scylla_config = voice_agent_persistence::ScyllaConfig::from(&config.persistence);
    let ttl = chrono::Duration::hours(config.session.ttl_hours);
    let store = voice_agent_persistence::init(scylla_config, ttl, config.session.history_cap).await?;
    Ok(Arc::new(store))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

#[cfg(feature = "telemetry")]
fn init_tracing(config: &Settings) {
    use opentelemetry::trace::TracerProvider as _;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let env_filter = EnvFilter::try_new(&config.observability.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    if let Some(otlp_endpoint) = &config.observability.otlp_endpoint {
        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(otlp_endpoint);

        match opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(exporter)
            .install_batch(opentelemetry_sdk::runtime::Tokio)
        {
            Ok(provider) => {
                let tracer = provider.tracer("voice-agent-server");
                let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
                registry.with(fmt_layer).with(otel_layer).init();
                return;
            }
            Err(e) => {
                eprintln!("failed to install OpenTelemetry pipeline ({e}); continuing with plain logging");
            }
        }
    }

    registry.with(fmt_layer).init();
}

#[cfg(not(feature = "telemetry"))]
fn init_tracing(config: &Settings) {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_new(&config.observability.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);

    if config.observability.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}
