//! Shared application state (§3 "Settings", §9): one instance per process,
//! cloned (cheaply, via `Arc` fields) into every connection task.
//!
//! Trimmed down from the teacher's `AppState`, which also carried
//! text-processing, translation, audit-logging, and WebRTC fields that have
//! no counterpart here; what's left is exactly what a connection needs to
//! dispatch a reply: the reasoning backends per mode, the document
//! retriever, the TTS pool, the STT recognizer, and the session store.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use voice_agent_agent::{SqliteAgent, SqliteAgentConfig};
use voice_agent_config::{ConfigError, Settings};
use voice_agent_core::{DocumentRetriever, InMemorySessionStore, ReasoningBackend, SessionStore};
use voice_agent_llm::{GeneralReasoningBackend, OllamaBackend};
use voice_agent_pipeline::{HttpSpeechRecognizer, HttpSpeechSynthesizer, SpeechRecognizer, TtsPool};
use voice_agent_rag::{OllamaEmbedder, OllamaEmbeddingConfig, QdrantDocumentRetriever, RetrieverConfig, VectorStore, VectorStoreConfig};

const GENERAL_SYSTEM_PROMPT: &str =
    "You are a helpful, concise voice assistant. Keep replies short and conversational.";
const DOCUMENT_SYSTEM_PROMPT: &str =
    "You are a helpful voice assistant answering questions about a specific document. \
     Use only the provided passages; say you don't know if they don't cover the question.";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Settings>>,
    pub env: Option<String>,
    pub session_store: Arc<dyn SessionStore>,
    pub general_backend: Arc<dyn ReasoningBackend>,
    pub document_backend: Arc<dyn ReasoningBackend>,
    pub agent_backend: Arc<dyn ReasoningBackend>,
    pub retriever: Option<Arc<dyn DocumentRetriever>>,
    pub documents: Vec<String>,
    pub stt_recognizer: Arc<dyn SpeechRecognizer>,
    pub tts_pool_size: usize,
}

impl AppState {
    /// Builds state from settings using the default in-process wiring:
    /// in-memory sessions, a shared Ollama backend for general/document
    /// mode, and no document retriever (document mode answers with no
    /// retrieved context until `with_retriever` is called).
    pub fn new(config: Settings) -> Result<Self, ConfigError> {
        let llm_config = voice_agent_llm::LlmConfig {
            model: config.llm.model.clone(),
            endpoint: config.llm.endpoint.clone(),
            timeout: Duration::from_secs(config.llm.request_timeout_secs),
            ..Default::default()
        };
        let llm = Arc::new(OllamaBackend::new(llm_config).map_err(|e| ConfigError::InvalidValue {
            field: "llm".to_string(),
            message: e.to_string(),
        })?);

        let general_backend: Arc<dyn ReasoningBackend> =
            Arc::new(GeneralReasoningBackend::new(llm.clone(), GENERAL_SYSTEM_PROMPT));
        let document_backend: Arc<dyn ReasoningBackend> =
            Arc::new(GeneralReasoningBackend::new(llm, DOCUMENT_SYSTEM_PROMPT));

        let agent_llm_config = voice_agent_llm::LlmConfig {
            model: config.llm.model.clone(),
            endpoint: config.llm.endpoint.clone(),
            timeout: Duration::from_secs(config.llm.request_timeout_secs),
            ..Default::default()
        };
        let agent_llm = Arc::new(
            OllamaBackend::new(agent_llm_config).map_err(|e| ConfigError::InvalidValue {
                field: "llm".to_string(),
                message: e.to_string(),
            })?,
        );
        let agent_backend: Arc<dyn ReasoningBackend> = Arc::new(SqliteAgent::new(
            SqliteAgentConfig {
                db_path: config.agent.db_path.clone().into(),
                schema_description: config.agent.schema_description.clone(),
            },
            agent_llm,
        ));

        let stt_recognizer: Arc<dyn SpeechRecognizer> =
            Arc::new(HttpSpeechRecognizer::new(config.stt.endpoint.clone()));

        let session_store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(
            chrono::Duration::hours(config.session.ttl_hours),
            config.session.history_cap,
        ));

        let documents = config.rag.documents.clone();
        let tts_pool_size = config.tts.worker_pool_size;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            env: None,
            session_store,
            general_backend,
            document_backend,
            agent_backend,
            retriever: None,
            documents,
            stt_recognizer,
            tts_pool_size,
        })
    }

    pub fn with_env(mut self, env: Option<String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = store;
        self
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn DocumentRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Builds a new synthesizer handle and worker pool for one reply cycle.
    /// The teacher keeps one pool for the process lifetime; we build fresh
    /// pools per reply instead, since each reply owns its own results
    /// channel and ordering gate (§4.6) and a pool has no state worth
    /// keeping across replies once its jobs drain.
    pub fn new_tts_pool(&self, results_tx: tokio::sync::mpsc::Sender<voice_agent_core::TtsResult>) -> Arc<TtsPool> {
        let config = self.config.read();
        let synthesizer = Arc::new(HttpSpeechSynthesizer::new(
            config.tts.endpoint.clone(),
            config.tts.sample_rate_hz,
            config.tts.speaking_rate,
        ));
        Arc::new(TtsPool::new(synthesizer, self.tts_pool_size, results_tx))
    }

    pub fn reasoning_for(&self, mode: voice_agent_core::Mode) -> Arc<dyn ReasoningBackend> {
        match mode {
            voice_agent_core::Mode::General => self.general_backend.clone(),
            voice_agent_core::Mode::Document => self.document_backend.clone(),
            voice_agent_core::Mode::Agent => self.agent_backend.clone(),
        }
    }

    pub fn get_config(&self) -> Settings {
        self.config.read().clone()
    }

    /// Re-reads settings from disk/environment and swaps them in, without
    /// restarting the process or dropping live connections (§4.11 admin
    /// surface `/admin/reload-config`).
    pub fn reload_config(&self) -> Result<(), ConfigError> {
        let reloaded = voice_agent_config::load_settings(self.env.as_deref())?;
        *self.config.write() = reloaded;
        Ok(())
    }
}

/// Builds a document retriever from RAG settings, or `None` if RAG is
/// disabled. Kept outside the constructor since it needs its own error
/// type (`RagError`) rather than `ConfigError`, matching the optional,
/// best-effort nature of document mode.
pub fn build_retriever(config: &Settings) -> Option<Arc<dyn DocumentRetriever>> {
    if !config.rag.enabled {
        return None;
    }

    let vector_store = VectorStore::new(VectorStoreConfig {
        endpoint: config.rag.qdrant_endpoint.clone(),
        collection: config.rag.qdrant_collection.clone(),
        vector_dim: config.rag.vector_dim,
        api_key: config.rag.qdrant_api_key.clone(),
        ..Default::default()
    })
    .map_err(|e| tracing::error!(error = %e, "failed to construct vector store client"))
    .ok()?;

    let embedder = OllamaEmbedder::new(OllamaEmbeddingConfig {
        embedding_dim: config.rag.vector_dim,
        ..Default::default()
    });

    let retriever_config = RetrieverConfig::from(&config.rag);
    Some(Arc::new(QdrantDocumentRetriever::new(vector_store, embedder, retriever_config)))
}
