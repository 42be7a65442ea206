//! Layered application settings (§3 "Settings", §6 "Configuration").

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{endpoints, session, timing, tts};
use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub stt: SttConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "port cannot be 0".to_string(),
            });
        }
        if self.session.history_cap == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.history_cap".to_string(),
                message: "history cap must be at least 1".to_string(),
            });
        }
        if self.environment.is_production()
            && self.server.auth.enabled
            && self.server.auth.api_key.is_none()
        {
            return Err(ConfigError::InvalidValue {
                field: "server.auth.api_key".to_string(),
                message: "API key must be set when auth is enabled in production".to_string(),
            });
        }
        if self.environment.is_production()
            && self.server.cors_enabled
            && self.server.cors_origins.is_empty()
        {
            tracing::warn!(
                "CORS is enabled in production but no origins are configured; \
                 this will block every browser client"
            );
        }
        Ok(())
    }
}

/// §6: "Gateway listen address for the framed protocol", CORS, rate limit, auth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: default_true(),
            cors_origins: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

/// Auth is a single "is this API key + origin accepted" check (§1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_messages_per_second")]
    pub messages_per_second: u32,
    #[serde(default = "default_audio_bytes_per_second")]
    pub audio_bytes_per_second: u32,
}

fn default_messages_per_second() -> u32 {
    100
}
fn default_audio_bytes_per_second() -> u32 {
    2 * 48_000 * 2 // ~2s worth of 48kHz mono PCM16 headroom per second
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            messages_per_second: default_messages_per_second(),
            audio_bytes_per_second: default_audio_bytes_per_second(),
        }
    }
}

/// §3 "Session", §4.1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
    #[serde(default = "default_max_audio_replay_bytes")]
    pub max_audio_replay_bytes: usize,
}

fn default_ttl_hours() -> i64 {
    timing::SESSION_TTL_HOURS
}
fn default_history_cap() -> usize {
    session::HISTORY_CAP
}
fn default_max_audio_replay_bytes() -> usize {
    session::MAX_AUDIO_REPLAY_BYTES
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            history_cap: default_history_cap(),
            max_audio_replay_bytes: default_max_audio_replay_bytes(),
        }
    }
}

/// §4.2, §6 "Audio encoding".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    #[serde(default = "default_stt_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_stt_language")]
    pub language: String,
    #[serde(default = "default_stt_model")]
    pub model: String,
    #[serde(default = "default_transcript_wait_secs")]
    pub transcript_wait_secs: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Default audio MIME type assumed when a client's `start_stream`
    /// doesn't name one (§6 "audio encoding override").
    #[serde(default = "default_encoding_mime")]
    pub encoding_mime: String,
}

fn default_stt_endpoint() -> String {
    endpoints::STT_DEFAULT.clone()
}
fn default_stt_language() -> String {
    "en".to_string()
}
fn default_stt_model() -> String {
    "default".to_string()
}
fn default_transcript_wait_secs() -> u64 {
    timing::STT_TRANSCRIPT_WAIT_SECS
}
fn default_queue_capacity() -> usize {
    400
}
fn default_encoding_mime() -> String {
    "audio/pcm".to_string()
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            endpoint: default_stt_endpoint(),
            language: default_stt_language(),
            model: default_stt_model(),
            transcript_wait_secs: default_transcript_wait_secs(),
            queue_capacity: default_queue_capacity(),
            encoding_mime: default_encoding_mime(),
        }
    }
}

/// §4.3, §6 "Server audio is MP3 at 24 kHz...".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default = "default_tts_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_tts_sample_rate")]
    pub sample_rate_hz: u32,
    #[serde(default = "default_speaking_rate")]
    pub speaking_rate: f32,
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    #[serde(default = "default_voices")]
    pub voices: Vec<String>,
}

fn default_tts_endpoint() -> String {
    endpoints::TTS_DEFAULT.clone()
}
fn default_tts_sample_rate() -> u32 {
    tts::SAMPLE_RATE_HZ
}
fn default_speaking_rate() -> f32 {
    1.0
}
fn default_worker_pool_size() -> usize {
    tts::WORKER_POOL_SIZE
}
fn default_voices() -> Vec<String> {
    vec!["en-US-female-1".to_string(), "en-US-male-1".to_string()]
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_tts_endpoint(),
            api_key: None,
            sample_rate_hz: default_tts_sample_rate(),
            speaking_rate: default_speaking_rate(),
            worker_pool_size: default_worker_pool_size(),
            voices: default_voices(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_llm_endpoint() -> String {
    endpoints::LLM_DEFAULT.clone()
}
fn default_llm_model() -> String {
    "llama3.1".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    timing::LLM_REQUEST_SECS
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            request_timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// Document-mode retrieval (§4.6, §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_qdrant_endpoint")]
    pub qdrant_endpoint: String,
    #[serde(default = "default_qdrant_collection")]
    pub qdrant_collection: String,
    #[serde(default)]
    pub qdrant_api_key: Option<String>,
    #[serde(default = "default_vector_dim")]
    pub vector_dim: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Static allowlist of document ids the `get_documents` wire message may
    /// hand back and `start_stream` may select against (§6: document
    /// ingestion/CRUD is out of scope, so this list is config, not state).
    #[serde(default)]
    pub documents: Vec<String>,
}

fn default_qdrant_endpoint() -> String {
    endpoints::QDRANT_DEFAULT.clone()
}
fn default_qdrant_collection() -> String {
    "documents".to_string()
}
fn default_vector_dim() -> usize {
    1024
}
fn default_top_k() -> usize {
    6
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            qdrant_endpoint: default_qdrant_endpoint(),
            qdrant_collection: default_qdrant_collection(),
            qdrant_api_key: None,
            vector_dim: default_vector_dim(),
            top_k: default_top_k(),
            documents: Vec::new(),
        }
    }
}

/// Agent mode's tool-using database backend (§4.10 "Agent").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_db_path")]
    pub db_path: String,
    #[serde(default)]
    pub schema_description: String,
}

fn default_agent_db_path() -> String {
    "data/agent.db".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            db_path: default_agent_db_path(),
            schema_description: String::new(),
        }
    }
}

/// §4.1, §9 "Session store durability": external store is primary, the
/// in-memory map is a write-through cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_scylla_hosts")]
    pub scylla_hosts: Vec<String>,
    #[serde(default = "default_scylla_keyspace")]
    pub keyspace: String,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: u8,
}

fn default_scylla_hosts() -> Vec<String> {
    std::env::var("SCYLLA_HOSTS")
        .map(|s| s.split(',').map(|h| h.trim().to_string()).collect())
        .unwrap_or_else(|_| vec!["127.0.0.1:9042".to_string()])
}
fn default_scylla_keyspace() -> String {
    std::env::var("SCYLLA_KEYSPACE").unwrap_or_else(|_| "voice_agent".to_string())
}
fn default_replication_factor() -> u8 {
    1
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scylla_hosts: default_scylla_hosts(),
            keyspace: default_scylla_keyspace(),
            replication_factor: default_replication_factor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
    #[serde(default = "default_true")]
    pub tracing_enabled: bool,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_metrics_port() -> u16 {
    9090
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            tracing_enabled: true,
            otlp_endpoint: None,
            metrics_enabled: true,
            metrics_port: default_metrics_port(),
        }
    }
}

/// Loads layered settings: defaults < `config/default.{yaml,toml}` <
/// `config/{env}.{yaml,toml}` < `VOICE_AGENT__`-prefixed environment
/// variables.
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();
    builder = builder.add_source(File::with_name("config/default").required(false));
    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }
    builder = builder.add_source(
        Environment::with_prefix("VOICE_AGENT")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.session.history_cap, 5);
    }

    #[test]
    fn zero_history_cap_is_rejected() {
        let mut settings = Settings::default();
        settings.session.history_cap = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn production_requires_api_key_when_auth_enabled() {
        let mut settings = Settings::default();
        settings.environment = RuntimeEnvironment::Production;
        settings.server.auth.enabled = true;
        assert!(settings.validate().is_err());
        settings.server.auth.api_key = Some("secret".to_string());
        assert!(settings.validate().is_ok());
    }
}
