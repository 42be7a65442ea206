//! Centralized constants: generic operational defaults only. Anything
//! sentence/reasoning/session specific belongs in `Settings` so it can be
//! overridden per deployment; these are the library-level fallbacks used
//! when building `Settings::default()`.

/// Service endpoints (env-var overridable fallback defaults).
pub mod endpoints {
    use once_cell::sync::Lazy;

    pub static LLM_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("LLM_URL").unwrap_or_else(|_| "http://localhost:11434".to_string())
    });

    pub static QDRANT_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6333".to_string())
    });

    pub static STT_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("STT_URL").unwrap_or_else(|_| "http://localhost:8100".to_string())
    });

    pub static TTS_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("TTS_URL").unwrap_or_else(|_| "http://localhost:8200".to_string())
    });
}

/// Timeouts and grace windows (§5).
pub mod timing {
    /// Soft timeout waiting for the STT bridge's transcript after end-of-speech.
    pub const STT_TRANSCRIPT_WAIT_SECS: u64 = 5;

    /// Grace window the ordering gate waits over a missing sequence before
    /// advancing past it (§4.4, §5).
    pub const ORDERING_GATE_GRACE_MS: u64 = 100;

    /// Session idle TTL before eviction (§3).
    pub const SESSION_TTL_HOURS: i64 = 24;

    /// Reasoning backend request timeout.
    pub const LLM_REQUEST_SECS: u64 = 60;
}

/// Session defaults (§3).
pub mod session {
    /// Most-recent exchanges retained in history.
    pub const HISTORY_CAP: usize = 5;

    /// Hard cap on the STT retry-replay audio buffer (§4.2).
    pub const MAX_AUDIO_REPLAY_BYTES: usize = 10 * 1024 * 1024;
}

/// TTS worker pool defaults (§4.3).
pub mod tts {
    pub const WORKER_POOL_SIZE: usize = 3;
    pub const SAMPLE_RATE_HZ: u32 = 24_000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_constants_are_positive() {
        assert!(timing::STT_TRANSCRIPT_WAIT_SECS > 0);
        assert!(timing::ORDERING_GATE_GRACE_MS > 0);
        assert!(timing::SESSION_TTL_HOURS > 0);
    }
}
