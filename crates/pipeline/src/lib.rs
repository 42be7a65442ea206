//! The reply pipeline: ordering gate, sentence splitter, STT bridge, and
//! TTS worker pool that together turn a finalized transcript into ordered
//! audio chunks (§4.2–§4.6).

pub mod filler;
pub mod ordering_gate;
pub mod reply_pipeline;
pub mod sentence_splitter;
pub mod stt;
pub mod tts;

pub use reply_pipeline::{ReplyPipelineInput, ReplySink};
pub use stt::{HttpSpeechRecognizer, SpeechRecognizer, SttBridge, SttBridgeHandle};
pub use tts::{HttpSpeechSynthesizer, SpeechSynthesizer, TtsPool};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("speech recognizer error: {0}")]
    Recognizer(String),

    #[error("speech synthesizer error: {0}")]
    Synthesizer(String),

    #[error("reasoning backend error: {0}")]
    Reasoning(String),

    #[error("session store error: {0}")]
    Session(String),
}

impl From<voice_agent_core::Error> for PipelineError {
    fn from(err: voice_agent_core::Error) -> Self {
        match err {
            voice_agent_core::Error::Stt(msg) => PipelineError::Recognizer(msg),
            voice_agent_core::Error::Tts(msg) => PipelineError::Synthesizer(msg),
            voice_agent_core::Error::Reasoning(msg) => PipelineError::Reasoning(msg),
            other => PipelineError::Session(other.to_string()),
        }
    }
}
