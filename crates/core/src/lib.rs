//! Core types and contracts shared across the voice gateway:
//! - audio frame/encoding types for the STT bridge
//! - conversation history types for the Session Store
//! - the session storage contract
//! - the cancellation primitive shared by every per-reply task
//! - the `ReasoningBackend` capability contract
//! - the `DocumentRetriever` capability contract
//! - TTS job/result types for the worker pool and ordering gate

pub mod audio;
pub mod cancellation;
pub mod conversation;
pub mod error;
pub mod reasoning;
pub mod retrieval;
pub mod session;
pub mod tts;

pub use audio::{AudioEncoding, AudioFrame, AudioReplayBuffer};
pub use cancellation::StopSignal;
pub use conversation::{is_trivial_reply, Exchange};
pub use error::{Error, Result};
pub use reasoning::{Mode, ReasoningBackend, TokenStream};
pub use retrieval::DocumentRetriever;
pub use session::{InMemorySessionStore, Session, SessionStore};
pub use tts::{TtsJob, TtsResult, VoiceGender, VoiceInfo, WordTiming, FILLER_SEQUENCE};
