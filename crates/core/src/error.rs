//! Crate-wide error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("session error: {0}")]
    Session(String),

    #[error("stt error: {0}")]
    Stt(String),

    #[error("tts error: {0}")]
    Tts(String),

    #[error("reasoning backend error: {0}")]
    Reasoning(String),

    #[error("retrieval error: {0}")]
    Retrieval(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, Error>;
