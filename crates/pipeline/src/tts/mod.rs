//! Bounded concurrent synthesis of sentence → audio+timings (§4.3).

mod http_synthesizer;
mod pool;

pub use http_synthesizer::HttpSpeechSynthesizer;
pub use pool::{SpeechSynthesizer, TtsPool};
