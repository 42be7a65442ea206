//! STT Bridge: the boundary between a live connection and the external
//! streaming speech recognizer (§4.2).

mod bridge;
mod http_recognizer;

pub use bridge::{SpeechRecognizer, SttBridge, SttBridgeHandle};
pub use http_recognizer::HttpSpeechRecognizer;
