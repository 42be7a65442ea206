//! TTS job/result types shared by the TTS Worker Pool and the Ordering Gate
//! (§3, §4.3, §4.4).

use serde::{Deserialize, Serialize};

/// Sequence number reserved for the filler chunk (§4.4).
pub const FILLER_SEQUENCE: u64 = 0;

#[derive(Debug, Clone)]
pub struct TtsJob {
    pub sequence_number: u64,
    pub sentence_text: String,
    pub voice: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub time_seconds: f32,
}

#[derive(Debug, Clone)]
pub struct TtsResult {
    pub sequence_number: u64,
    pub sentence_text: String,
    pub audio_bytes: Vec<u8>,
    pub word_timings: Vec<WordTiming>,
}

/// Small allowlist distinguishing voice genders for SSML gender tagging
/// (§6, "Voice identifiers").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceGender {
    Male,
    Female,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub id: String,
    pub display_name: String,
    pub gender: VoiceGender,
    pub language: String,
}
