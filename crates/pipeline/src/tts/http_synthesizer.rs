//! HTTP-backed [`SpeechSynthesizer`]. Sends the sentence wrapped in SSML
//! `<mark>` tags around each word so the external service can return
//! per-word timing marks alongside the synthesized audio.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use voice_agent_core::{TtsJob, TtsResult, WordTiming};

use super::pool::SpeechSynthesizer;
use crate::PipelineError;

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    ssml: String,
    voice: &'a str,
    sample_rate_hz: u32,
    speaking_rate: f32,
}

#[derive(Debug, Deserialize)]
struct SynthesizeResponse {
    audio_base64: String,
    #[serde(default)]
    word_timings: Vec<WordTimingWire>,
}

#[derive(Debug, Deserialize)]
struct WordTimingWire {
    word: String,
    time_seconds: f32,
}

pub struct HttpSpeechSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    sample_rate_hz: u32,
    speaking_rate: f32,
}

impl HttpSpeechSynthesizer {
    pub fn new(endpoint: impl Into<String>, sample_rate_hz: u32, speaking_rate: f32) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            sample_rate_hz,
            speaking_rate,
        }
    }
}

fn to_ssml(sentence: &str) -> String {
    let marked = sentence
        .split_whitespace()
        .enumerate()
        .map(|(i, word)| format!("<mark name=\"w{i}\"/>{word}"))
        .collect::<Vec<_>>()
        .join(" ");
    format!("<speak>{marked}</speak>")
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, job: &TtsJob) -> Result<TtsResult, PipelineError> {
        let request = SynthesizeRequest {
            ssml: to_ssml(&job.sentence_text),
            voice: &job.voice,
            sample_rate_hz: self.sample_rate_hz,
            speaking_rate: self.speaking_rate,
        };

        let url = format!("{}/synthesize", self.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::Synthesizer(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(PipelineError::Synthesizer(format!(
                "synthesizer returned status {}",
                response.status()
            )));
        }

        let parsed: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Synthesizer(format!("bad response body: {e}")))?;

        let audio_bytes = base64::engine::general_purpose::STANDARD
            .decode(parsed.audio_base64)
            .map_err(|e| PipelineError::Synthesizer(format!("invalid audio encoding: {e}")))?;

        Ok(TtsResult {
            sequence_number: job.sequence_number,
            sentence_text: job.sentence_text.clone(),
            audio_bytes,
            word_timings: parsed
                .word_timings
                .into_iter()
                .map(|w| WordTiming {
                    word: w.word,
                    time_seconds: w.time_seconds,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssml_wraps_each_word_with_a_named_mark() {
        let ssml = to_ssml("hello there friend");
        assert_eq!(
            ssml,
            "<speak><mark name=\"w0\"/>hello <mark name=\"w1\"/>there <mark name=\"w2\"/>friend</speak>"
        );
    }
}
