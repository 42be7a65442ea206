//! HTTP-backed [`SpeechRecognizer`]: buffers the audio stream and posts it
//! to an external speech-recognition service, mirroring how the TTS pool
//! talks to its own external synthesizer.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Deserialize;
use tokio_stream::StreamExt;
use voice_agent_core::AudioEncoding;

use super::bridge::SpeechRecognizer;
use crate::PipelineError;

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    text: String,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpSpeechRecognizer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSpeechRecognizer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for HttpSpeechRecognizer {
    async fn recognize(
        &self,
        mut audio: BoxStream<'static, Vec<u8>>,
        encoding: AudioEncoding,
        language: &str,
    ) -> Result<String, PipelineError> {
        let mut body = Vec::new();
        while let Some(chunk) = audio.next().await {
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            return Ok(String::new());
        }

        let url = format!("{}/transcribe", self.endpoint);
        let response = self
            .client
            .post(&url)
            .header("Content-Type", encoding.content_type())
            .header("X-Language", language)
            .body(body)
            .send()
            .await
            .map_err(|e| PipelineError::Recognizer(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(PipelineError::Recognizer(format!(
                "recognizer returned status {}",
                response.status()
            )));
        }

        let parsed: RecognizeResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Recognizer(format!("bad response body: {e}")))?;

        if let Some(error) = parsed.error {
            return Err(PipelineError::Recognizer(error));
        }

        Ok(parsed.text)
    }
}
