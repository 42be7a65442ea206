//! Adapts a client-driven audio feed to an external streaming speech
//! recognizer (§4.2).
//!
//! The recognizer itself is a collaborator behind the [`SpeechRecognizer`]
//! trait; this module owns only the queueing, retry-by-replay, and
//! cancellation plumbing around it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::StreamExt;
use tracing::{info, warn};
use voice_agent_core::{AudioEncoding, AudioReplayBuffer};

use crate::PipelineError;

const STT_MAX_RETRIES: u32 = 1;
const STT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// The external streaming recognizer collaborator. Given a stream of raw
/// audio frames, the encoding they're in, and a language hint, resolves to
/// the finalized transcript.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn recognize(
        &self,
        audio: BoxStream<'static, Vec<u8>>,
        encoding: AudioEncoding,
        language: &str,
    ) -> Result<String, PipelineError>;
}

enum Frame {
    Audio(Vec<u8>),
    EndOfSpeech,
}

/// Handle held by the connection: push frames, signal end of speech or a
/// hard cancel, and await the transcript.
pub struct SttBridgeHandle {
    frames: mpsc::Sender<Frame>,
    stopped: Arc<AtomicBool>,
    transcript: oneshot::Receiver<String>,
}

impl SttBridgeHandle {
    /// Enqueues one audio frame. Never blocks past the channel's fast
    /// path; frames are dropped with a warning if the queue is full.
    pub fn push(&self, bytes: &[u8]) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        match self.frames.try_send(Frame::Audio(bytes.to_vec())) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("stt audio queue full — dropping frame");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    /// Signals that no more audio will arrive; buffered frames still
    /// drain into the recognizer before the stream closes.
    pub fn end_of_speech(&self) {
        let _ = self.frames.try_send(Frame::EndOfSpeech);
    }

    /// Hard cancel: discard buffered audio and resolve the transcript
    /// with empty text.
    pub fn cancel(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Awaits the finalized transcript, or empty text on timeout or
    /// cancellation.
    pub async fn wait_for_transcript(mut self, timeout: Duration) -> String {
        match tokio::time::timeout(timeout, &mut self.transcript).await {
            Ok(Ok(text)) => text,
            Ok(Err(_)) => String::new(),
            Err(_) => {
                warn!("stt transcript wait timed out");
                String::new()
            }
        }
    }
}

/// Starts a recognition session: spawns the worker task and returns a
/// handle bound to it.
pub struct SttBridge;

impl SttBridge {
    pub fn start(
        recognizer: Arc<dyn SpeechRecognizer>,
        encoding: AudioEncoding,
        language: String,
        queue_capacity: usize,
        max_replay_bytes: usize,
    ) -> SttBridgeHandle {
        let (tx, rx) = mpsc::channel(queue_capacity);
        let (transcript_tx, transcript_rx) = oneshot::channel();
        let stopped = Arc::new(AtomicBool::new(false));

        tokio::spawn(run_worker(
            recognizer,
            encoding,
            language,
            rx,
            transcript_tx,
            stopped.clone(),
            max_replay_bytes,
        ));

        SttBridgeHandle {
            frames: tx,
            stopped,
            transcript: transcript_rx,
        }
    }
}

async fn run_worker(
    recognizer: Arc<dyn SpeechRecognizer>,
    encoding: AudioEncoding,
    language: String,
    mut rx: mpsc::Receiver<Frame>,
    transcript_tx: oneshot::Sender<String>,
    stopped: Arc<AtomicBool>,
    max_replay_bytes: usize,
) {
    let mut replay = AudioReplayBuffer::new(max_replay_bytes);
    let mut buffered: Vec<Vec<u8>> = Vec::new();
    let mut end_reached = false;

    while !end_reached && !stopped.load(Ordering::Acquire) {
        match rx.recv().await {
            Some(Frame::Audio(bytes)) => {
                replay.push(&voice_agent_core::AudioFrame::new(bytes.clone(), 0));
                buffered.push(bytes);
            }
            Some(Frame::EndOfSpeech) => end_reached = true,
            None => end_reached = true,
        }
    }

    if stopped.load(Ordering::Acquire) {
        let _ = transcript_tx.send(String::new());
        return;
    }

    let mut attempt = 0;
    let mut transcript = String::new();

    loop {
        if stopped.load(Ordering::Acquire) {
            transcript.clear();
            break;
        }

        let chunks: Vec<Vec<u8>> = if attempt == 0 {
            buffered.clone()
        } else if replay.can_retry() {
            vec![replay.bytes().to_vec()]
        } else {
            Vec::new()
        };

        let stream: BoxStream<'static, Vec<u8>> = Box::pin(tokio_stream::iter(chunks));

        match recognizer.recognize(stream, encoding, &language).await {
            Ok(text) => {
                info!(attempt, "stt recognition completed");
                transcript = text;
                break;
            }
            Err(err) if attempt < STT_MAX_RETRIES && !stopped.load(Ordering::Acquire) => {
                warn!(attempt, %err, "stt transient error — retrying");
                attempt += 1;
                tokio::time::sleep(STT_RETRY_DELAY).await;
            }
            Err(err) => {
                warn!(attempt, %err, "stt giving up after retry");
                transcript = String::new();
                break;
            }
        }
    }

    let _ = transcript_tx.send(transcript);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct StubRecognizer {
        fail_first: bool,
        calls: Arc<AtomicUsize>,
        seen_encoding: Arc<parking_lot::Mutex<Option<AudioEncoding>>>,
    }

    #[async_trait]
    impl SpeechRecognizer for StubRecognizer {
        async fn recognize(
            &self,
            mut audio: BoxStream<'static, Vec<u8>>,
            encoding: AudioEncoding,
            _language: &str,
        ) -> Result<String, PipelineError> {
            *self.seen_encoding.lock() = Some(encoding);
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let mut total = 0usize;
            while let Some(chunk) = audio.next().await {
                total += chunk.len();
            }
            if call == 0 && self.fail_first {
                return Err(PipelineError::Recognizer("transient".into()));
            }
            Ok(format!("heard {total} bytes"))
        }
    }

    #[tokio::test]
    async fn happy_path_returns_transcript() {
        let recognizer = Arc::new(StubRecognizer {
            fail_first: false,
            calls: Arc::new(AtomicUsize::new(0)),
            seen_encoding: Arc::new(parking_lot::Mutex::new(None)),
        });
        let handle = SttBridge::start(recognizer, AudioEncoding::Pcm16Le, "en-US".into(), 16, 1024);
        handle.push(&[1, 2, 3, 4]);
        handle.end_of_speech();
        let text = handle.wait_for_transcript(Duration::from_secs(1)).await;
        assert_eq!(text, "heard 4 bytes");
    }

    #[tokio::test]
    async fn recognizer_receives_the_bridge_s_encoding() {
        let seen_encoding = Arc::new(parking_lot::Mutex::new(None));
        let recognizer = Arc::new(StubRecognizer {
            fail_first: false,
            calls: Arc::new(AtomicUsize::new(0)),
            seen_encoding: seen_encoding.clone(),
        });
        let handle = SttBridge::start(recognizer, AudioEncoding::OpusWebm, "en-US".into(), 16, 1024);
        handle.push(&[1, 2, 3, 4]);
        handle.end_of_speech();
        let _ = handle.wait_for_transcript(Duration::from_secs(1)).await;
        assert_eq!(*seen_encoding.lock(), Some(AudioEncoding::OpusWebm));
    }

    #[tokio::test]
    async fn cancel_resolves_transcript_as_empty() {
        let recognizer = Arc::new(StubRecognizer {
            fail_first: false,
            calls: Arc::new(AtomicUsize::new(0)),
            seen_encoding: Arc::new(parking_lot::Mutex::new(None)),
        });
        let handle = SttBridge::start(recognizer, AudioEncoding::Pcm16Le, "en-US".into(), 16, 1024);
        handle.push(&[9, 9, 9]);
        handle.cancel();
        let text = handle.wait_for_transcript(Duration::from_secs(1)).await;
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn retries_once_by_replaying_full_buffer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let recognizer = Arc::new(StubRecognizer {
            fail_first: true,
            calls: calls.clone(),
            seen_encoding: Arc::new(parking_lot::Mutex::new(None)),
        });
        let handle = SttBridge::start(recognizer, AudioEncoding::Pcm16Le, "en-US".into(), 16, 1024);
        handle.push(&[1, 2]);
        handle.push(&[3, 4]);
        handle.end_of_speech();
        let text = handle.wait_for_transcript(Duration::from_secs(2)).await;
        assert_eq!(text, "heard 4 bytes");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
