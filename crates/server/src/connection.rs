//! Per-connection state machine (§3 "Connection", §4.7 "Cancellation and
//! barge-in", §4.8 "Connection FSM").
//!
//! One `Connection` lives for the lifetime of one WebSocket: it owns the
//! authorization flag, the active mode/voice/document selection, the
//! at-most-one STT bridge, and the at-most-one in-flight reply's stop
//! signal. Everything here is plain async logic with no axum types in it;
//! `websocket.rs` owns the socket plumbing and hands frames to
//! [`Connection::handle_text`].

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use tokio::sync::Mutex;

use voice_agent_core::{AudioEncoding, Mode, StopSignal};
use voice_agent_pipeline::{ReplyPipelineInput, ReplySink, SttBridge};

use crate::protocol::{ClientMessage, ServerMessage};
use crate::rate_limit::RateLimiter;
use crate::state::AppState;
use crate::{auth, metrics};

/// Outbound sender shared between the connection's main receive loop and
/// any background reply-pipeline task, so both can write frames without
/// interleaving partial writes.
pub type SharedSender = Arc<Mutex<dyn OutboundSink>>;

/// Narrow seam over the outbound half of the socket, implemented by
/// `websocket.rs` against the real `SplitSink`. Kept as a trait so
/// connection logic can be exercised with an in-memory fake.
#[async_trait::async_trait]
pub trait OutboundSink: Send {
    async fn send_message(&mut self, message: ServerMessage);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fsm {
    AwaitAuth,
    Ready,
    Streaming,
}

pub struct Connection {
    state: AppState,
    origin: Option<String>,
    fsm: Fsm,
    session_id: Option<String>,
    voice: String,
    mode: Mode,
    selected_document: Option<String>,
    stt: Option<voice_agent_pipeline::SttBridgeHandle>,
    current_stop: Option<StopSignal>,
    rate_limiter: RateLimiter,
}

impl Connection {
    pub fn new(state: AppState, origin: Option<String>) -> Self {
        let rate_limiter = RateLimiter::new(&state.get_config().server.rate_limit);
        Self {
            state,
            origin,
            fsm: Fsm::AwaitAuth,
            session_id: None,
            voice: "en-US-female-1".to_string(),
            mode: Mode::General,
            selected_document: None,
            stt: None,
            current_stop: None,
            rate_limiter,
        }
    }

    /// Dispatches one inbound text frame. Rate limiting and the
    /// unauthorized-connection gate (§3: "any message other than auth on
    /// an unauthorized connection is rejected") are enforced here, before
    /// the message reaches per-variant handling.
    pub async fn handle_text(&mut self, text: &str, sender: &SharedSender) {
        if let Err(e) = self.rate_limiter.check_message() {
            metrics::record_error("rate_limit");
            self.send(sender, ServerMessage::error(e.to_string())).await;
            return;
        }

        let message: ClientMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                metrics::record_error("malformed_message");
                self.send(sender, ServerMessage::error(format!("malformed message: {e}"))).await;
                return;
            }
        };

        metrics::record_message_received(message_type(&message));

        if self.fsm == Fsm::AwaitAuth && !matches!(message, ClientMessage::Auth { .. }) {
            self.send(sender, ServerMessage::error("connection is not authenticated")).await;
            return;
        }

        match message {
            ClientMessage::Auth { api_key, session_id } => self.handle_auth(api_key, session_id, sender).await,
            ClientMessage::GetDocuments => self.handle_get_documents(sender).await,
            ClientMessage::StartStream { voice, mode, selected_document, encoding } => {
                self.handle_start_stream(voice, mode, selected_document, encoding, sender).await
            }
            ClientMessage::SttAudio { audio } => self.handle_stt_audio(&audio, sender).await,
            ClientMessage::EndSpeech { .. } => self.handle_end_speech(sender).await,
            ClientMessage::BargeIn => self.handle_barge_in("barge_in").await,
        }
    }

    async fn handle_auth(&mut self, api_key: String, session_id: Option<String>, sender: &SharedSender) {
        let config = self.state.get_config();
        let origin = self.origin.as_deref();
        match auth::check_auth(&config.server.auth, origin, &api_key) {
            auth::AuthOutcome::Accepted => {
                let (resolved_id, _session) = match self.state.session_store.get_or_create(session_id.as_deref()).await {
                    Ok(pair) => pair,
                    Err(e) => {
                        metrics::record_error("session_store");
                        self.send(sender, ServerMessage::error(format!("session store unavailable: {e}"))).await;
                        return;
                    }
                };
                self.session_id = Some(resolved_id.clone());
                self.fsm = Fsm::Ready;
                metrics::record_connection_opened();
                self.send(sender, ServerMessage::Connected { status: "ready".to_string(), session_id: resolved_id }).await;
            }
            auth::AuthOutcome::Rejected(reason) => {
                metrics::record_error("auth_rejected");
                self.send(sender, ServerMessage::error(reason)).await;
            }
        }
    }

    async fn handle_get_documents(&mut self, sender: &SharedSender) {
        self.send(sender, ServerMessage::DocumentsList { documents: self.state.documents.clone() }).await;
    }

    async fn handle_start_stream(
        &mut self,
        voice: String,
        mode: String,
        selected_document: Option<String>,
        encoding: Option<String>,
        sender: &SharedSender,
    ) {
        let mode = match Mode::parse(&mode) {
            Some(m) => m,
            None => {
                self.send(sender, ServerMessage::error(format!("unknown mode: {mode}"))).await;
                return;
            }
        };

        // Auto-interrupt (§4.7): a new stream supersedes whatever reply or
        // STT bridge is still in flight.
        self.cancel_in_flight("auto_interrupt");

        self.voice = voice;
        self.mode = mode;
        self.selected_document = selected_document;
        self.fsm = Fsm::Streaming;

        let config = self.state.get_config();
        // §6 "Audio encoding": the recognizer configuration is selected
        // from the MIME type of the stream, named by the client or else
        // the server's configured default.
        let encoding_mime = encoding.unwrap_or_else(|| config.stt.encoding_mime.clone());
        let encoding = AudioEncoding::from_mime(&encoding_mime);
        let stt_handle = SttBridge::start(
            self.state.stt_recognizer.clone(),
            encoding,
            config.stt.language.clone(),
            config.stt.queue_capacity,
            config.session.max_audio_replay_bytes,
        );
        self.stt = Some(stt_handle);
        self.current_stop = Some(StopSignal::new());

        let session_id = self.session_id.clone().unwrap_or_default();
        self.send(sender, ServerMessage::StreamStarted { session_id }).await;
    }

    async fn handle_stt_audio(&mut self, audio_base64: &str, sender: &SharedSender) {
        let bytes = match base64::engine::general_purpose::STANDARD.decode(audio_base64) {
            Ok(b) => b,
            Err(_) => {
                self.send(sender, ServerMessage::error("invalid base64 audio")).await;
                return;
            }
        };

        if let Err(e) = self.rate_limiter.check_audio(bytes.len()) {
            metrics::record_error("rate_limit");
            self.send(sender, ServerMessage::error(e.to_string())).await;
            return;
        }

        match &self.stt {
            Some(handle) => handle.push(&bytes),
            None => self.send(sender, ServerMessage::error("no active stream")).await,
        }
    }

    async fn handle_end_speech(&mut self, sender: &SharedSender) {
        let Some(stt) = self.stt.take() else {
            self.send(sender, ServerMessage::error("no active stream")).await;
            return;
        };
        let Some(stop) = self.current_stop.clone() else {
            return;
        };

        stt.end_of_speech();
        self.fsm = Fsm::Ready;

        let state = self.state.clone();
        let mode = self.mode;
        let voice = self.voice.clone();
        let selected_document = self.selected_document.clone();
        let session_id = self.session_id.clone().unwrap_or_default();
        let wait = Duration::from_secs(state.get_config().stt.transcript_wait_secs);
        let sink: Arc<dyn ReplySink> = Arc::new(crate::websocket::WsReplySink::new(sender.clone()));

        tokio::spawn(async move {
            let stt_started = std::time::Instant::now();
            let transcript = tokio::select! {
                text = stt.wait_for_transcript(wait) => {
                    metrics::record_stt_latency_seconds(stt_started.elapsed().as_secs_f64());
                    text
                }
                _ = stop.cancelled() => String::new(),
            };

            if stop.is_cancelled() {
                sink.stream_complete().await;
                return;
            }
            if transcript.trim().is_empty() {
                sink.stream_complete().await;
                return;
            }

            let (results_tx, results_rx) = tokio::sync::mpsc::channel(64);
            let tts_pool = state.new_tts_pool(results_tx);
            let reasoning = state.reasoning_for(mode);
            let retriever = state.retriever.clone();

            let input = ReplyPipelineInput {
                transcript,
                mode,
                voice,
                selected_document,
                session_id,
            };

            if let Err(e) = voice_agent_pipeline::reply_pipeline::run(
                input,
                reasoning,
                state.session_store.clone(),
                tts_pool,
                sink,
                stop,
                results_rx,
                retriever,
            )
            .await
            {
                tracing::warn!(error = %e, "reply pipeline ended with an error");
                metrics::record_error("reply_pipeline");
            }
        });
    }

    async fn handle_barge_in(&mut self, source: &str) {
        self.cancel_in_flight(source);
        if self.fsm == Fsm::Streaming {
            self.fsm = Fsm::Ready;
        }
    }

    /// Cancels whatever reply pipeline and STT bridge are in flight, if
    /// any (§4.7). Idempotent: safe to call with nothing active.
    fn cancel_in_flight(&mut self, source: &str) {
        if let Some(stop) = self.current_stop.take() {
            stop.cancel();
            metrics::record_cancellation(source);
        }
        if let Some(stt) = self.stt.take() {
            stt.cancel();
        }
    }

    /// Called when the socket closes, from either side.
    pub async fn close(&mut self) {
        self.cancel_in_flight("connection_closed");
    }

    async fn send(&self, sender: &SharedSender, message: ServerMessage) {
        sender.lock().await.send_message(message).await;
    }
}

fn message_type(message: &ClientMessage) -> &'static str {
    match message {
        ClientMessage::Auth { .. } => "auth",
        ClientMessage::GetDocuments => "get_documents",
        ClientMessage::StartStream { .. } => "start_stream",
        ClientMessage::SttAudio { .. } => "stt_audio",
        ClientMessage::EndSpeech { .. } => "end_speech",
        ClientMessage::BargeIn => "barge_in",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_agent_config::Settings;

    #[derive(Default)]
    struct RecordingSink {
        sent: Vec<ServerMessage>,
    }

    #[async_trait::async_trait]
    impl OutboundSink for RecordingSink {
        async fn send_message(&mut self, message: ServerMessage) {
            self.sent.push(message);
        }
    }

    fn connection() -> Connection {
        let state = AppState::new(Settings::default()).expect("default settings should build state");
        Connection::new(state, Some("http://localhost:3000".to_string()))
    }

    fn shared(sink: RecordingSink) -> (SharedSender, Arc<Mutex<RecordingSink>>) {
        let inner = Arc::new(Mutex::new(sink));
        let sender: SharedSender = inner.clone();
        (sender, inner)
    }

    #[tokio::test]
    async fn unauthenticated_connection_rejects_non_auth_messages() {
        let mut conn = connection();
        let (sender, sink) = shared(RecordingSink::default());

        conn.handle_text(r#"{"type":"get_documents"}"#, &sender).await;

        assert_eq!(conn.fsm, Fsm::AwaitAuth);
        let sent = sink.lock().await;
        assert!(matches!(sent.sent.last(), Some(ServerMessage::Error { .. })));
    }

    #[tokio::test]
    async fn auth_with_auth_disabled_always_succeeds() {
        let mut conn = connection();
        let (sender, sink) = shared(RecordingSink::default());

        conn.handle_text(r#"{"type":"auth","data":{"api_key":"anything"}}"#, &sender).await;

        assert_eq!(conn.fsm, Fsm::Ready);
        let sent = sink.lock().await;
        assert!(matches!(sent.sent.last(), Some(ServerMessage::Connected { .. })));
    }

    #[tokio::test]
    async fn start_stream_with_unknown_mode_does_not_transition() {
        let mut conn = connection();
        let (sender, sink) = shared(RecordingSink::default());
        conn.handle_text(r#"{"type":"auth","data":{"api_key":"k"}}"#, &sender).await;

        conn.handle_text(
            r#"{"type":"start_stream","data":{"voice":"v1","mode":"not_a_mode"}}"#,
            &sender,
        )
        .await;

        assert_eq!(conn.fsm, Fsm::Ready);
        let sent = sink.lock().await;
        assert!(matches!(sent.sent.last(), Some(ServerMessage::Error { .. })));
    }

    #[tokio::test]
    async fn start_stream_transitions_to_streaming_and_opens_an_stt_bridge() {
        let mut conn = connection();
        let (sender, sink) = shared(RecordingSink::default());
        conn.handle_text(r#"{"type":"auth","data":{"api_key":"k"}}"#, &sender).await;

        conn.handle_text(
            r#"{"type":"start_stream","data":{"voice":"v1","mode":"general"}}"#,
            &sender,
        )
        .await;

        assert_eq!(conn.fsm, Fsm::Streaming);
        assert!(conn.stt.is_some());
        assert!(conn.current_stop.is_some());
        let sent = sink.lock().await;
        assert!(matches!(sent.sent.last(), Some(ServerMessage::StreamStarted { .. })));
    }

    #[tokio::test]
    async fn stt_audio_without_active_stream_errors() {
        let mut conn = connection();
        let (sender, sink) = shared(RecordingSink::default());
        conn.handle_text(r#"{"type":"auth","data":{"api_key":"k"}}"#, &sender).await;

        conn.handle_text(r#"{"type":"stt_audio","data":{"audio":"AAAA"}}"#, &sender).await;

        let sent = sink.lock().await;
        assert!(matches!(sent.sent.last(), Some(ServerMessage::Error { .. })));
    }

    #[tokio::test]
    async fn stt_audio_with_invalid_base64_errors_without_touching_rate_limiter() {
        let mut conn = connection();
        let (sender, sink) = shared(RecordingSink::default());
        conn.handle_text(r#"{"type":"auth","data":{"api_key":"k"}}"#, &sender).await;
        conn.handle_text(
            r#"{"type":"start_stream","data":{"voice":"v1","mode":"general"}}"#,
            &sender,
        )
        .await;

        conn.handle_text(r#"{"type":"stt_audio","data":{"audio":"not valid base64!!"}}"#, &sender).await;

        let sent = sink.lock().await;
        assert!(matches!(sent.sent.last(), Some(ServerMessage::Error { .. })));
    }

    #[tokio::test]
    async fn barge_in_cancels_in_flight_work_and_returns_to_ready() {
        let mut conn = connection();
        let (sender, _sink) = shared(RecordingSink::default());
        conn.handle_text(r#"{"type":"auth","data":{"api_key":"k"}}"#, &sender).await;
        conn.handle_text(
            r#"{"type":"start_stream","data":{"voice":"v1","mode":"general"}}"#,
            &sender,
        )
        .await;
        assert_eq!(conn.fsm, Fsm::Streaming);

        let stop = conn.current_stop.clone().expect("stop signal set by start_stream");
        conn.handle_text(r#"{"type":"barge_in"}"#, &sender).await;

        assert_eq!(conn.fsm, Fsm::Ready);
        assert!(stop.is_cancelled());
        assert!(conn.current_stop.is_none());
        assert!(conn.stt.is_none());
    }

    #[tokio::test]
    async fn starting_a_second_stream_auto_interrupts_the_first() {
        let mut conn = connection();
        let (sender, _sink) = shared(RecordingSink::default());
        conn.handle_text(r#"{"type":"auth","data":{"api_key":"k"}}"#, &sender).await;
        conn.handle_text(
            r#"{"type":"start_stream","data":{"voice":"v1","mode":"general"}}"#,
            &sender,
        )
        .await;
        let first_stop = conn.current_stop.clone().unwrap();

        conn.handle_text(
            r#"{"type":"start_stream","data":{"voice":"v2","mode":"document"}}"#,
            &sender,
        )
        .await;

        assert!(first_stop.is_cancelled());
        let second_stop = conn.current_stop.clone().unwrap();
        assert!(!second_stop.is_cancelled());
        assert_eq!(conn.mode, Mode::Document);
        assert_eq!(conn.voice, "v2");
    }

    #[tokio::test]
    async fn closing_the_connection_cancels_in_flight_work() {
        let mut conn = connection();
        let (sender, _sink) = shared(RecordingSink::default());
        conn.handle_text(r#"{"type":"auth","data":{"api_key":"k"}}"#, &sender).await;
        conn.handle_text(
            r#"{"type":"start_stream","data":{"voice":"v1","mode":"general"}}"#,
            &sender,
        )
        .await;
        let stop = conn.current_stop.clone().unwrap();

        conn.close().await;

        assert!(stop.is_cancelled());
    }
}
