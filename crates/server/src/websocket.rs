//! Axum WebSocket plumbing (§4.8, §4.9): upgrades the connection, splits
//! the socket so the reply pipeline can push frames concurrently with the
//! receive loop, and drives [`Connection::handle_text`] per frame.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use base64::Engine;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use voice_agent_core::TtsResult;
use voice_agent_pipeline::ReplySink;

use crate::connection::{Connection, OutboundSink, SharedSender};
use crate::protocol::ServerMessage;
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let origin = headers
        .get(axum::http::header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    ws.on_upgrade(move |socket| handle_socket(socket, state, origin))
}

async fn handle_socket(socket: WebSocket, state: AppState, origin: Option<String>) {
    let connection_id = Uuid::new_v4().to_string();
    let span = info_span!("connection", connection_id = %connection_id);

    async move {
        let (sink, mut stream) = socket.split();
        let sender: SharedSender = Arc::new(Mutex::new(AxumOutboundSink { sink }));
        let mut conn = Connection::new(state, origin);

        info!("connection opened");

        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    conn.handle_text(&text, &sender).await;
                }
                Ok(Message::Binary(_)) => {
                    // Audio travels as base64 inside `stt_audio` text frames
                    // (§6); a binary frame on this protocol is unexpected.
                }
                Ok(Message::Ping(data)) => {
                    let mut guard = sender.lock().await;
                    let _ = guard.sink.send(Message::Pong(data)).await;
                }
                Ok(Message::Close(_)) => break,
                Ok(Message::Pong(_)) => {}
                Err(e) => {
                    warn!(error = %e, "websocket receive error");
                    break;
                }
            }
        }

        conn.close().await;
        info!("connection closed");
    }
    .instrument(span)
    .await
}

struct AxumOutboundSink {
    sink: futures::stream::SplitSink<WebSocket, Message>,
}

#[async_trait::async_trait]
impl OutboundSink for AxumOutboundSink {
    async fn send_message(&mut self, message: ServerMessage) {
        let Ok(json) = serde_json::to_string(&message) else {
            warn!("failed to serialize outbound message");
            return;
        };
        if let Err(e) = self.sink.send(Message::Text(json)).await {
            warn!(error = %e, "failed to send websocket frame");
        }
    }
}

/// Adapts the connection's shared outbound sender to the reply pipeline's
/// `ReplySink` contract. One instance is built per reply cycle in
/// `Connection::handle_end_speech`.
pub struct WsReplySink {
    sender: SharedSender,
}

impl WsReplySink {
    pub fn new(sender: SharedSender) -> Self {
        Self { sender }
    }
}

#[async_trait::async_trait]
impl ReplySink for WsReplySink {
    async fn audio_chunk(&self, result: TtsResult) {
        self.sender
            .lock()
            .await
            .send_message(ServerMessage::AudioChunk {
                text: result.sentence_text,
                audio: base64::engine::general_purpose::STANDARD.encode(result.audio_bytes),
                words: result.word_timings,
            })
            .await;
    }

    async fn conversation_pair(&self, user_text: String, assistant_text: String) {
        self.sender
            .lock()
            .await
            .send_message(ServerMessage::ConversationPair {
                user_query: user_text,
                llm_response: assistant_text,
            })
            .await;
    }

    async fn stream_complete(&self) {
        self.sender
            .lock()
            .await
            .send_message(ServerMessage::StreamComplete { status: "ok".to_string() })
            .await;
    }
}
