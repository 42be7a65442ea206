//! Wire protocol (§4.9, §6): framed `{type, data}` JSON messages exchanged
//! over the WebSocket connection, symmetric in shape between client and
//! server. Grounded on the teacher's `websocket.rs` `WsMessage` enum, which
//! uses the same serde adjacently-tagged representation; the variant set
//! is rebuilt from scratch against §6's message tables since this gateway's
//! surface (auth/start_stream/stt_audio/barge_in, audio_chunk/
//! conversation_pair/stream_complete) has no overlap with the teacher's
//! text/audio/transcript chat variants.

use serde::{Deserialize, Serialize};

use voice_agent_core::WordTiming;

/// Messages a client may send, in any connection state that accepts them
/// (§4.8 lists the accepted set per state).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// First message on every connection: single api_key + origin check
    /// (§1). `session_id` resumes an existing session if still live.
    Auth {
        api_key: String,
        #[serde(default)]
        session_id: Option<String>,
    },
    /// Requests the static document list for document mode (§6: this is a
    /// websocket message, not an HTTP route — document ingestion/CRUD is
    /// out of scope).
    GetDocuments,
    /// Opens a new reply cycle: selects voice, reasoning mode, and (for
    /// document mode) which document to retrieve against. `encoding` is the
    /// MIME type of the audio the client is about to stream (e.g.
    /// `audio/webm;codecs=opus`); omitted, it falls back to the server's
    /// configured default (§6 "Audio encoding").
    StartStream {
        voice: String,
        mode: String,
        #[serde(default)]
        selected_document: Option<String>,
        #[serde(default)]
        encoding: Option<String>,
    },
    /// One chunk of client microphone audio, base64-encoded PCM16LE
    /// (§6 "Audio encoding").
    SttAudio { audio: String },
    /// Marks end-of-speech for the in-flight utterance. An optional
    /// `request_id` lets the client tag which utterance this closes,
    /// though the connection only ever has one live request at a time.
    EndSpeech {
        #[serde(default)]
        request_id: Option<String>,
    },
    /// Explicit cancellation (§4.7): stop whatever reply is in flight.
    BargeIn,
}

/// Messages the server may send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to `auth`: whether the connection is now in the `Ready`
    /// state, and the session id the client should remember for resume.
    Connected { status: String, session_id: String },
    /// Acknowledges `start_stream`; the connection has moved to
    /// `Streaming`.
    StreamStarted { session_id: String },
    DocumentsList { documents: Vec<String> },
    /// One synthesized sentence: text, base64 audio, and per-word timing
    /// marks (§4.3, §6).
    AudioChunk {
        text: String,
        audio: String,
        words: Vec<WordTiming>,
    },
    /// The completed user/assistant turn, emitted once history has been
    /// durably appended (§4.6 step 7).
    ConversationPair {
        user_query: String,
        llm_response: String,
    },
    /// Terminal frame for the utterance; always sent exactly once per
    /// reply cycle regardless of how it ended (§4.7's "no partial
    /// `audio_chunk` for a cancelled sentence" guarantee still permits —
    /// and requires — this closing frame).
    StreamComplete { status: String },
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_uses_adjacently_tagged_shape() {
        let json = serde_json::json!({
            "type": "start_stream",
            "data": {"voice": "en-US-female-1", "mode": "general", "selected_document": null}
        });
        let msg: ClientMessage = serde_json::from_value(json).unwrap();
        matches!(msg, ClientMessage::StartStream { .. });
    }

    #[test]
    fn auth_without_session_id_defaults_to_none() {
        let json = serde_json::json!({"type": "auth", "data": {"api_key": "k"}});
        let msg: ClientMessage = serde_json::from_value(json).unwrap();
        match msg {
            ClientMessage::Auth { api_key, session_id } => {
                assert_eq!(api_key, "k");
                assert_eq!(session_id, None);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn server_message_round_trips_through_json() {
        let msg = ServerMessage::StreamComplete { status: "ok".to_string() };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        matches!(back, ServerMessage::StreamComplete { .. });
    }
}
