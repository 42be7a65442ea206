//! The capability contract the Reply Pipeline depends on (§9, "Dynamic
//! dispatch across modes"). The three concrete reasoning strategies differ
//! wildly in implementation (plain chat completion, retrieval-augmented
//! completion, a tool-calling loop) but the pipeline only ever needs one of
//! two shapes from whichever is selected for the connection's `Mode`.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::conversation::Exchange;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    General,
    Document,
    Agent,
}

impl Mode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "general" => Some(Self::General),
            "document" => Some(Self::Document),
            "agent" => Some(Self::Agent),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Document => "document",
            Self::Agent => "agent",
        }
    }
}

pub type TokenStream = BoxStream<'static, Result<String>>;

/// A reasoning strategy. General and document mode drive the reply pipeline
/// through `stream_tokens`; agent mode through `answer_once`. A single
/// connection selects one concrete implementation per `Mode`.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Streams response tokens for a fully-built prompt (history + retrieval
    /// context, if any, already folded in by the caller).
    async fn stream_tokens(&self, prompt: &str) -> Result<TokenStream>;

    /// Runs one synchronous turn of a tool-using loop and returns the final
    /// reply text plus the updated `variables` map for cross-turn state
    /// (e.g. a pending multi-turn booking, per the glossary).
    async fn answer_once(
        &self,
        query: &str,
        history: &[Exchange],
        pending: &HashMap<String, serde_json::Value>,
    ) -> Result<(String, HashMap<String, serde_json::Value>)>;
}
