//! Adapts `OllamaBackend` to the pipeline-facing `ReasoningBackend` contract.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::sync::mpsc;
use voice_agent_core::{Exchange, ReasoningBackend, Result, TokenStream};

use crate::backend::{LlmBackend, OllamaBackend};
use crate::message::Message;

/// General and document mode both stream tokens from a plain chat
/// completion; they differ only in how the caller builds the prompt
/// passed to `stream_tokens` (document mode folds retrieved passages in
/// before calling this backend, outside of this adapter).
pub struct GeneralReasoningBackend {
    llm: Arc<OllamaBackend>,
    system_prompt: String,
}

impl GeneralReasoningBackend {
    pub fn new(llm: Arc<OllamaBackend>, system_prompt: impl Into<String>) -> Self {
        Self { llm, system_prompt: system_prompt.into() }
    }
}

#[async_trait]
impl ReasoningBackend for GeneralReasoningBackend {
    async fn stream_tokens(&self, prompt: &str) -> Result<TokenStream> {
        let messages = vec![Message::system(self.system_prompt.clone()), Message::user(prompt)];

        let (tx, mut rx) = mpsc::channel::<String>(64);
        let llm = self.llm.clone();
        let messages_owned = messages;

        tokio::spawn(async move {
            if let Err(e) = llm.generate_stream(&messages_owned, tx).await {
                tracing::warn!(error = %e, "llm stream ended with an error");
            }
        });

        let stream: BoxStream<'static, Result<String>> = Box::pin(async_stream::stream! {
            while let Some(token) = rx.recv().await {
                yield Ok(token);
            }
        });

        Ok(stream)
    }

    async fn answer_once(
        &self,
        _query: &str,
        _history: &[Exchange],
        pending: &HashMap<String, serde_json::Value>,
    ) -> Result<(String, HashMap<String, serde_json::Value>)> {
        // General mode never drives the tool-calling loop; the reply
        // pipeline only calls this for `Mode::Agent`, which selects a
        // different `ReasoningBackend` implementation.
        Ok((String::new(), pending.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LlmConfig;

    #[tokio::test]
    async fn general_backend_rejects_answer_once_gracefully() {
        let llm = Arc::new(OllamaBackend::new(LlmConfig::default()).unwrap());
        let backend = GeneralReasoningBackend::new(llm, "you are helpful");
        let pending = HashMap::new();
        let (text, out_pending) = backend.answer_once("hi", &[], &pending).await.unwrap();
        assert!(text.is_empty());
        assert_eq!(out_pending, pending);
    }
}
