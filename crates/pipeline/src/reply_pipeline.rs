//! Top-level coordinator for one utterance (§4.6): schedules the filler,
//! drives the reasoning backend, splits its output into sentences,
//! dispatches TTS jobs, and waits for the ordering gate to drain them in
//! sequence before emitting the conversation pair and stream completion.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::warn;
use voice_agent_core::{is_trivial_reply, DocumentRetriever, Mode, ReasoningBackend, Session, SessionStore, StopSignal, TtsJob, TtsResult, FILLER_SEQUENCE};

use crate::filler;
use crate::ordering_gate;
use crate::sentence_splitter;
use crate::tts::TtsPool;
use crate::PipelineError;

/// Sink for the three outbound message kinds a reply can produce. The
/// server crate implements this over the live connection's wire protocol.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn audio_chunk(&self, result: TtsResult);
    async fn conversation_pair(&self, user_text: String, assistant_text: String);
    async fn stream_complete(&self);
}

pub struct ReplyPipelineInput {
    pub transcript: String,
    pub mode: Mode,
    pub voice: String,
    pub selected_document: Option<String>,
    pub session_id: String,
}

/// Runs one utterance to completion. Always emits `stream_complete` as
/// its final step, regardless of where cancellation cut the work short.
pub async fn run(
    input: ReplyPipelineInput,
    reasoning: Arc<dyn ReasoningBackend>,
    session_store: Arc<dyn SessionStore>,
    tts_pool: Arc<TtsPool>,
    sink: Arc<dyn ReplySink>,
    stop: StopSignal,
    ordering_rx: mpsc::Receiver<TtsResult>,
    retriever: Option<Arc<dyn DocumentRetriever>>,
) -> Result<(), PipelineError> {
    let sink_for_gate = sink.clone();
    let stop_for_gate = stop.clone();
    let gate_started = std::time::Instant::now();
    let gate = tokio::spawn(async move {
        ordering_gate::run(ordering_rx, stop_for_gate, move |result| {
            let sink = sink_for_gate.clone();
            async move {
                sink.audio_chunk(result).await;
                Ok(())
            }
        })
        .await
    });

    if stop.is_cancelled() {
        let _ = gate.await;
        metrics::histogram!("voice_agent_ordering_gate_drain_latency_seconds")
            .record(gate_started.elapsed().as_secs_f64());
        sink.stream_complete().await;
        return Ok(());
    }

    let mut handles = Vec::new();

    if !filler::is_short_greeting(&input.transcript) {
        let filler_text = if matches!(input.mode, Mode::Document) {
            filler::DOCUMENT_FILLER.to_string()
        } else {
            filler::pick_filler(&input.transcript)
        };
        handles.push(tts_pool.dispatch(
            TtsJob {
                sequence_number: FILLER_SEQUENCE,
                sentence_text: filler_text,
                voice: input.voice.clone(),
            },
            stop.clone(),
        ));
    }

    let (_session_key, mut session) = session_store
        .get_or_create(Some(&input.session_id))
        .await
        .map_err(|e| PipelineError::Session(e.to_string()))?;

    let mut sequence = 0u64;
    let mut full_reply = String::new();

    match input.mode {
        Mode::Agent => {
            if stop.is_cancelled() {
                let _ = gate.await;
                metrics::histogram!("voice_agent_ordering_gate_drain_latency_seconds")
                    .record(gate_started.elapsed().as_secs_f64());
                sink.stream_complete().await;
                return Ok(());
            }

            let reasoning_started = std::time::Instant::now();
            let answer = reasoning
                .answer_once(&input.transcript, &session.history, &session.variables)
                .await;
            metrics::histogram!("voice_agent_reasoning_latency_seconds")
                .record(reasoning_started.elapsed().as_secs_f64());
            let (reply_text, next_pending) = answer.map_err(|e| PipelineError::Reasoning(e.to_string()))?;
            session.variables = next_pending;
            full_reply = reply_text;

            if let Err(e) = session_store.save(&input.session_id, session.clone()).await {
                warn!(error = %e, "failed to persist agent pending state");
            }

            let mut buf = full_reply.clone();
            let mut sentences = sentence_splitter::extract_sentences(&mut buf);
            while !sentences.is_empty() {
                dispatch_all(&tts_pool, &mut sequence, &sentences, &input.voice, &stop, &mut handles);
                sentences = sentence_splitter::extract_sentences(&mut buf);
            }
            if let Some(tail) = sentence_splitter::flush_remainder(&mut buf) {
                dispatch_all(&tts_pool, &mut sequence, &[tail], &input.voice, &stop, &mut handles);
            }
        }
        Mode::General | Mode::Document => {
            let mut passages = Vec::new();
            if matches!(input.mode, Mode::Document) {
                if let (Some(retriever), Some(document_id)) = (&retriever, &input.selected_document) {
                    match retriever.retrieve(&input.transcript, document_id).await {
                        Ok(found) => passages = found,
                        Err(e) => warn!(error = %e, "document retrieval failed — answering without context"),
                    }
                }
            }

            let prompt = build_prompt(&session, &input.transcript, &passages);
            let reasoning_started = std::time::Instant::now();
            let stream_result = reasoning.stream_tokens(&prompt).await;
            metrics::histogram!("voice_agent_reasoning_latency_seconds")
                .record(reasoning_started.elapsed().as_secs_f64());
            let mut stream = stream_result.map_err(|e| PipelineError::Reasoning(e.to_string()))?;

            let mut buf = String::new();
            while let Some(token) = stream.next().await {
                if stop.is_cancelled() {
                    break;
                }
                let token = token.map_err(|e| PipelineError::Reasoning(e.to_string()))?;
                full_reply.push_str(&token);
                buf.push_str(&token);

                let mut sentences = sentence_splitter::extract_sentences(&mut buf);
                while !sentences.is_empty() {
                    dispatch_all(&tts_pool, &mut sequence, &sentences, &input.voice, &stop, &mut handles);
                    sentences = sentence_splitter::extract_sentences(&mut buf);
                }
            }

            if !stop.is_cancelled() {
                if let Some(tail) = sentence_splitter::flush_remainder(&mut buf) {
                    dispatch_all(&tts_pool, &mut sequence, &[tail], &input.voice, &stop, &mut handles);
                }
            }
        }
    }

    // Wait for every dispatched synthesis job to finish, then drop the
    // pool so its sender side closes and the gate sees end-of-stream.
    for handle in handles {
        if let Err(join_err) = handle.await {
            warn!(%join_err, "tts worker task panicked");
        }
    }
    drop(tts_pool);

    match gate.await {
        Ok(Err(e)) => warn!(error = %e, "ordering gate ended with an error"),
        Err(join_err) => warn!(%join_err, "ordering gate task panicked"),
        Ok(Ok(())) => {}
    }
    metrics::histogram!("voice_agent_ordering_gate_drain_latency_seconds")
        .record(gate_started.elapsed().as_secs_f64());

    let reply_text = full_reply.trim().to_string();
    if !stop.is_cancelled() && !reply_text.is_empty() && !is_trivial_reply(&reply_text) {
        if let Err(e) = session_store
            .append_exchange(&input.session_id, &input.transcript, &reply_text)
            .await
        {
            warn!(error = %e, "failed to append exchange to session history");
        }
        sink.conversation_pair(input.transcript.clone(), reply_text).await;
    }

    sink.stream_complete().await;
    Ok(())
}

fn dispatch_all(
    tts_pool: &TtsPool,
    sequence: &mut u64,
    sentences: &[String],
    voice: &str,
    stop: &StopSignal,
    handles: &mut Vec<tokio::task::JoinHandle<()>>,
) {
    for sentence in sentences {
        if sentence.trim().is_empty() {
            continue;
        }
        *sequence += 1;
        handles.push(tts_pool.dispatch(
            TtsJob {
                sequence_number: *sequence,
                sentence_text: sentence.clone(),
                voice: voice.to_string(),
            },
            stop.clone(),
        ));
    }
}

fn build_prompt(session: &Session, transcript: &str, passages: &[String]) -> String {
    let mut prompt = String::new();
    if !passages.is_empty() {
        prompt.push_str("Relevant document passages:\n");
        for passage in passages {
            prompt.push_str(&format!("- {passage}\n"));
        }
        prompt.push('\n');
    }
    for exchange in &session.history {
        prompt.push_str(&format!("User: {}\nAssistant: {}\n", exchange.user_text, exchange.assistant_text));
    }
    prompt.push_str(&format!("User: {transcript}\nAssistant:"));
    prompt
}
