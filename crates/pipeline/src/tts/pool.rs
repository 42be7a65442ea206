//! Bounded pool of concurrent synthesis workers.
//!
//! Jobs are dispatched as they arrive (sentences stream in one at a time
//! from the splitter); a semaphore caps how many synthesis calls are
//! in flight. Each completed result is pushed to the ordering gate's
//! input channel tagged with its sequence number, unless the stop signal
//! fired before or during synthesis.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, warn};
use voice_agent_core::{StopSignal, TtsJob, TtsResult};

use crate::PipelineError;

/// The external synthesizer collaborator: sentence + voice in, audio +
/// per-word timings out.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, job: &TtsJob) -> Result<TtsResult, PipelineError>;
}

/// Dispatches [`TtsJob`]s onto a bounded set of concurrent workers.
pub struct TtsPool {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    semaphore: Arc<Semaphore>,
    results: mpsc::Sender<TtsResult>,
}

impl TtsPool {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        pool_size: usize,
        results: mpsc::Sender<TtsResult>,
    ) -> Self {
        Self {
            synthesizer,
            semaphore: Arc::new(Semaphore::new(pool_size.max(1))),
            results,
        }
    }

    /// Spawns a worker for this job and returns its handle so the caller
    /// can wait for all dispatched jobs to finish before closing out the
    /// reply (step 5 of §4.6).
    pub fn dispatch(&self, job: TtsJob, stop: StopSignal) -> tokio::task::JoinHandle<()> {
        if stop.is_cancelled() {
            return tokio::spawn(async {});
        }

        let synthesizer = self.synthesizer.clone();
        let semaphore = self.semaphore.clone();
        let results = self.results.clone();

        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };

            if stop.is_cancelled() {
                return;
            }

            let sequence_number = job.sequence_number;
            let started = std::time::Instant::now();
            match synthesizer.synthesize(&job).await {
                Ok(result) => {
                    metrics::histogram!("voice_agent_tts_job_latency_seconds")
                        .record(started.elapsed().as_secs_f64());
                    if stop.is_cancelled() {
                        return;
                    }
                    if results.send(result).await.is_err() {
                        warn!(sequence_number, "ordering gate channel closed");
                    }
                }
                Err(err) => {
                    error!(sequence_number, %err, "tts synthesis failed — sequence slot skipped");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_agent_core::WordTiming;

    struct EchoSynthesizer;

    #[async_trait]
    impl SpeechSynthesizer for EchoSynthesizer {
        async fn synthesize(&self, job: &TtsJob) -> Result<TtsResult, PipelineError> {
            Ok(TtsResult {
                sequence_number: job.sequence_number,
                sentence_text: job.sentence_text.clone(),
                audio_bytes: vec![0u8; 4],
                word_timings: Vec::<WordTiming>::new(),
            })
        }
    }

    struct FailingSynthesizer;

    #[async_trait]
    impl SpeechSynthesizer for FailingSynthesizer {
        async fn synthesize(&self, _job: &TtsJob) -> Result<TtsResult, PipelineError> {
            Err(PipelineError::Synthesizer("boom".into()))
        }
    }

    #[tokio::test]
    async fn dispatched_job_reaches_results_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let pool = TtsPool::new(Arc::new(EchoSynthesizer), 2, tx);
        pool.dispatch(
            TtsJob {
                sequence_number: 1,
                sentence_text: "hello".into(),
                voice: "v1".into(),
            },
            StopSignal::new(),
        );
        let result = rx.recv().await.unwrap();
        assert_eq!(result.sequence_number, 1);
    }

    #[tokio::test]
    async fn cancelled_job_is_not_dispatched() {
        let (tx, mut rx) = mpsc::channel(4);
        let pool = TtsPool::new(Arc::new(EchoSynthesizer), 2, tx);
        let stop = StopSignal::new();
        stop.cancel();
        pool.dispatch(
            TtsJob {
                sequence_number: 1,
                sentence_text: "hello".into(),
                voice: "v1".into(),
            },
            stop,
        );
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_synthesis_skips_the_sequence_slot() {
        let (tx, mut rx) = mpsc::channel(4);
        let pool = TtsPool::new(Arc::new(FailingSynthesizer), 2, tx);
        pool.dispatch(
            TtsJob {
                sequence_number: 1,
                sentence_text: "hello".into(),
                voice: "v1".into(),
            },
            StopSignal::new(),
        );
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }
}
