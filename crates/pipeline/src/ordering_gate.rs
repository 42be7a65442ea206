//! Re-serializes out-of-order TTS results back into strict sequence before
//! they reach the wire (§4.4).
//!
//! Sentences are synthesized concurrently by the TTS worker pool and can
//! complete in any order. The gate buffers early arrivals in `pending` and
//! only emits once the run of consecutive sequence numbers starting at
//! `next_to_emit` is unbroken. Sequence 0 is reserved for the filler
//! utterance and is only ever emitted once, before the first real sentence
//! arrives.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use voice_agent_core::{StopSignal, TtsResult, FILLER_SEQUENCE};

use crate::PipelineError;

/// Grace window the gate waits over a missing sequence number before
/// giving up on it and advancing past the gap (§5, §9).
pub const GAP_GRACE: Duration = Duration::from_millis(100);

/// Consumes completed [`TtsResult`]s from `incoming` and calls `emit` for
/// each one in strict ascending sequence order.
///
/// `emit` is invoked with ownership of the result; it is expected to push
/// the audio chunk out over the connection. Returns once `incoming` is
/// closed or `stop` is observed.
pub async fn run<F, Fut>(
    mut incoming: mpsc::Receiver<TtsResult>,
    stop: StopSignal,
    mut emit: F,
) -> Result<(), PipelineError>
where
    F: FnMut(TtsResult) -> Fut,
    Fut: std::future::Future<Output = Result<(), PipelineError>>,
{
    let mut pending: HashMap<u64, TtsResult> = HashMap::new();
    let mut next_to_emit: u64 = 1;
    let mut filler_emitted = false;
    let mut first_real_arrived = false;
    let mut gap_deadline: Option<Instant> = None;
    let mut closed = false;

    loop {
        if stop.is_cancelled() {
            return Ok(());
        }

        if closed {
            // `incoming` is closed and done draining would otherwise make
            // `recv()` win every race immediately, so once closed we stop
            // selecting on it and just wait out any still-open gap.
            if pending.is_empty() {
                return Ok(());
            }
            let deadline = gap_deadline.expect("non-empty pending implies an open gap deadline");
            tokio::select! {
                _ = stop.cancelled() => return Ok(()),
                _ = tokio::time::sleep(deadline.saturating_duration_since(Instant::now())) => {
                    next_to_emit += 1;
                }
            }
        } else {
            let recv_timeout = gap_deadline
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::from_millis(50));

            tokio::select! {
                _ = stop.cancelled() => return Ok(()),
                r = incoming.recv() => {
                    match r {
                        Some(result) => {
                            if result.sequence_number == FILLER_SEQUENCE {
                                if !first_real_arrived && !filler_emitted {
                                    emit(result).await?;
                                    filler_emitted = true;
                                }
                                continue;
                            }

                            if result.sequence_number == 1 {
                                first_real_arrived = true;
                            }

                            pending.insert(result.sequence_number, result);
                        }
                        None => closed = true,
                    }
                }
                _ = tokio::time::sleep(recv_timeout), if gap_deadline.is_some() => {
                    // Grace period over the gap at `next_to_emit` elapsed; skip it.
                    next_to_emit += 1;
                }
            }
        }

        while let Some(next) = pending.remove(&next_to_emit) {
            if stop.is_cancelled() {
                return Ok(());
            }
            emit(next).await?;
            next_to_emit += 1;
        }

        gap_deadline = if pending.is_empty() || pending.contains_key(&next_to_emit) {
            None
        } else {
            Some(Instant::now() + GAP_GRACE)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_agent_core::WordTiming;

    fn result(seq: u64, text: &str) -> TtsResult {
        TtsResult {
            sequence_number: seq,
            sentence_text: text.to_string(),
            audio_bytes: vec![1, 2, 3],
            word_timings: Vec::<WordTiming>::new(),
        }
    }

    #[tokio::test]
    async fn emits_in_strict_order_despite_arrival_order() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(result(2, "second")).await.unwrap();
        tx.send(result(1, "first")).await.unwrap();
        tx.send(result(3, "third")).await.unwrap();
        drop(tx);

        let order = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let order2 = order.clone();
        run(rx, StopSignal::new(), move |r| {
            let order = order2.clone();
            async move {
                order.lock().push(r.sequence_number);
                Ok(())
            }
        })
        .await
        .unwrap();

        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn filler_is_suppressed_once_first_real_sentence_arrives() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(result(1, "first")).await.unwrap();
        tx.send(result(FILLER_SEQUENCE, "filler")).await.unwrap();
        drop(tx);

        let order = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let order2 = order.clone();
        run(rx, StopSignal::new(), move |r| {
            let order = order2.clone();
            async move {
                order.lock().push(r.sequence_number);
                Ok(())
            }
        })
        .await
        .unwrap();

        assert_eq!(*order.lock(), vec![1]);
    }

    #[tokio::test]
    async fn missing_sequence_is_flushed_after_the_grace_period() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(result(1, "first")).await.unwrap();
        tx.send(result(3, "third")).await.unwrap();
        drop(tx); // seq 2 never arrives — simulates a skipped synthesis slot

        let order = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let order2 = order.clone();
        let outcome = tokio::time::timeout(
            GAP_GRACE + Duration::from_millis(200),
            run(rx, StopSignal::new(), move |r| {
                let order = order2.clone();
                async move {
                    order.lock().push(r.sequence_number);
                    Ok(())
                }
            }),
        )
        .await;

        assert!(outcome.is_ok(), "gate should return once the gap grace period elapses");
        outcome.unwrap().unwrap();
        assert_eq!(*order.lock(), vec![1, 3]);
    }

    #[tokio::test]
    async fn stop_signal_halts_emission() {
        let (tx, rx) = mpsc::channel(8);
        let stop = StopSignal::new();
        tx.send(result(1, "first")).await.unwrap();
        stop.cancel();
        drop(tx);

        let emitted = std::sync::Arc::new(parking_lot::Mutex::new(0usize));
        let emitted2 = emitted.clone();
        run(rx, stop, move |_| {
            let emitted = emitted2.clone();
            async move {
                *emitted.lock() += 1;
                Ok(())
            }
        })
        .await
        .unwrap();

        assert_eq!(*emitted.lock(), 0);
    }
}
