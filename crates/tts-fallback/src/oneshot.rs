//! Fallback Orchestrator — one-shot (C5)
//!
//! Iterates backends in health-registry order, retrying each up to
//! `max_retry_per_tts` times, and fails over to the next backend on any
//! recoverable failure. Mirrors the teacher's `chain.rs` pattern of a
//! driver task that owns a channel's send half while the public API
//! returns the receive half wrapped as a stream.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;

use tts_core::{AudioFrame, ConnectOptions, TtsBackend};

use crate::attempt::run_oneshot_attempt;
use crate::config::FallbackAdapterConfig;
use crate::error::{FallbackError, Result};
use crate::health::HealthRegistry;
use crate::resampler::ResamplerGateway;

/// One frame of a one-shot synthesis result.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub frame: AudioFrame,
    pub is_final: bool,
}

/// Runs the one-shot fallback algorithm for `text` and streams the result
/// back through an unbounded channel wrapped as a `Stream`.
pub(crate) fn synthesize(
    backends: Arc<Vec<Arc<dyn TtsBackend>>>,
    health: Arc<HealthRegistry>,
    gateway: Arc<ResamplerGateway>,
    config: Arc<FallbackAdapterConfig>,
    text: String,
    opts: ConnectOptions,
) -> impl Stream<Item = Result<SynthesizedAudio>> {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let outcome = run(&backends, &health, &gateway, &config, &text, &opts, &tx).await;
        if let Err(err) = outcome {
            let _ = tx.send(Err(err));
        }
    });

    UnboundedReceiverStream::new(rx)
}

async fn run(
    backends: &[Arc<dyn TtsBackend>],
    health: &HealthRegistry,
    gateway: &ResamplerGateway,
    config: &FallbackAdapterConfig,
    text: &str,
    opts: &ConnectOptions,
    tx: &mpsc::UnboundedSender<Result<SynthesizedAudio>>,
) -> Result<()> {
    let max_retry = opts.max_retry.unwrap_or_else(|| config.max_retry_per_tts());

    for &index in &health.order() {
        let backend = &backends[index];
        let mut last_failure = None;

        for attempt in 0..=max_retry {
            tracing::debug!(backend = backend.label(), attempt, "tts attempt starting");

            let (frame_tx, mut frame_rx) = mpsc::channel(32);
            let attempt_opts = tts_core::ConnectOptions {
                timeout: opts.timeout,
                max_retry: opts.max_retry,
            };

            let run_fut = run_oneshot_attempt(backend.as_ref(), text, &attempt_opts, gateway, &frame_tx);
            tokio::pin!(run_fut);

            let mut forwarded = false;
            let result = loop {
                tokio::select! {
                    frame = frame_rx.recv() => {
                        match frame {
                            Some(frame) => {
                                forwarded = true;
                                if tx.send(Ok(SynthesizedAudio { frame, is_final: false })).is_err() {
                                    return Ok(());
                                }
                            }
                            None => {}
                        }
                    }
                    outcome = &mut run_fut => break outcome,
                }
            };

            // Drain anything buffered after the attempt future resolved.
            while let Ok(frame) = frame_rx.try_recv() {
                forwarded = true;
                if tx.send(Ok(SynthesizedAudio { frame, is_final: false })).is_err() {
                    return Ok(());
                }
            }

            match result {
                Ok(()) => {
                    if forwarded {
                        health.mark_available(index);
                        let marker = tts_core::AudioFrame::silence(gateway.target_sample_rate(), Duration::from_millis(10));
                        let _ = tx.send(Ok(SynthesizedAudio { frame: marker, is_final: true }));
                        return Ok(());
                    }
                    last_failure = Some(crate::error::AttemptFailure::Empty);
                }
                Err(failure) => {
                    if forwarded {
                        // Already committed to this backend's output; a
                        // mid-stream failure here cannot fail over.
                        return Err(FallbackError::Api(format!(
                            "{} failed after commit",
                            backend.label()
                        )));
                    }
                    last_failure = Some(failure);
                }
            }

            tracing::warn!(
                backend = backend.label(),
                attempt,
                ?last_failure,
                "tts attempt failed"
            );
        }

        health.mark_unavailable(index);
    }

    Err(FallbackError::Connection(
        "all configured backends failed".into(),
    ))
}
