//! Synthesis Attempt Engine (C4)
//!
//! Runs a single attempt against a single backend: enforces the timeout
//! budget, resamples through the gateway, and withholds everything from
//! the caller until the first non-empty frame arrives (the "commit"
//! moment — §4.4, §9). Shared between the one-shot orchestrator (which
//! drives a `FrameSource` end to end) and the streaming orchestrator
//! (which drives a live `BackendStream` and needs the same commit/resample
//! bookkeeping per pushed segment).

use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::timeout as tokio_timeout;

use tts_core::{AudioFrame, ConnectOptions, FrameSource, TtsBackend};

use crate::error::AttemptFailure;
use crate::resampler::{AttemptResampler, ResamplerGateway};

/// Per-attempt commit and resample bookkeeping, reusable by both
/// orchestrators.
pub(crate) struct AttemptSink {
    resampler: Option<AttemptResampler>,
    committed: bool,
}

impl AttemptSink {
    pub(crate) fn new(gateway: &ResamplerGateway, source_rate: u32) -> Self {
        Self {
            resampler: gateway.for_attempt(source_rate),
            committed: false,
        }
    }

    pub(crate) fn committed(&self) -> bool {
        self.committed
    }

    /// Accepts one raw upstream frame, returns whatever output frames
    /// should be released downstream right now (empty until committed).
    pub(crate) fn accept(&mut self, frame: AudioFrame) -> Vec<AudioFrame> {
        let produced = match &mut self.resampler {
            Some(r) => r.push(&frame),
            None => vec![frame],
        };

        if self.committed {
            return produced;
        }

        let mut out = Vec::with_capacity(produced.len());
        for frame in produced {
            if !self.committed {
                if frame.is_empty() {
                    continue;
                }
                self.committed = true;
            }
            out.push(frame);
        }
        out
    }

    /// Flushes any resampler tail. Only meaningful to call once, at
    /// attempt end.
    pub(crate) fn finish(self) -> Option<AudioFrame> {
        self.resampler.and_then(|r| r.flush())
    }
}

/// Runs one full one-shot attempt against `backend`, forwarding committed
/// frames to `out` as they're produced. Returns `Ok(())` on a committed,
/// cleanly-ended attempt, `Err` with a classification otherwise.
///
/// A failure returned *after* `out` has already received frames means the
/// caller has already committed to this backend's output — see
/// `AttemptSink::committed` for how callers should interpret a partial
/// send followed by an error.
pub(crate) async fn run_oneshot_attempt(
    backend: &dyn TtsBackend,
    text: &str,
    opts: &ConnectOptions,
    gateway: &ResamplerGateway,
    out: &mpsc::Sender<AudioFrame>,
) -> Result<(), AttemptFailure> {
    let deadline = Instant::now() + opts.timeout;

    let mut source: Box<dyn FrameSource> = match tokio_timeout(opts.timeout, backend.synthesize(text, opts.clone())).await {
        Err(_) => return Err(AttemptFailure::Timeout),
        Ok(Err(_)) => return Err(AttemptFailure::Connection),
        Ok(Ok(source)) => source,
    };

    let mut sink = AttemptSink::new(gateway, backend.sample_rate());

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(AttemptFailure::Timeout);
        }

        match tokio_timeout(remaining, source.recv()).await {
            Err(_) => return Err(AttemptFailure::Timeout),
            Ok(None) => break,
            Ok(Some(Err(_))) => return Err(AttemptFailure::Connection),
            Ok(Some(Ok(frame))) => {
                for frame in sink.accept(frame) {
                    if out.send(frame).await.is_err() {
                        // Caller dropped the stream; nothing left to do.
                        return Ok(());
                    }
                }
            }
        }
    }

    if !sink.committed() {
        return Err(AttemptFailure::Empty);
    }

    if let Some(tail) = sink.finish() {
        let _ = out.send(tail).await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resampler::ResamplerGateway;

    #[test]
    fn sink_withholds_until_first_nonempty_frame() {
        let gateway = ResamplerGateway::new(16000);
        let mut sink = AttemptSink::new(&gateway, 16000);

        let out = sink.accept(AudioFrame::new(vec![], 16000));
        assert!(out.is_empty());
        assert!(!sink.committed());

        let out = sink.accept(AudioFrame::new(vec![1, 2, 3], 16000));
        assert_eq!(out.len(), 1);
        assert!(sink.committed());
    }

    #[test]
    fn sink_passes_through_once_committed() {
        let gateway = ResamplerGateway::new(16000);
        let mut sink = AttemptSink::new(&gateway, 16000);

        sink.accept(AudioFrame::new(vec![1], 16000));
        let out = sink.accept(AudioFrame::new(vec![], 16000));
        // Once committed, subsequent frames (even empty ones) pass through
        // directly rather than being re-buffered.
        assert_eq!(out.len(), 1);
    }
}
