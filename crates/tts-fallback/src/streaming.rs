//! Streaming Fallback Orchestrator (C6)
//!
//! Text arrives incrementally via `push_text`/`flush`/`end_input`. A
//! single backend is "active" per segment; on failure before the segment
//! has committed, the orchestrator opens the next backend and replays the
//! segment's buffered text. Once a segment has committed to a backend, a
//! later failure on that backend can no longer fail over — the segment
//! simply errors out, since already-emitted audio can't be revoked.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use uuid::Uuid;

use tts_core::{AudioFrame, BackendStream, ConnectOptions, TtsBackend};

use crate::attempt::AttemptSink;
use crate::config::FallbackAdapterConfig;
use crate::error::{FallbackError, Result};
use crate::health::HealthRegistry;
use crate::resampler::ResamplerGateway;

/// One frame of a streaming synthesis result.
#[derive(Debug, Clone)]
pub struct StreamedAudio {
    pub frame: AudioFrame,
    pub is_final: bool,
    pub segment_id: Uuid,
}

/// Commands the caller-facing handle sends to the driver task.
enum Command {
    PushText(String),
    Flush,
    EndInput,
}

/// Caller-facing handle returned by `FallbackAdapter::stream`.
pub struct SynthesizeStream {
    commands: mpsc::UnboundedSender<Command>,
    output: UnboundedReceiverStream<Result<StreamedAudio>>,
}

impl SynthesizeStream {
    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.commands.send(Command::PushText(text.into()));
    }

    pub fn flush(&self) {
        let _ = self.commands.send(Command::Flush);
    }

    pub fn end_input(&self) {
        let _ = self.commands.send(Command::EndInput);
    }
}

impl Stream for SynthesizeStream {
    type Item = Result<StreamedAudio>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        std::pin::Pin::new(&mut self.output).poll_next(cx)
    }
}

/// One accumulated span of pushed text, terminated by `flush`/`end_input`.
struct Segment {
    id: Uuid,
    replay_text: String,
    committed: bool,
}

impl Segment {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            replay_text: String::new(),
            committed: false,
        }
    }
}

pub(crate) fn stream(
    backends: Arc<Vec<Arc<dyn TtsBackend>>>,
    health: Arc<HealthRegistry>,
    gateway: Arc<ResamplerGateway>,
    config: Arc<FallbackAdapterConfig>,
    opts: ConnectOptions,
) -> SynthesizeStream {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();

    tokio::spawn(driver(backends, health, gateway, config, opts, cmd_rx, out_tx));

    SynthesizeStream {
        commands: cmd_tx,
        output: UnboundedReceiverStream::new(out_rx),
    }
}

async fn driver(
    backends: Arc<Vec<Arc<dyn TtsBackend>>>,
    health: Arc<HealthRegistry>,
    gateway: Arc<ResamplerGateway>,
    config: Arc<FallbackAdapterConfig>,
    opts: ConnectOptions,
    mut commands: mpsc::UnboundedReceiver<Command>,
    out: mpsc::UnboundedSender<Result<StreamedAudio>>,
) {
    let order = health.order();
    let max_retry = opts.max_retry.unwrap_or_else(|| config.max_retry_per_tts());

    let mut segment = Segment::new();
    let mut order_idx = 0usize;
    let mut active = match open_backend(&backends, &health, &order, &mut order_idx, &opts, max_retry).await {
        Some(active) => active,
        None => {
            let _ = out.send(Err(FallbackError::Connection(
                "all configured backends failed to open a stream".into(),
            )));
            return;
        }
    };
    let mut sink = AttemptSink::new(&gateway, backends[order[order_idx]].sample_rate());

    loop {
        tokio::select! {
            cmd = commands.recv() => {
                match cmd {
                    None | Some(Command::EndInput) => {
                        loop {
                            let _ = active.end_input();
                            match drain_until_end(&mut active, &mut sink, &segment, &out).await {
                                DrainOutcome::OutputClosed => return,
                                DrainOutcome::Clean => {
                                    finalize_segment(&gateway, sink, &segment, &out);
                                    return;
                                }
                                DrainOutcome::Failed => {
                                    if segment.committed {
                                        let _ = out.send(Err(FallbackError::Api(
                                            "backend failed after segment commit".into(),
                                        )));
                                        return;
                                    }
                                    if !failover(
                                        &backends, &health, &order, &mut order_idx, &opts, max_retry,
                                        &mut active, &gateway, &mut sink, &segment, &out,
                                    ).await {
                                        return;
                                    }
                                    // Re-issue end_input against the newly opened backend.
                                }
                            }
                        }
                    }
                    Some(Command::Flush) => {
                        loop {
                            let _ = active.flush();
                            match drain_until_segment_end(&mut active, &mut sink, &segment, &out).await {
                                DrainOutcome::OutputClosed => return,
                                DrainOutcome::Clean => {
                                    finalize_segment(&gateway, sink, &segment, &out);
                                    segment = Segment::new();
                                    sink = AttemptSink::new(&gateway, backends[order[order_idx]].sample_rate());
                                    break;
                                }
                                DrainOutcome::Failed => {
                                    if segment.committed {
                                        let _ = out.send(Err(FallbackError::Api(
                                            "backend failed after segment commit".into(),
                                        )));
                                        return;
                                    }
                                    if !failover(
                                        &backends, &health, &order, &mut order_idx, &opts, max_retry,
                                        &mut active, &gateway, &mut sink, &segment, &out,
                                    ).await {
                                        return;
                                    }
                                    // Re-issue flush against the newly opened backend.
                                }
                            }
                        }
                    }
                    Some(Command::PushText(text)) => {
                        segment.replay_text.push_str(&text);
                        if active.push_text(&text).is_err() {
                            if !failover(
                                &backends, &health, &order, &mut order_idx, &opts, max_retry,
                                &mut active, &gateway, &mut sink, &segment, &out,
                            ).await {
                                return;
                            }
                        }
                    }
                }
            }
            frame = active.recv() => {
                match frame {
                    Some(Ok(frame)) => {
                        for frame in sink.accept(frame) {
                            if out.send(Ok(StreamedAudio { frame, is_final: false, segment_id: segment.id })).is_err() {
                                return;
                            }
                        }
                        if sink.committed() {
                            segment.committed = true;
                        }
                    }
                    Some(Err(_)) | None => {
                        if segment.committed {
                            let _ = out.send(Err(FallbackError::Api(
                                "backend failed after segment commit".into(),
                            )));
                            return;
                        }
                        if !failover(
                            &backends, &health, &order, &mut order_idx, &opts, max_retry,
                            &mut active, &gateway, &mut sink, &segment, &out,
                        ).await {
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Opens a stream against the next not-yet-tried backend in `order`,
/// retrying each up to `max_retry` times before moving on. Returns `None`
/// if every backend is exhausted.
async fn open_backend(
    backends: &[Arc<dyn TtsBackend>],
    health: &HealthRegistry,
    order: &[usize],
    order_idx: &mut usize,
    opts: &ConnectOptions,
    max_retry: usize,
) -> Option<Box<dyn BackendStream>> {
    while *order_idx < order.len() {
        let index = order[*order_idx];
        let backend = &backends[index];

        for attempt in 0..=max_retry {
            match tokio::time::timeout(opts.timeout, backend.stream(opts.clone())).await {
                Ok(Ok(stream)) => return Some(stream),
                Ok(Err(err)) => {
                    tracing::warn!(backend = backend.label(), attempt, %err, "failed to open tts stream");
                }
                Err(_) => {
                    tracing::warn!(backend = backend.label(), attempt, "timed out opening tts stream");
                }
            }
        }

        health.mark_unavailable(index);
        *order_idx += 1;
    }
    None
}

/// Called when the active backend fails before the current segment
/// committed: marks it down, opens the next backend, and replays the
/// segment's buffered text into it.
#[allow(clippy::too_many_arguments)]
async fn failover(
    backends: &[Arc<dyn TtsBackend>],
    health: &HealthRegistry,
    order: &[usize],
    order_idx: &mut usize,
    opts: &ConnectOptions,
    max_retry: usize,
    active: &mut Box<dyn BackendStream>,
    gateway: &ResamplerGateway,
    sink: &mut AttemptSink,
    segment: &Segment,
    out: &mpsc::UnboundedSender<Result<StreamedAudio>>,
) -> bool {
    health.mark_unavailable(order[*order_idx]);
    *order_idx += 1;

    match open_backend(backends, health, order, order_idx, opts, max_retry).await {
        Some(mut next) => {
            if !segment.replay_text.is_empty() {
                let _ = next.push_text(&segment.replay_text);
            }
            *active = next;
            *sink = AttemptSink::new(gateway, backends[order[*order_idx]].sample_rate());
            true
        }
        None => {
            let _ = out.send(Err(FallbackError::Connection(
                "all configured backends failed".into(),
            )));
            false
        }
    }
}

/// Outcome of draining an active backend up to a segment boundary.
enum DrainOutcome {
    /// The backend ended cleanly; the segment is done.
    Clean,
    /// The backend errored before the boundary was reached. Pre-commit,
    /// the caller should fail over; post-commit, it should surface the
    /// error and give up on this segment.
    Failed,
    /// The output receiver has gone away; nothing left to do.
    OutputClosed,
}

/// Drains frames until the active backend reports a clean end (used after
/// `end_input`, which permanently closes the backend-side stream).
async fn drain_until_end(
    active: &mut Box<dyn BackendStream>,
    sink: &mut AttemptSink,
    segment: &Segment,
    out: &mpsc::UnboundedSender<Result<StreamedAudio>>,
) -> DrainOutcome {
    loop {
        match active.recv().await {
            Some(Ok(frame)) => {
                for frame in sink.accept(frame) {
                    if out
                        .send(Ok(StreamedAudio { frame, is_final: false, segment_id: segment.id }))
                        .is_err()
                    {
                        return DrainOutcome::OutputClosed;
                    }
                }
            }
            Some(Err(_)) => return DrainOutcome::Failed,
            None => return DrainOutcome::Clean,
        }
    }
}

/// Drains frames up to the segment boundary marked by `flush()`. Unlike
/// `end_input`, a plain `flush()` doesn't close the backend-side stream —
/// there is no contractual signal for "this segment's audio is fully
/// produced" — so this keeps draining until a short quiescent window
/// passes with nothing new arriving.
const SEGMENT_QUIESCENCE: Duration = Duration::from_millis(50);

async fn drain_until_segment_end(
    active: &mut Box<dyn BackendStream>,
    sink: &mut AttemptSink,
    segment: &Segment,
    out: &mpsc::UnboundedSender<Result<StreamedAudio>>,
) -> DrainOutcome {
    loop {
        match tokio::time::timeout(SEGMENT_QUIESCENCE, active.recv()).await {
            Ok(Some(Ok(frame))) => {
                for frame in sink.accept(frame) {
                    if out
                        .send(Ok(StreamedAudio { frame, is_final: false, segment_id: segment.id }))
                        .is_err()
                    {
                        return DrainOutcome::OutputClosed;
                    }
                }
            }
            Ok(Some(Err(_))) => return DrainOutcome::Failed,
            Ok(None) | Err(_) => return DrainOutcome::Clean,
        }
    }
}

fn finalize_segment(
    gateway: &ResamplerGateway,
    sink: AttemptSink,
    segment: &Segment,
    out: &mpsc::UnboundedSender<Result<StreamedAudio>>,
) {
    if !sink.committed() {
        let _ = out.send(Err(FallbackError::Connection(
            "segment produced no audio from any backend".into(),
        )));
        return;
    }

    if let Some(tail) = sink.finish() {
        let _ = out.send(Ok(StreamedAudio { frame: tail, is_final: false, segment_id: segment.id }));
    }

    let marker = AudioFrame::silence(gateway.target_sample_rate(), Duration::from_millis(10));
    let _ = out.send(Ok(StreamedAudio { frame: marker, is_final: true, segment_id: segment.id }));
}
