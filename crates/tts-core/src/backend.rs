//! The backend contract (C1)
//!
//! A backend offers two ways to produce audio: a one-shot `synthesize`
//! call, and an incremental `stream` duplex that the caller feeds text
//! into as it becomes available. Both report frames through a pull-based
//! [`FrameSource`] rather than a `futures::Stream` impl, since backends are
//! commonly implemented over callback-driven SDKs (see the module docs on
//! marshalling in `tts-fallback`) where a recv-style interface is the
//! natural fit.

use async_trait::async_trait;
use std::time::Duration;

use crate::audio::AudioFrame;
use crate::error::Result;

/// Per-call connection parameters.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Wall-clock budget for a single attempt.
    pub timeout: Duration,
    /// Adapter-level ceiling on retries for this call, overriding the
    /// adapter's configured `max_retry_per_tts` when set.
    pub max_retry: Option<usize>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retry: None,
        }
    }
}

/// Pull side of a backend's frame production.
///
/// `recv` returns `None` once the backend has finished producing frames
/// for this call (clean end, not a failure).
#[async_trait]
pub trait FrameSource: Send {
    async fn recv(&mut self) -> Option<Result<AudioFrame>>;
}

/// Push/pull duplex for incremental synthesis.
///
/// `push_text`/`flush`/`end_input` are synchronous and non-blocking per the
/// adapter's concurrency model (§5): backends that need to apply
/// backpressure should buffer internally rather than block the caller.
#[async_trait]
pub trait BackendStream: Send {
    fn push_text(&mut self, text: &str) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn end_input(&mut self) -> Result<()>;
    async fn recv(&mut self) -> Option<Result<AudioFrame>>;
}

/// A concrete text-to-speech backend.
#[async_trait]
pub trait TtsBackend: Send + Sync + 'static {
    /// Stable human-readable handle, used in logs and health tracking.
    fn label(&self) -> &str;

    /// Sample rate this backend produces audio at.
    fn sample_rate(&self) -> u32;

    /// Whether `stream` is meaningfully supported. Backends that only
    /// support one-shot synthesis can fall back to buffering pushed text
    /// and flushing it as a single `synthesize` call, but should report
    /// `false` here so callers can plan accordingly.
    fn supports_streaming(&self) -> bool {
        true
    }

    async fn synthesize(&self, text: &str, opts: ConnectOptions) -> Result<Box<dyn FrameSource>>;

    async fn stream(&self, opts: ConnectOptions) -> Result<Box<dyn BackendStream>>;

    /// Release any backend-held resources (connections, native handles).
    /// Must be safe to call multiple times.
    async fn aclose(&self);
}
