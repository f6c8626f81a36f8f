//! Configurable fake backend for tests (§8 Testable properties).
//!
//! Grounded directly on `FakeTTS` in
//! `examples/original_source/tests/test_tts_fallback.py`: a backend whose
//! failure mode, audio length, and artificial delay are all toggleable at
//! runtime, plus a call probe so tests can assert which backends were
//! actually invoked and with what text.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use tts_core::{AudioFrame, BackendStream, ConnectOptions, Error, FrameSource, Result, TtsBackend};

/// What a `FakeTtsBackend` should do on its next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeFailure {
    Connection,
    Api,
}

struct State {
    failure: Option<FakeFailure>,
    audio_duration: Duration,
    /// If set, `recv()` never resolves on its own — it waits on a delay
    /// long enough that any sane test timeout fires first.
    hangs: bool,
}

/// A backend whose behavior is fully controlled by the test driving it.
pub struct FakeTtsBackend {
    label: String,
    sample_rate: u32,
    state: Mutex<State>,
    calls: AtomicUsize,
    call_log: Mutex<Vec<String>>,
}

impl FakeTtsBackend {
    pub fn new(label: impl Into<String>, sample_rate: u32) -> Self {
        Self {
            label: label.into(),
            sample_rate,
            state: Mutex::new(State {
                failure: None,
                audio_duration: Duration::from_secs(5),
                hangs: false,
            }),
            calls: AtomicUsize::new(0),
            call_log: Mutex::new(Vec::new()),
        }
    }

    /// Builds a backend that always errors on connection — convenient for
    /// the common "primary always fails" scenario.
    pub fn always_failing(label: impl Into<String>, sample_rate: u32) -> Self {
        let backend = Self::new(label, sample_rate);
        backend.set_failure(Some(FakeFailure::Connection));
        backend
    }

    pub fn set_failure(&self, failure: Option<FakeFailure>) {
        self.state.lock().failure = failure;
    }

    pub fn set_audio_duration(&self, duration: Duration) {
        self.state.lock().audio_duration = duration;
    }

    pub fn set_hangs(&self, hangs: bool) {
        self.state.lock().hangs = hangs;
    }

    /// Heals this backend: clears any configured failure and restores
    /// normal audio output. Mirrors the original test's "errors cleared"
    /// step in the recovery scenario.
    pub fn heal(&self, audio_duration: Duration) {
        let mut state = self.state.lock();
        state.failure = None;
        state.hangs = false;
        state.audio_duration = audio_duration;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_log(&self) -> Vec<String> {
        self.call_log.lock().clone()
    }

    fn record_call(&self, text: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_log.lock().push(text.to_string());
    }

    fn frames_for(&self, duration: Duration) -> Vec<AudioFrame> {
        const CHUNK: Duration = Duration::from_millis(20);
        let mut remaining = duration;
        let mut frames = Vec::new();
        while remaining > Duration::ZERO {
            let slice = remaining.min(CHUNK);
            let samples = (self.sample_rate as f64 * slice.as_secs_f64()).round() as usize;
            frames.push(AudioFrame::new(vec![100i16; samples.max(1)], self.sample_rate));
            remaining = remaining.saturating_sub(slice);
        }
        frames
    }
}

#[async_trait]
impl TtsBackend for FakeTtsBackend {
    fn label(&self) -> &str {
        &self.label
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    async fn synthesize(&self, text: &str, _opts: ConnectOptions) -> Result<Box<dyn FrameSource>> {
        self.record_call(text);

        let (failure, duration, hangs) = {
            let state = self.state.lock();
            (state.failure, state.audio_duration, state.hangs)
        };

        if let Some(failure) = failure {
            return Err(match failure {
                FakeFailure::Connection => Error::Connection("fake backend configured to fail".into()),
                FakeFailure::Api => Error::Api("fake backend configured to fail".into()),
            });
        }

        let frames = if hangs { Vec::new() } else { self.frames_for(duration) };
        Ok(Box::new(FakeFrameSource { frames: frames.into_iter(), hangs }))
    }

    async fn stream(&self, _opts: ConnectOptions) -> Result<Box<dyn BackendStream>> {
        self.record_call("<stream>");

        let (failure, duration, hangs) = {
            let state = self.state.lock();
            (state.failure, state.audio_duration, state.hangs)
        };

        if let Some(failure) = failure {
            return Err(match failure {
                FakeFailure::Connection => Error::Connection("fake backend configured to fail".into()),
                FakeFailure::Api => Error::Api("fake backend configured to fail".into()),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Box::new(FakeBackendStream {
            sample_rate: self.sample_rate,
            default_duration: duration,
            hangs,
            tx: Some(tx),
            rx,
        }))
    }

    async fn aclose(&self) {}
}

struct FakeFrameSource {
    frames: std::vec::IntoIter<AudioFrame>,
    hangs: bool,
}

#[async_trait]
impl FrameSource for FakeFrameSource {
    async fn recv(&mut self) -> Option<Result<AudioFrame>> {
        if self.hangs {
            // Never resolves; the caller's timeout is expected to fire.
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.frames.next().map(Ok)
    }
}

/// Backend-side half of a fake streaming session. Every `push_text` (or
/// the implicit segment kicked off by the first `flush`) synthesizes a
/// fixed-duration clip, mirroring `FakeTTS`'s behavior of treating each
/// pushed segment as an independent one-shot synthesis under the hood.
struct FakeBackendStream {
    sample_rate: u32,
    default_duration: Duration,
    hangs: bool,
    /// `None` once `end_input` has closed the backend-side channel.
    tx: Option<mpsc::UnboundedSender<AudioFrame>>,
    rx: mpsc::UnboundedReceiver<AudioFrame>,
}

impl FakeBackendStream {
    fn emit_segment(&mut self) {
        if self.hangs {
            return;
        }
        let Some(tx) = &self.tx else { return };
        const CHUNK: Duration = Duration::from_millis(20);
        let mut remaining = self.default_duration;
        while remaining > Duration::ZERO {
            let slice = remaining.min(CHUNK);
            let samples = (self.sample_rate as f64 * slice.as_secs_f64()).round() as usize;
            let _ = tx.send(AudioFrame::new(vec![100i16; samples.max(1)], self.sample_rate));
            remaining = remaining.saturating_sub(slice);
        }
    }
}

#[async_trait]
impl BackendStream for FakeBackendStream {
    fn push_text(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }

    /// Each `flush()` synthesizes one fixed-duration segment, mirroring
    /// the original `FakeTTS`'s per-segment one-shot behavior.
    fn flush(&mut self) -> Result<()> {
        self.emit_segment();
        Ok(())
    }

    fn end_input(&mut self) -> Result<()> {
        self.emit_segment();
        self.tx = None;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<AudioFrame>> {
        if self.hangs {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.rx.recv().await.map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls_and_text() {
        let backend = FakeTtsBackend::new("fake", 16000);
        let _ = backend.synthesize("hello", ConnectOptions::default()).await;
        assert_eq!(backend.call_count(), 1);
        assert_eq!(backend.call_log(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn configured_failure_is_returned() {
        let backend = FakeTtsBackend::always_failing("fake", 16000);
        let result = backend.synthesize("hello", ConnectOptions::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn produces_requested_audio_duration() {
        let backend = FakeTtsBackend::new("fake", 16000);
        backend.set_audio_duration(Duration::from_millis(40));
        let mut source = backend.synthesize("hi", ConnectOptions::default()).await.unwrap();
        let mut total = 0usize;
        while let Some(Ok(frame)) = source.recv().await {
            total += frame.samples().len();
        }
        assert_eq!(total, (16000.0 * 0.040) as usize);
    }
}
