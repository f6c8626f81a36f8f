//! Top-level adapter (§6 External interfaces, §8 Idempotent `aclose`)
//!
//! Wires the Health Registry, Resampler Gateway, Event Bus, and Recovery
//! Prober together behind the two entry points a caller actually uses:
//! `synthesize` and `stream`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_stream::Stream;
use tts_core::{ConnectOptions, TtsBackend};

use crate::config::FallbackAdapterConfig;
use crate::events::{AvailabilityChangedEvent, EventBus};
use crate::health::HealthRegistry;
use crate::oneshot::{self, SynthesizedAudio};
use crate::prober::Prober;
use crate::resampler::ResamplerGateway;
use crate::streaming::{self, SynthesizeStream};
use crate::Result;

/// Presents a single TTS interface backed by an ordered list of fallback
/// providers.
pub struct FallbackAdapter {
    backends: Arc<Vec<Arc<dyn TtsBackend>>>,
    health: Arc<HealthRegistry>,
    gateway: Arc<ResamplerGateway>,
    events: Arc<EventBus>,
    config: Arc<FallbackAdapterConfig>,
    prober: Prober,
    closed: AtomicBool,
}

impl FallbackAdapter {
    pub fn new(config: FallbackAdapterConfig) -> Self {
        let config = Arc::new(config);
        let backends = Arc::new(config.backends().to_vec());
        let events = Arc::new(EventBus::new());
        let health = Arc::new(HealthRegistry::new(backends.len(), events.clone()));
        let gateway = Arc::new(ResamplerGateway::new(config.sample_rate()));

        let prober = Prober::spawn(
            backends.clone(),
            health.clone(),
            config.prober_interval(),
            config.attempt_timeout(),
        );

        Self {
            backends,
            health,
            gateway,
            events,
            config,
            prober,
            closed: AtomicBool::new(false),
        }
    }

    /// Synthesizes `text` in one shot, trying backends in health-registry
    /// order until one commits.
    pub fn synthesize(
        &self,
        text: impl Into<String>,
        opts: ConnectOptions,
    ) -> impl Stream<Item = Result<SynthesizedAudio>> {
        oneshot::synthesize(
            self.backends.clone(),
            self.health.clone(),
            self.gateway.clone(),
            self.config.clone(),
            text.into(),
            opts,
        )
    }

    /// Opens a push-based streaming session.
    pub fn stream(&self, opts: ConnectOptions) -> SynthesizeStream {
        streaming::stream(
            self.backends.clone(),
            self.health.clone(),
            self.gateway.clone(),
            self.config.clone(),
            opts,
        )
    }

    /// Registers a listener for backend availability transitions.
    pub fn on_availability_changed<F>(&self, handler: F)
    where
        F: Fn(AvailabilityChangedEvent) + Send + Sync + 'static,
    {
        self.events.on_availability_changed(handler);
    }

    pub fn is_available(&self, backend_index: usize) -> bool {
        self.health.is_available(backend_index)
    }

    /// Tears the adapter down: stops the recovery prober and releases
    /// every backend. Safe to call more than once.
    pub async fn aclose(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.prober.shutdown().await;
        for backend in self.backends.iter() {
            backend.aclose().await;
        }
    }
}
