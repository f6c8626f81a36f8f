//! Recovery Prober (C7)
//!
//! A long-lived background task, one per adapter, that periodically
//! retries every backend the Health Registry currently reports
//! unavailable with a minimal synthetic probe. A backend that answers is
//! flipped back to available; see §4.7.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tts_core::{ConnectOptions, TtsBackend};

use crate::health::HealthRegistry;

const PROBE_TEXT: &str = "The quick brown fox.";

pub(crate) struct Prober {
    shutdown: Arc<Notify>,
}

impl Prober {
    pub(crate) fn spawn(
        backends: Arc<Vec<Arc<dyn TtsBackend>>>,
        health: Arc<HealthRegistry>,
        interval: Duration,
        attempt_timeout: Duration,
    ) -> Self {
        let shutdown = Arc::new(Notify::new());
        let shutdown_rx = shutdown.clone();

        tokio::spawn(async move {
            run(backends, health, interval, attempt_timeout, shutdown_rx).await;
        });

        Self { shutdown }
    }

    /// Stops the prober. Safe to call more than once.
    pub(crate) async fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

async fn run(
    backends: Arc<Vec<Arc<dyn TtsBackend>>>,
    health: Arc<HealthRegistry>,
    interval: Duration,
    attempt_timeout: Duration,
    shutdown: Arc<Notify>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                tracing::debug!("recovery prober shutting down");
                return;
            }
            _ = ticker.tick() => {
                probe_unavailable(&backends, &health, attempt_timeout).await;
            }
        }
    }
}

async fn probe_unavailable(backends: &[Arc<dyn TtsBackend>], health: &HealthRegistry, timeout: Duration) {
    for (index, backend) in backends.iter().enumerate() {
        if health.is_available(index) {
            continue;
        }

        let opts = ConnectOptions {
            timeout,
            max_retry: None,
        };

        let probed = match tokio::time::timeout(timeout, backend.synthesize(PROBE_TEXT, opts)).await {
            Ok(Ok(mut source)) => {
                matches!(tokio::time::timeout(timeout, source.recv()).await, Ok(Some(Ok(_))))
            }
            _ => false,
        };

        if probed {
            tracing::info!(backend = backend.label(), "recovery probe succeeded");
            health.mark_available(index);
        }
    }
}
