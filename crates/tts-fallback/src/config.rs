//! Adapter configuration (§3 data model, §4.1)

use std::sync::Arc;
use std::time::Duration;

use tts_core::TtsBackend;

/// Ordered list of backends plus the knobs that govern retries, the
/// shared output rate, and the recovery prober.
pub struct FallbackAdapterConfig {
    backends: Vec<Arc<dyn TtsBackend>>,
    max_retry_per_tts: usize,
    sample_rate: Option<u32>,
    prober_interval: Duration,
    attempt_timeout: Duration,
}

impl FallbackAdapterConfig {
    /// Starts a builder over `backends`, tried in the given order.
    ///
    /// # Panics
    /// Panics if `backends` is empty — an adapter with nothing to fail
    /// over to isn't a meaningful configuration.
    pub fn builder(backends: Vec<Arc<dyn TtsBackend>>) -> FallbackAdapterConfigBuilder {
        assert!(
            !backends.is_empty(),
            "FallbackAdapterConfig needs at least one backend"
        );
        FallbackAdapterConfigBuilder {
            backends,
            max_retry_per_tts: 1,
            sample_rate: None,
            prober_interval: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(10),
        }
    }

    pub fn backends(&self) -> &[Arc<dyn TtsBackend>] {
        &self.backends
    }

    pub fn max_retry_per_tts(&self) -> usize {
        self.max_retry_per_tts
    }

    /// The rate every committed frame leaving the adapter is resampled to.
    /// Defaults to the maximum declared rate among configured backends so
    /// no backend's output is ever downsampled by default.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
            .unwrap_or_else(|| self.backends.iter().map(|b| b.sample_rate()).max().unwrap())
    }

    pub fn prober_interval(&self) -> Duration {
        self.prober_interval
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }
}

pub struct FallbackAdapterConfigBuilder {
    backends: Vec<Arc<dyn TtsBackend>>,
    max_retry_per_tts: usize,
    sample_rate: Option<u32>,
    prober_interval: Duration,
    attempt_timeout: Duration,
}

impl FallbackAdapterConfigBuilder {
    /// Number of times the *same* backend may be retried before the
    /// orchestrator moves on to the next one. Default 1 (one retry, i.e.
    /// two attempts total per backend).
    pub fn max_retry_per_tts(mut self, retries: usize) -> Self {
        self.max_retry_per_tts = retries;
        self
    }

    /// Overrides the adapter's output rate. Leave unset to default to the
    /// highest rate among the configured backends.
    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    pub fn prober_interval(mut self, interval: Duration) -> Self {
        self.prober_interval = interval;
        self
    }

    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn build(self) -> FallbackAdapterConfig {
        FallbackAdapterConfig {
            backends: self.backends,
            max_retry_per_tts: self.max_retry_per_tts,
            sample_rate: self.sample_rate,
            prober_interval: self.prober_interval,
            attempt_timeout: self.attempt_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTtsBackend;

    #[test]
    fn sample_rate_defaults_to_backend_max() {
        let backends: Vec<Arc<dyn TtsBackend>> = vec![
            Arc::new(FakeTtsBackend::new("a", 16000)),
            Arc::new(FakeTtsBackend::new("b", 48000)),
        ];
        let config = FallbackAdapterConfig::builder(backends).build();
        assert_eq!(config.sample_rate(), 48000);
    }

    #[test]
    fn max_retry_defaults_to_one() {
        let backends: Vec<Arc<dyn TtsBackend>> = vec![Arc::new(FakeTtsBackend::new("a", 16000))];
        let config = FallbackAdapterConfig::builder(backends).build();
        assert_eq!(config.max_retry_per_tts(), 1);
    }

    #[test]
    #[should_panic]
    fn empty_backend_list_panics() {
        let backends: Vec<Arc<dyn TtsBackend>> = vec![];
        FallbackAdapterConfig::builder(backends);
    }
}
