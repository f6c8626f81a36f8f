//! A resilience layer that presents a single TTS interface while
//! transparently multiplexing across an ordered list of backend
//! providers. See [`FallbackAdapter`] for the entry point.

mod adapter;
mod attempt;
mod config;
mod error;
mod events;
mod health;
mod prober;
mod resampler;
mod streaming;

mod oneshot;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use adapter::FallbackAdapter;
pub use config::{FallbackAdapterConfig, FallbackAdapterConfigBuilder};
pub use error::{FallbackError, Result};
pub use events::{AvailabilityChangedEvent, EventBus};
pub use oneshot::SynthesizedAudio;
pub use streaming::{StreamedAudio, SynthesizeStream};
