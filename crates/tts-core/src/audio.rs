//! Audio frame type
//!
//! Mono 16-bit PCM, matching the uniform format the adapter guarantees to
//! its caller. Resampling and frame-combining primitives are deliberately
//! not provided here — they belong to whatever external DSP library a
//! concrete backend (or the fallback adapter's resampler gateway) chooses.

use std::sync::Arc;
use std::time::Duration;

/// A chunk of synthesized audio.
///
/// `samples` is mono PCM16, little-endian sample order (native `i16`).
/// `duration` is derived from `samples.len()` and `sample_rate` at
/// construction time rather than recomputed on every access.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    samples: Arc<[i16]>,
    sample_rate: u32,
    duration: Duration,
}

impl AudioFrame {
    /// Build a frame from PCM16 samples at the given sample rate.
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        let duration = Duration::from_secs_f64(samples.len() as f64 / sample_rate as f64);
        Self {
            samples: samples.into(),
            sample_rate,
            duration,
        }
    }

    /// A zero-sample marker frame of exactly `duration`, used for the
    /// adapter's synthetic final-frame convention. Sample count is derived
    /// from `sample_rate` so the duration invariant holds exactly.
    pub fn silence(sample_rate: u32, duration: Duration) -> Self {
        let n = (sample_rate as f64 * duration.as_secs_f64()).round() as usize;
        Self {
            samples: vec![0i16; n].into(),
            sample_rate,
            duration,
        }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_from_sample_count() {
        let frame = AudioFrame::new(vec![0; 16000], 16000);
        assert_eq!(frame.duration(), Duration::from_secs(1));
    }

    #[test]
    fn silence_marker_duration_is_exact() {
        let frame = AudioFrame::silence(48000, Duration::from_millis(10));
        assert_eq!(frame.samples().len(), 480);
        assert_eq!(frame.duration(), Duration::from_millis(10));
    }

    #[test]
    fn empty_frame_detected() {
        let frame = AudioFrame::new(vec![], 16000);
        assert!(frame.is_empty());
    }
}
