//! Resampler Gateway (C3)
//!
//! Lazily builds a resampler per backend whose declared sample rate
//! differs from the adapter's target, the way
//! `voice-agent-core::audio::AudioFrame::resample` wraps `rubato` for a
//! single frame — except here the resampler is stateful across an entire
//! attempt (sinc/FFT resampling only produces clean output across fixed-size
//! chunks), gets reset per attempt, and flushes trailing samples into one
//! final partial frame on attempt end (§4.3).

use rubato::{FftFixedIn, Resampler};
use tts_core::AudioFrame;

const CHUNK_SIZE: usize = 1024;

/// Per-adapter gateway: knows the target rate, hands out fresh per-attempt
/// resampler state on demand.
pub struct ResamplerGateway {
    target_sample_rate: u32,
}

impl ResamplerGateway {
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// `None` if `source_rate` already matches the target (no resampling
    /// needed for this backend).
    pub fn for_attempt(&self, source_rate: u32) -> Option<AttemptResampler> {
        if source_rate == self.target_sample_rate {
            None
        } else {
            Some(AttemptResampler::new(source_rate, self.target_sample_rate))
        }
    }
}

/// Stateful resampler for a single attempt. Must be reset (i.e. dropped and
/// recreated via `ResamplerGateway::for_attempt`) between attempts.
pub struct AttemptResampler {
    source_rate: u32,
    target_rate: u32,
    resampler: FftFixedIn<f64>,
    pending: Vec<f64>,
}

impl AttemptResampler {
    fn new(source_rate: u32, target_rate: u32) -> Self {
        let resampler = FftFixedIn::<f64>::new(source_rate as usize, target_rate as usize, CHUNK_SIZE, 2, 1)
            .expect("rubato resampler params are always valid for positive sample rates");
        Self {
            source_rate,
            target_rate,
            resampler,
            pending: Vec::new(),
        }
    }

    /// Feed one upstream frame. Returns zero or more frames' worth of fully
    /// resampled output (zero if not enough samples have accumulated yet
    /// to fill a chunk).
    pub fn push(&mut self, frame: &AudioFrame) -> Vec<AudioFrame> {
        self.pending
            .extend(frame.samples().iter().map(|&s| s as f64));

        let mut out = Vec::new();
        while self.pending.len() >= CHUNK_SIZE {
            let chunk: Vec<f64> = self.pending.drain(..CHUNK_SIZE).collect();
            if let Ok(output) = self.resampler.process(&[chunk], None) {
                out.push(AudioFrame::new(to_i16(&output[0]), self.target_rate));
            }
        }
        out
    }

    /// Consume the gateway, zero-padding and running whatever partial chunk
    /// remains so it isn't lost, then trimming the output proportionally to
    /// how much of the padded chunk was real input.
    pub fn flush(mut self) -> Option<AudioFrame> {
        if self.pending.is_empty() {
            return None;
        }

        let valid = self.pending.len();
        self.pending.resize(CHUNK_SIZE, 0.0);

        let output = self.resampler.process(&[self.pending], None).ok()?;
        let ratio = self.target_rate as f64 / self.source_rate as f64;
        let valid_out = (valid as f64 * ratio).round() as usize;

        let trimmed: Vec<i16> = output[0].iter().take(valid_out).map(|&s| clamp_i16(s)).collect();
        if trimmed.is_empty() {
            None
        } else {
            Some(AudioFrame::new(trimmed, self.target_rate))
        }
    }
}

fn to_i16(samples: &[f64]) -> Vec<i16> {
    samples.iter().map(|&s| clamp_i16(s)).collect()
}

fn clamp_i16(s: f64) -> i16 {
    s.clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn matching_rate_needs_no_resampler() {
        let gateway = ResamplerGateway::new(16000);
        assert!(gateway.for_attempt(16000).is_none());
    }

    #[test]
    fn upsamples_and_flushes_tail() {
        let gateway = ResamplerGateway::new(48000);
        let mut resampler = gateway.for_attempt(16000).expect("rates differ");

        let input = AudioFrame::new(vec![100i16; 2048], 16000);
        let mut total_out_samples = 0usize;
        for frame in resampler.push(&input) {
            assert_eq!(frame.sample_rate(), 48000);
            total_out_samples += frame.samples().len();
        }

        if let Some(tail) = resampler.flush() {
            total_out_samples += tail.samples().len();
        }

        // 2048 samples at 16kHz -> ~3x at 48kHz, allow sinc-filter slop.
        assert!(total_out_samples > 5500 && total_out_samples < 6500, "{total_out_samples}");
    }

    #[test]
    fn silence_marker_unaffected_by_gateway() {
        let frame = AudioFrame::silence(48000, Duration::from_millis(10));
        assert_eq!(frame.duration(), Duration::from_millis(10));
    }
}
