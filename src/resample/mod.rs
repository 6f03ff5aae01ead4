//! Playback-rate resampling.
//!
//! Two strategies share one edge policy: a non-positive or non-finite rate
//! returns the input untouched, and a rate within [`IDENTITY_TOLERANCE`] of
//! 1.0 is treated as identity. Neither case produces a rate history.

pub mod search;
pub mod silence_cut;
pub mod simple;

use serde::{Deserialize, Serialize};

use crate::dsp::buffer::SampleBuffer;

pub use search::{DurationSearch, IterationRecord, SearchOptions, SearchReport, next_config};
pub use silence_cut::SilenceCutConfig;

/// Rates closer than this to 1.0 leave the buffer unchanged.
pub const IDENTITY_TOLERANCE: f64 = 0.001;

/// Effective playback rate at one output frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatePoint {
    /// Output position in seconds.
    pub time: f64,
    pub rate: f64,
}

/// One entry per output frame of channel 0.
pub type RateHistory = Vec<RatePoint>;

/// A resampled buffer and, when any rate was applied, its rate history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resampled {
    pub buffer: SampleBuffer,
    pub rate_history: Option<RateHistory>,
}

impl Resampled {
    fn unchanged(buffer: &SampleBuffer) -> Self {
        Resampled {
            buffer: buffer.clone(),
            rate_history: None,
        }
    }

    pub fn duration(&self) -> f64 {
        self.buffer.duration()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ResampleStrategy {
    /// Plain linear-interpolation rate change.
    #[default]
    Simple,
    /// Rate change, then stretch or squeeze silences back toward the
    /// original length.
    SilenceCut(SilenceCutConfig),
}

impl ResampleStrategy {
    /// Resolve a UI strategy name; unknown names select `Simple`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "silence-cut" => ResampleStrategy::SilenceCut(SilenceCutConfig::default()),
            _ => ResampleStrategy::Simple,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResampleStrategy::Simple => "simple",
            ResampleStrategy::SilenceCut(_) => "silence-cut",
        }
    }

    pub fn process(&self, buffer: &SampleBuffer, rate: f64) -> Resampled {
        if !rate.is_finite() || rate <= 0.0 || is_identity(rate) {
            return Resampled::unchanged(buffer);
        }
        match self {
            ResampleStrategy::Simple => simple::resample(buffer, rate),
            ResampleStrategy::SilenceCut(config) => silence_cut::resample(buffer, rate, config),
        }
    }
}

pub(crate) fn is_identity(rate: f64) -> bool {
    (rate - 1.0).abs() < IDENTITY_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(frames: usize, sample_rate: u32) -> SampleBuffer {
        let mut state = 0x1234_5678u32;
        let data = (0..frames)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 - 0.5
            })
            .collect();
        SampleBuffer::from_mono(data, sample_rate).unwrap()
    }

    #[test]
    fn identity_rate_returns_input() {
        let buf = noise(4000, 8000);
        for strategy in [
            ResampleStrategy::Simple,
            ResampleStrategy::SilenceCut(SilenceCutConfig::default()),
        ] {
            for rate in [1.0, 1.0005, 0.9995] {
                let out = strategy.process(&buf, rate);
                assert_eq!(out.buffer, buf, "{} at {rate}", strategy.name());
                assert!(out.rate_history.is_none());
            }
        }
    }

    #[test]
    fn invalid_rate_returns_input() {
        let buf = noise(100, 8000);
        for rate in [0.0, -2.0, f64::NAN, f64::INFINITY] {
            let out = ResampleStrategy::Simple.process(&buf, rate);
            assert_eq!(out.buffer, buf);
            assert!(out.rate_history.is_none());
        }
    }

    #[test]
    fn strategy_names() {
        assert_eq!(ResampleStrategy::from_name("simple"), ResampleStrategy::Simple);
        assert_eq!(ResampleStrategy::from_name("silence-cut").name(), "silence-cut");
        assert_eq!(ResampleStrategy::from_name("granular"), ResampleStrategy::Simple);
    }

    #[test]
    fn dispatch_reaches_strategy() {
        let buf = noise(1000, 8000);
        let out = ResampleStrategy::Simple.process(&buf, 2.0);
        assert_eq!(out.buffer.frame_count(), 500);
        assert_eq!(out.rate_history.map(|h| h.len()), Some(500));
    }
}
