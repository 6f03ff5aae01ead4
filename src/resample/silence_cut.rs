//! Silence-aware resampling.
//!
//! The buffer is first rate-changed like [`super::simple`]. The result is
//! then walked window by window: audible material is copied as is, while
//! silent runs are played faster (when the rate change made the buffer
//! longer) or slower (when it made it shorter), pulling the output back
//! toward the original length. Within a run the correction ramps up with
//! the distance into the run, so short pauses are barely touched.

use serde::{Deserialize, Serialize};

use super::{RateHistory, RatePoint, Resampled, simple};
use crate::dsp::buffer::{SampleBuffer, interpolate};

pub const MIN_SILENCE_RATE: f64 = 0.001;
pub const MAX_SILENCE_RATE: f64 = 256.0;

const DEFAULT_MIN_SILENCE_RATE: f64 = 1.0;
const DEFAULT_MAX_SILENCE_RATE: f64 = 4.0;
const DEFAULT_CORRECTION_STRENGTH: f64 = 0.5;
const DEFAULT_SILENCE_THRESHOLD: f64 = 0.01;
const DEFAULT_WINDOW_SIZE: usize = 1024;

/// Smallest chunk a silent run is processed in.
const MIN_CHUNK: usize = 128;
/// Floor of the correction factor, reached when the length error is zero.
const BASE_CORRECTION: f64 = 0.3;
/// Share of the correction factor driven by the length error.
const ERROR_CORRECTION: f64 = 0.7;
/// Exponent applied to the progress through a silent run.
const PROGRESS_EXPONENT: f64 = 1.5;

/// Silence detection and correction parameters.
///
/// Rates are kept in `[MIN_SILENCE_RATE, MAX_SILENCE_RATE]` with
/// `min_silence_rate <= max_silence_rate`; every way of building one
/// re-establishes that, deserialization included.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawSilenceCut")]
pub struct SilenceCutConfig {
    min_silence_rate: f64,
    max_silence_rate: f64,
    silence_correction_strength: f64,
    silence_threshold: f64,
    window_size: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSilenceCut {
    min_silence_rate: f64,
    max_silence_rate: f64,
    silence_correction_strength: f64,
    silence_threshold: f64,
    window_size: usize,
}

impl Default for RawSilenceCut {
    fn default() -> Self {
        let d = SilenceCutConfig::default();
        RawSilenceCut {
            min_silence_rate: d.min_silence_rate,
            max_silence_rate: d.max_silence_rate,
            silence_correction_strength: d.silence_correction_strength,
            silence_threshold: d.silence_threshold,
            window_size: d.window_size,
        }
    }
}

impl From<RawSilenceCut> for SilenceCutConfig {
    fn from(raw: RawSilenceCut) -> Self {
        SilenceCutConfig {
            min_silence_rate: raw.min_silence_rate,
            max_silence_rate: raw.max_silence_rate,
            silence_correction_strength: raw.silence_correction_strength,
            silence_threshold: raw.silence_threshold,
            window_size: raw.window_size,
        }
        .sanitized()
    }
}

impl Default for SilenceCutConfig {
    fn default() -> Self {
        SilenceCutConfig {
            min_silence_rate: DEFAULT_MIN_SILENCE_RATE,
            max_silence_rate: DEFAULT_MAX_SILENCE_RATE,
            silence_correction_strength: DEFAULT_CORRECTION_STRENGTH,
            silence_threshold: DEFAULT_SILENCE_THRESHOLD,
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }
}

impl SilenceCutConfig {
    pub fn min_silence_rate(&self) -> f64 {
        self.min_silence_rate
    }

    pub fn max_silence_rate(&self) -> f64 {
        self.max_silence_rate
    }

    pub fn correction_strength(&self) -> f64 {
        self.silence_correction_strength
    }

    pub fn silence_threshold(&self) -> f64 {
        self.silence_threshold
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Set both silence rates. A minimum above the maximum is lowered to it.
    pub fn with_cut_ratios(mut self, min_silence_rate: f64, max_silence_rate: f64) -> Self {
        self.max_silence_rate = clamp_rate(max_silence_rate, DEFAULT_MAX_SILENCE_RATE);
        self.min_silence_rate =
            clamp_rate(min_silence_rate, DEFAULT_MIN_SILENCE_RATE).min(self.max_silence_rate);
        self
    }

    /// Set the maximum rate, lowering the minimum if it would exceed it.
    pub fn with_max_silence_rate(mut self, max_silence_rate: f64) -> Self {
        self.max_silence_rate = clamp_rate(max_silence_rate, DEFAULT_MAX_SILENCE_RATE);
        self.min_silence_rate = self.min_silence_rate.min(self.max_silence_rate);
        self
    }

    /// Correction strength; negative values become 0, there is no upper bound.
    pub fn with_correction_strength(mut self, strength: f64) -> Self {
        self.silence_correction_strength = clamp_strength(strength);
        self
    }

    /// RMS level below which a window counts as silent.
    pub fn with_silence_threshold(mut self, threshold: f64) -> Self {
        self.silence_threshold = clamp_threshold(threshold);
        self
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size.max(1);
        self
    }

    /// Bring every field back into range. When the minimum exceeds the
    /// maximum the maximum is raised.
    pub fn sanitized(self) -> Self {
        let min_silence_rate = clamp_rate(self.min_silence_rate, DEFAULT_MIN_SILENCE_RATE);
        let max_silence_rate =
            clamp_rate(self.max_silence_rate, DEFAULT_MAX_SILENCE_RATE).max(min_silence_rate);
        SilenceCutConfig {
            min_silence_rate,
            max_silence_rate,
            silence_correction_strength: clamp_strength(self.silence_correction_strength),
            silence_threshold: clamp_threshold(self.silence_threshold),
            window_size: self.window_size.max(1),
        }
    }

    /// Replace the three tunable values and re-sanitize; detection settings
    /// are kept.
    pub(crate) fn with_tuning(mut self, min: f64, max: f64, strength: f64) -> Self {
        self.min_silence_rate = min;
        self.max_silence_rate = max;
        self.silence_correction_strength = strength;
        self.sanitized()
    }

    fn chunk_size(&self) -> usize {
        MIN_CHUNK.max(self.window_size / 4)
    }
}

fn clamp_rate(rate: f64, fallback: f64) -> f64 {
    if rate.is_nan() {
        return fallback;
    }
    rate.clamp(MIN_SILENCE_RATE, MAX_SILENCE_RATE)
}

fn clamp_strength(strength: f64) -> f64 {
    if strength.is_nan() { 0.0 } else { strength.max(0.0) }
}

fn clamp_threshold(threshold: f64) -> f64 {
    if threshold.is_nan() {
        DEFAULT_SILENCE_THRESHOLD
    } else {
        threshold.max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// The rate change shortened the buffer; silences are slowed down.
    Lengthen,
    /// The rate change lengthened the buffer; silences are sped up.
    Shorten,
}

impl Direction {
    fn silence_rate(self, adjustment: f64, config: &SilenceCutConfig) -> f64 {
        match self {
            Direction::Lengthen => {
                1.0 - adjustment * (1.0 - config.min_silence_rate.max(MIN_SILENCE_RATE))
            }
            Direction::Shorten => {
                config.min_silence_rate
                    + adjustment * (config.max_silence_rate - config.min_silence_rate)
            }
        }
    }
}

/// How hard silent runs are corrected, from the relative length error.
fn correction_factor(relative_error: f64, strength: f64) -> f64 {
    BASE_CORRECTION + relative_error * ERROR_CORRECTION * (1.0 + strength)
}

/// Correction applied at `progress` (0..1) through a silent run.
fn run_adjustment(progress: f64, correction_factor: f64) -> f64 {
    (progress.powf(PROGRESS_EXPONENT) * correction_factor).min(1.0)
}

/// Resample at `rate`, then correct silent runs toward the input length.
pub fn resample(buffer: &SampleBuffer, rate: f64, config: &SilenceCutConfig) -> Resampled {
    let config = config.sanitized();
    let resampled = simple::resample_buffer(buffer, rate);

    let target = buffer.frame_count();
    let produced = resampled.frame_count();
    let direction = if produced <= target {
        Direction::Lengthen
    } else {
        Direction::Shorten
    };
    let relative_error = if target > 0 {
        (produced.abs_diff(target) as f64 / target as f64).min(1.0)
    } else {
        0.0
    };
    let factor = correction_factor(relative_error, config.silence_correction_strength);

    let sample_rate = resampled.sample_rate();
    let pass = ChannelPass {
        config: &config,
        direction,
        factor,
        rate,
        sample_rate,
    };
    let mut history = RateHistory::new();
    let channels: Vec<Vec<f32>> = resampled
        .channels()
        .iter()
        .enumerate()
        .map(|(ch, input)| {
            let recorder = if ch == 0 { Some(&mut history) } else { None };
            pass.run(input, recorder)
        })
        .collect();

    let buffer = SampleBuffer::from_channels_padded(sample_rate, channels);
    history.truncate(buffer.frame_count());
    Resampled {
        buffer,
        rate_history: Some(history),
    }
}

/// Settings for walking one channel.
struct ChannelPass<'a> {
    config: &'a SilenceCutConfig,
    direction: Direction,
    factor: f64,
    rate: f64,
    sample_rate: u32,
}

impl ChannelPass<'_> {
    fn run(&self, input: &[f32], mut history: Option<&mut RateHistory>) -> Vec<f32> {
        let len = input.len();
        let window = self.config.window_size;
        let chunk_size = self.config.chunk_size();
        let energy = PrefixEnergy::new(input);
        let is_silent = |start: usize, end: usize| energy.rms(start, end) < self.config.silence_threshold;

        let sr = self.sample_rate as f64;
        let mut out = Vec::with_capacity(len);
        let mut record = |index: usize, rate: f64| {
            if let Some(history) = history.as_deref_mut() {
                history.push(RatePoint {
                    time: index as f64 / sr,
                    rate,
                });
            }
        };

        let mut i = 0;
        while i < len {
            if !is_silent(i, i.saturating_add(window).min(len)) {
                record(out.len(), self.rate);
                out.push(input[i]);
                i += 1;
                continue;
            }

            let run_start = i;
            let mut run_end = i.saturating_add(window).min(len);
            while run_end < len {
                let check_end = run_end.saturating_add(window).min(len);
                if !is_silent(run_end, check_end) {
                    break;
                }
                run_end = check_end;
            }
            let run_len = run_end - run_start;
            log::trace!("silent run {run_start}..{run_end} ({:?})", self.direction);

            let mut processed = 0;
            while processed < run_len {
                let chunk = chunk_size.min(run_len - processed);
                let progress = processed as f64 / run_len as f64;
                let adjustment = run_adjustment(progress, self.factor);
                let silence_rate = self.direction.silence_rate(adjustment, self.config);

                let chunk_start = run_start + processed;
                let segment = &input[chunk_start..chunk_start + chunk];
                let out_len = (chunk as f64 / silence_rate).floor() as usize;
                for k in 0..out_len {
                    let position = (k as f64 / out_len as f64) * chunk as f64;
                    record(out.len(), self.rate * silence_rate);
                    out.push(interpolate(segment, position));
                }
                processed += chunk;
            }
            i = run_end;
        }
        out
    }
}

/// Running sum of squares for O(1) windowed RMS.
struct PrefixEnergy {
    sums: Vec<f64>,
}

impl PrefixEnergy {
    fn new(data: &[f32]) -> Self {
        let mut sums = Vec::with_capacity(data.len() + 1);
        let mut acc = 0.0f64;
        sums.push(acc);
        for &s in data {
            acc += s as f64 * s as f64;
            sums.push(acc);
        }
        PrefixEnergy { sums }
    }

    /// RMS of `[start, end)`; an empty window reads as silence.
    fn rms(&self, start: usize, end: usize) -> f64 {
        if end <= start {
            return 0.0;
        }
        let sum = (self.sums[end] - self.sums[start]).max(0.0);
        (sum / (end - start) as f64).sqrt()
    }
}
