//! Tempo estimation: envelope autocorrelation over a selected range.
//!
//! A heuristic used to seed the editor's BPM field, not a beat tracker.

use super::buffer::SampleBuffer;

/// Envelope sample rate in Hz.
const ENVELOPE_RATE: f64 = 200.0;
const MIN_RANGE_SECONDS: f64 = 0.5;
const MAX_RANGE_SECONDS: f64 = 30.0;
const MIN_ENVELOPE_LEN: usize = 10;

/// Candidate tempo range searched by the autocorrelation.
const MIN_CANDIDATE_BPM: f64 = 40.0;
const MAX_CANDIDATE_BPM: f64 = 240.0;

/// Bounds the editor accepts for a BPM value.
pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 300.0;

/// Estimate the tempo of `[start, end)` seconds of the first channel.
///
/// Returns `None` when the range is shorter than half a second, the envelope
/// has no energy, or no lag wins.
pub fn estimate_bpm(buffer: &SampleBuffer, start: f64, end: f64) -> Option<f64> {
    let data = buffer.channel(0)?;
    let sr = buffer.sample_rate() as f64;

    let start = start.max(0.0);
    let end = end.min(buffer.duration());
    let start_sample = buffer.frames_for(start);
    let end_sample = buffer.frames_for(end).min(data.len());
    if end_sample <= start_sample {
        return None;
    }

    let min_len = (sr * MIN_RANGE_SECONDS).floor() as usize;
    let max_len = (sr * MAX_RANGE_SECONDS).floor() as usize;
    let length = end_sample - start_sample;
    if length < min_len {
        return None;
    }
    let segment = &data[start_sample..start_sample + length.min(max_len)];

    let step = ((sr / ENVELOPE_RATE).floor() as usize).max(1);
    let mut envelope = rectified_envelope(segment, step);
    if envelope.len() < MIN_ENVELOPE_LEN {
        return None;
    }

    let mean = envelope.iter().sum::<f64>() / envelope.len() as f64;
    let mut energy = 0.0;
    for v in envelope.iter_mut() {
        *v -= mean;
        energy += *v * *v;
    }
    if energy == 0.0 {
        return None;
    }

    let envelope_rate = sr / step as f64;
    let min_lag = (envelope_rate * 60.0 / MAX_CANDIDATE_BPM).floor() as usize;
    let max_lag = (envelope_rate * 60.0 / MIN_CANDIDATE_BPM).floor() as usize;

    let mut best_lag = 0usize;
    let mut best_corr = f64::NEG_INFINITY;
    for lag in min_lag.max(1)..=max_lag {
        let corr: f64 = envelope
            .iter()
            .zip(envelope.iter().skip(lag))
            .map(|(a, b)| a * b)
            .sum();
        if corr > best_corr {
            best_corr = corr;
            best_lag = lag;
        }
    }

    if best_lag == 0 {
        return None;
    }
    let bpm = 60.0 * envelope_rate / best_lag as f64;
    if !bpm.is_finite() || bpm <= 0.0 {
        return None;
    }
    Some(clamp_bpm(bpm))
}

/// Block mean of |x| over consecutive `step`-sample blocks; a trailing
/// partial block is dropped.
fn rectified_envelope(samples: &[f32], step: usize) -> Vec<f64> {
    samples
        .chunks_exact(step)
        .map(|block| block.iter().map(|s| s.abs() as f64).sum::<f64>() / step as f64)
        .collect()
}

pub fn clamp_bpm(bpm: f64) -> f64 {
    bpm.clamp(MIN_BPM, MAX_BPM)
}

/// Seconds per beat. BPM counts quarter notes, so the time signature's
/// denominator rescales the beat (`/8` halves it).
pub fn beat_duration(bpm: f64, denominator: u32) -> f64 {
    if bpm <= 0.0 || denominator == 0 {
        return 1.0;
    }
    (60.0 / bpm) * (4.0 / denominator as f64)
}
