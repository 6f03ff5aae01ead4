//! Linear-interpolation rate change.

use super::{RateHistory, RatePoint, Resampled};
use crate::dsp::buffer::{SampleBuffer, interpolate};

/// Play `buffer` at `rate`: output length is `floor(len / rate)`, output
/// frame `i` reads source position `i * rate`.
///
/// `rate` must be positive and finite; [`super::ResampleStrategy::process`]
/// filters the rest.
pub fn resample(buffer: &SampleBuffer, rate: f64) -> Resampled {
    let new_len = output_len(buffer.frame_count(), rate);
    Resampled {
        buffer: resample_buffer(buffer, rate),
        rate_history: Some(flat_history(new_len, buffer.sample_rate(), rate)),
    }
}

pub(crate) fn output_len(frames: usize, rate: f64) -> usize {
    (frames as f64 / rate).floor() as usize
}

/// The rate change alone, without a history.
pub(crate) fn resample_buffer(buffer: &SampleBuffer, rate: f64) -> SampleBuffer {
    let new_len = output_len(buffer.frame_count(), rate);
    let channels = buffer
        .channels()
        .iter()
        .map(|input| {
            (0..new_len)
                .map(|i| interpolate(input, i as f64 * rate))
                .collect()
        })
        .collect();
    SampleBuffer::from_channels_padded(buffer.sample_rate(), channels)
}

fn flat_history(len: usize, sample_rate: u32, rate: f64) -> RateHistory {
    let sr = sample_rate as f64;
    (0..len)
        .map(|i| RatePoint {
            time: i as f64 / sr,
            rate,
        })
        .collect()
}
