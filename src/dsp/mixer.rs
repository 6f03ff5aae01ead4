//! Buffer-level range extraction, mixing and truncation.

use super::buffer::{SampleBuffer, seconds_to_frames};

/// Copy `[start, end)` seconds into a new buffer.
///
/// An inverted or out-of-bounds range is not an error: the input comes back
/// unchanged.
pub fn extract_range(buffer: &SampleBuffer, start: f64, end: f64) -> SampleBuffer {
    if start.is_nan() || end.is_nan() || start < 0.0 || end > buffer.duration() || start >= end {
        return buffer.clone();
    }

    let sample_rate = buffer.sample_rate();
    let frame_count = seconds_to_frames(end - start, sample_rate);
    let start_sample = seconds_to_frames(start, sample_rate);
    let end_sample = seconds_to_frames(end, sample_rate);

    let channels = buffer
        .channels()
        .iter()
        .map(|input| {
            (0..frame_count)
                .map(|i| {
                    let idx = start_sample + i;
                    if idx < input.len() && idx < end_sample {
                        input[idx]
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect();

    SampleBuffer::from_channels_padded(sample_rate, channels)
}

/// Sum two buffers sample by sample with hard clipping to [-1, 1].
///
/// The output is as long as the longer input; sample rate and channel count
/// come from `a`.
pub fn mix_buffers(a: &SampleBuffer, b: &SampleBuffer) -> SampleBuffer {
    let len = a.frame_count().max(b.frame_count());
    let channels = a
        .channels()
        .iter()
        .enumerate()
        .map(|(ch, first)| {
            let second = b.channel(ch).unwrap_or(&[]);
            (0..len)
                .map(|i| {
                    let x = first.get(i).copied().unwrap_or(0.0);
                    let y = second.get(i).copied().unwrap_or(0.0);
                    hard_clip(x + y)
                })
                .collect()
        })
        .collect();

    SampleBuffer::from_channels_padded(a.sample_rate(), channels)
}

/// Keep at most the first `max_duration` seconds.
pub fn truncate_buffer(buffer: &SampleBuffer, max_duration: f64) -> SampleBuffer {
    if max_duration.is_nan() || max_duration <= 0.0 || buffer.duration() <= max_duration {
        return buffer.clone();
    }

    let frames = buffer.frames_for(max_duration).min(buffer.frame_count());
    let channels = buffer
        .channels()
        .iter()
        .map(|data| data[..frames].to_vec())
        .collect();
    SampleBuffer::from_channels_padded(buffer.sample_rate(), channels)
}

fn hard_clip(x: f32) -> f32 {
    x.clamp(-1.0, 1.0)
}
