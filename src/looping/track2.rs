//! Track2: the loop tail, faded out and padded to Track1's length.

use crate::dsp::buffer::SampleBuffer;
use crate::dsp::fade::FadeSettings;

/// Take the last `overlap_rate` percent of the source, fade it out, and
/// place it at the front of a `frame_count` buffer. A zero rate gives
/// silence of the same length.
pub fn overlap_track(
    source: &SampleBuffer,
    overlap_rate: f64,
    frame_count: usize,
    fade: &FadeSettings,
) -> SampleBuffer {
    let silent = || SampleBuffer::silent(source.channel_count(), frame_count, source.sample_rate());
    if overlap_rate <= 0.0 {
        return silent();
    }

    let duration = source.duration();
    let cut_duration = duration * (overlap_rate / 100.0);
    let start_sample = source.frames_for(duration - cut_duration);
    let end_sample = source.frame_count();
    let fade_frames = end_sample.saturating_sub(start_sample);
    if fade_frames == 0 {
        return silent();
    }

    let channels = source
        .channels()
        .iter()
        .map(|input| {
            (0..frame_count)
                .map(|i| {
                    let idx = start_sample + i;
                    if i >= fade_frames || idx >= input.len() {
                        return 0.0;
                    }
                    let gain = fade.fade_out_gain(i as f64 / fade_frames as f64);
                    input[idx] * gain as f32
                })
                .collect()
        })
        .collect();
    SampleBuffer::from_channels_padded(source.sample_rate(), channels)
}

/// Use the material after the selection as post-roll: `[use_range_end,
/// use_range_end + tail_time)` of the original buffer, clamped to its end,
/// faded out at the front of a `frame_count` buffer, silence after.
pub fn tail_track(
    original: &SampleBuffer,
    use_range_end: f64,
    tail_time: f64,
    frame_count: usize,
    fade: &FadeSettings,
) -> SampleBuffer {
    let sample_rate = original.sample_rate();
    let silent = || SampleBuffer::silent(original.channel_count(), frame_count, sample_rate);
    if tail_time <= 0.0 {
        return silent();
    }

    let tail_start = use_range_end.max(0.0);
    let tail_end = original.duration().min(tail_start + tail_time);
    let tail_duration = (tail_end - tail_start).max(0.0);
    let fade_frames = original.frames_for(tail_duration).min(frame_count);
    if fade_frames == 0 {
        return silent();
    }

    let channels = original
        .channels()
        .iter()
        .map(|input| {
            let mut out = vec![0.0f32; frame_count];
            for (i, slot) in out.iter_mut().take(fade_frames).enumerate() {
                let progress = i as f64 / fade_frames as f64;
                let position = tail_start + progress * tail_duration;
                let idx = original.frames_for(position);
                if let Some(&sample) = input.get(idx) {
                    *slot = sample * fade.fade_out_gain(progress) as f32;
                }
            }
            out
        })
        .collect();
    SampleBuffer::from_channels_padded(sample_rate, channels)
}
