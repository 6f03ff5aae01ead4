//! Track1: the loop head, faded in.

use crate::dsp::buffer::SampleBuffer;
use crate::dsp::fade::FadeSettings;

/// Cut `overlap_rate` percent off the end of the source and fade in the same
/// length at the start. A zero rate returns the source untouched.
pub fn overlap_track(source: &SampleBuffer, overlap_rate: f64, fade: &FadeSettings) -> SampleBuffer {
    if overlap_rate <= 0.0 {
        return source.clone();
    }

    let duration = source.duration();
    let cut_duration = duration * (overlap_rate / 100.0);
    let kept_duration = duration - cut_duration;
    if kept_duration <= 0.0 {
        return source.clone();
    }

    let frame_count = source.frames_for(kept_duration);
    let fade_frames = source.frames_for(cut_duration);

    let channels = source
        .channels()
        .iter()
        .map(|input| faded_copy(input, frame_count, frame_count, fade_frames, fade))
        .collect();
    SampleBuffer::from_channels_padded(source.sample_rate(), channels)
}

/// The whole use-range followed by `tail_time` seconds of silence, with the
/// first `min(tail_time, duration)` seconds faded in.
pub fn tail_track(source: &SampleBuffer, tail_time: f64, fade: &FadeSettings) -> SampleBuffer {
    let duration = source.duration();
    let tail_time = tail_time.max(0.0);

    let total_frames = source.frames_for(duration + tail_time);
    let fade_frames = source.frames_for(tail_time.min(duration));
    let source_frames = source.frame_count();

    let channels = source
        .channels()
        .iter()
        .map(|input| faded_copy(input, total_frames, source_frames, fade_frames, fade))
        .collect();
    SampleBuffer::from_channels_padded(source.sample_rate(), channels)
}

/// Copy up to `copy_frames` samples into a buffer of `total_frames`, applying
/// the fade-in over the first `fade_frames`; everything else is silence.
fn faded_copy(
    input: &[f32],
    total_frames: usize,
    copy_frames: usize,
    fade_frames: usize,
    fade: &FadeSettings,
) -> Vec<f32> {
    (0..total_frames)
        .map(|i| {
            if i >= copy_frames || i >= input.len() {
                return 0.0;
            }
            let gain = if i < fade_frames {
                fade.fade_in_gain(i as f64 / fade_frames as f64)
            } else {
                1.0
            };
            input[i] * gain as f32
        })
        .collect()
}
