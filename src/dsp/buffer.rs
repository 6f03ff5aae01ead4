//! Multichannel PCM sample buffer.
//!
//! A `SampleBuffer` is treated as an immutable value: every transform in the
//! crate reads one buffer and returns a fresh one.

use serde::{Deserialize, Serialize};

use crate::error::BufferError;

/// Planar multichannel audio in `f32`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawBuffer")]
pub struct SampleBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

/// Unvalidated wire form, checked on the way in.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl TryFrom<RawBuffer> for SampleBuffer {
    type Error = BufferError;

    fn try_from(raw: RawBuffer) -> Result<Self, Self::Error> {
        SampleBuffer::new(raw.sample_rate, raw.channels)
    }
}

impl SampleBuffer {
    /// Build a buffer from per-channel sample vectors.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self, BufferError> {
        if sample_rate == 0 {
            return Err(BufferError::ZeroSampleRate);
        }
        let Some(first) = channels.first() else {
            return Err(BufferError::NoChannels);
        };
        let expected = first.len();
        if let Some((channel, data)) = channels
            .iter()
            .enumerate()
            .find(|(_, data)| data.len() != expected)
        {
            return Err(BufferError::ChannelLengthMismatch {
                channel,
                expected,
                found: data.len(),
            });
        }
        Ok(SampleBuffer {
            sample_rate,
            channels,
        })
    }

    pub fn from_mono(data: Vec<f32>, sample_rate: u32) -> Result<Self, BufferError> {
        Self::new(sample_rate, vec![data])
    }

    /// Split interleaved frames (`L R L R ...`) into planar channels.
    pub fn from_interleaved(
        samples: &[f32],
        channel_count: usize,
        sample_rate: u32,
    ) -> Result<Self, BufferError> {
        if channel_count == 0 {
            return Err(BufferError::NoChannels);
        }
        if samples.len() % channel_count != 0 {
            return Err(BufferError::InterleavedLength {
                len: samples.len(),
                channels: channel_count,
            });
        }
        let channels = (0..channel_count)
            .map(|ch| {
                samples
                    .iter()
                    .skip(ch)
                    .step_by(channel_count)
                    .copied()
                    .collect()
            })
            .collect();
        Self::new(sample_rate, channels)
    }

    /// An all-zero buffer. A zero sample rate or channel count is raised to 1.
    pub fn silent(channel_count: usize, frame_count: usize, sample_rate: u32) -> Self {
        SampleBuffer {
            sample_rate: sample_rate.max(1),
            channels: vec![vec![0.0; frame_count]; channel_count.max(1)],
        }
    }

    /// Build from channels produced by a transform that already guarantees
    /// equal lengths; shorter channels are zero-padded to the longest.
    pub(crate) fn from_channels_padded(sample_rate: u32, mut channels: Vec<Vec<f32>>) -> Self {
        let longest = channels.iter().map(Vec::len).max().unwrap_or(0);
        for data in &mut channels {
            data.resize(longest, 0.0);
        }
        if channels.is_empty() {
            channels.push(Vec::new());
        }
        SampleBuffer {
            sample_rate: sample_rate.max(1),
            channels,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    /// Whole frames covered by `seconds` at this buffer's rate (floored,
    /// never negative).
    pub fn frames_for(&self, seconds: f64) -> usize {
        seconds_to_frames(seconds, self.sample_rate)
    }

    /// Frames interleaved channel by channel, as an encoder expects them.
    pub fn to_interleaved(&self) -> Vec<f32> {
        let frames = self.frame_count();
        let mut out = Vec::with_capacity(frames * self.channel_count());
        for i in 0..frames {
            for data in &self.channels {
                out.push(data[i]);
            }
        }
        out
    }
}

/// Frames are floored; the small bias keeps `n / sr` seconds mapping back to
/// exactly `n` frames despite rounding in the division.
pub(crate) fn seconds_to_frames(seconds: f64, sample_rate: u32) -> usize {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * sample_rate as f64 + 1e-7).floor() as usize
}

/// Read a sample with linear interpolation at a fractional position.
///
/// At the last index only that sample is used; past the end or before the
/// start the result is silence.
pub fn interpolate(data: &[f32], position: f64) -> f32 {
    if data.is_empty() || position < 0.0 {
        return 0.0;
    }

    let idx = position as usize;
    if idx + 1 < data.len() {
        let frac = (position - idx as f64) as f32;
        data[idx] * (1.0 - frac) + data[idx + 1] * frac
    } else if idx < data.len() {
        data[idx]
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rejects_zero_sample_rate() {
        assert_eq!(
            SampleBuffer::from_mono(vec![0.0; 4], 0),
            Err(BufferError::ZeroSampleRate)
        );
    }

    #[test]
    fn rejects_ragged_channels() {
        let err = SampleBuffer::new(44100, vec![vec![0.0; 4], vec![0.0; 3]]).unwrap_err();
        assert_eq!(
            err,
            BufferError::ChannelLengthMismatch {
                channel: 1,
                expected: 4,
                found: 3
            }
        );
        assert_eq!(SampleBuffer::new(44100, vec![]), Err(BufferError::NoChannels));
    }

    #[test]
    fn duration_from_frames() {
        let buf = SampleBuffer::silent(2, 22050, 44100);
        assert_eq!(buf.channel_count(), 2);
        assert_eq!(buf.frame_count(), 22050);
        assert_abs_diff_eq!(buf.duration(), 0.5);
    }

    #[test]
    fn interleave_roundtrip() {
        let interleaved = [0.1, -0.1, 0.2, -0.2, 0.3, -0.3];
        let buf = SampleBuffer::from_interleaved(&interleaved, 2, 8000).unwrap();
        assert_eq!(buf.channel(0).unwrap(), &[0.1f32, 0.2, 0.3]);
        assert_eq!(buf.channel(1).unwrap(), &[-0.1f32, -0.2, -0.3]);
        assert_eq!(buf.to_interleaved(), interleaved);
    }

    #[test]
    fn interleaved_length_must_divide() {
        assert_eq!(
            SampleBuffer::from_interleaved(&[0.0; 5], 2, 8000),
            Err(BufferError::InterleavedLength { len: 5, channels: 2 })
        );
    }

    #[test]
    fn padded_channels_match_longest() {
        let buf = SampleBuffer::from_channels_padded(100, vec![vec![1.0; 3], vec![1.0; 5]]);
        assert_eq!(buf.frame_count(), 5);
        assert_eq!(buf.channel(0).unwrap(), &[1.0f32, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn frames_for_floors_and_clamps() {
        let buf = SampleBuffer::silent(1, 10, 1000);
        assert_eq!(buf.frames_for(0.0015), 1);
        assert_eq!(buf.frames_for(0.7), 700);
        let odd = SampleBuffer::silent(1, 12347, 44100);
        assert_eq!(odd.frames_for(odd.duration()), 12347);
        assert_eq!(buf.frames_for(-1.0), 0);
        assert_eq!(buf.frames_for(f64::NAN), 0);
    }

    #[test]
    fn interpolation_edges() {
        let data = [0.0, 1.0, 0.5];
        assert_abs_diff_eq!(interpolate(&data, 0.5), 0.5);
        assert_abs_diff_eq!(interpolate(&data, 1.5), 0.75);
        // Last index reads the floor sample only
        assert_abs_diff_eq!(interpolate(&data, 2.4), 0.5);
        assert_eq!(interpolate(&data, 3.0), 0.0);
        assert_eq!(interpolate(&data, -0.5), 0.0);
        assert_eq!(interpolate(&[], 0.0), 0.0);
    }

    #[test]
    fn deserialize_validates() {
        let ok: SampleBuffer =
            serde_json::from_str(r#"{"sampleRate":8000,"channels":[[0.0,0.5]]}"#).unwrap();
        assert_eq!(ok.frame_count(), 2);

        let ragged = serde_json::from_str::<SampleBuffer>(
            r#"{"sampleRate":8000,"channels":[[0.0,0.5],[0.0]]}"#,
        );
        assert!(ragged.is_err());
    }
}
