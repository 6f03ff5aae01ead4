//! Loop track builders.
//!
//! A loop is played as two simultaneous tracks: Track1 fades in at the loop
//! head while Track2 fades out the material that would otherwise cut off at
//! the seam. Both tracks always have the same length so they wrap together.

pub mod track1;
pub mod track2;

use serde::{Deserialize, Serialize};

use crate::dsp::buffer::SampleBuffer;
use crate::dsp::fade::FadeSettings;
use crate::dsp::mixer::mix_buffers;

/// Largest supported overlap; beyond half the range the fade regions would
/// overlap themselves.
pub const MAX_OVERLAP_RATE: f64 = 50.0;

/// Crossfade algorithm and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "lowercase")]
pub enum LoopAlgorithm {
    /// Self-overlap: the end of the range is laid over its start.
    Overlap {
        /// Percent of the range, 0 to 50.
        #[serde(rename = "overlapRate", default)]
        overlap_rate: f64,
    },
    /// Post-roll: material after the range is laid over its start.
    Tail {
        /// Seconds of post-roll.
        #[serde(rename = "tailTime", default)]
        tail_time: f64,
        /// Range length when it differs from the use-range buffer's.
        #[serde(
            rename = "useRangeDuration",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        use_range_duration: Option<f64>,
        /// End of the range, in seconds of the original buffer.
        #[serde(rename = "useRangeEnd", default)]
        use_range_end: f64,
    },
}

impl Default for LoopAlgorithm {
    fn default() -> Self {
        LoopAlgorithm::Overlap { overlap_rate: 0.0 }
    }
}

/// Which of the two loop tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    Track1,
    Track2,
}

/// Fade region as a fraction of the track length.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FadeRange {
    pub fade_start_x: f64,
    pub fade_width: f64,
}

/// Display hints for the waveform view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    pub algorithm: &'static str,
    pub show_tail_section: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_range_duration: Option<f64>,
}

/// Inputs shared by both tracks.
#[derive(Debug, Clone, Copy)]
pub struct LoopSource<'a> {
    /// The selected range, already extracted.
    pub use_range: &'a SampleBuffer,
    /// The full recording; Tail reads its post-roll from here.
    pub original: Option<&'a SampleBuffer>,
}

impl<'a> LoopSource<'a> {
    pub fn new(use_range: &'a SampleBuffer) -> Self {
        LoopSource {
            use_range,
            original: None,
        }
    }

    pub fn with_original(mut self, original: &'a SampleBuffer) -> Self {
        self.original = Some(original);
        self
    }
}

/// Per-track fade curves.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackFades {
    pub track1: FadeSettings,
    pub track2: FadeSettings,
}

/// The two loop tracks, always of equal frame count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopTracks {
    pub track1: SampleBuffer,
    pub track2: SampleBuffer,
}

impl LoopTracks {
    /// Both tracks summed into the single buffer that gets saved.
    pub fn mixdown(&self) -> SampleBuffer {
        mix_buffers(&self.track1, &self.track2)
    }
}

impl LoopAlgorithm {
    pub fn overlap(overlap_rate: f64) -> Self {
        LoopAlgorithm::Overlap { overlap_rate }
    }

    pub fn tail(tail_time: f64, use_range_end: f64) -> Self {
        LoopAlgorithm::Tail {
            tail_time,
            use_range_duration: None,
            use_range_end,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LoopAlgorithm::Overlap { .. } => "overlap",
            LoopAlgorithm::Tail { .. } => "tail",
        }
    }

    /// Clamp parameters into their supported ranges.
    pub fn validated(&self) -> Self {
        match *self {
            LoopAlgorithm::Overlap { overlap_rate } => LoopAlgorithm::Overlap {
                overlap_rate: clamp_overlap(overlap_rate),
            },
            LoopAlgorithm::Tail {
                tail_time,
                use_range_duration,
                use_range_end,
            } => LoopAlgorithm::Tail {
                tail_time: non_negative(tail_time),
                use_range_duration: use_range_duration.map(non_negative),
                use_range_end: non_negative(use_range_end),
            },
        }
    }

    /// Build Track1 (loop head, faded in).
    pub fn build_track1(&self, use_range: &SampleBuffer, fade: &FadeSettings) -> SampleBuffer {
        match *self {
            LoopAlgorithm::Overlap { overlap_rate } => {
                track1::overlap_track(use_range, clamp_overlap(overlap_rate), fade)
            }
            LoopAlgorithm::Tail {
                tail_time,
                use_range_duration,
                ..
            } => {
                let range_duration = use_range_duration.unwrap_or_else(|| use_range.duration());
                let tail = non_negative(tail_time).min(range_duration.max(0.0));
                track1::tail_track(use_range, tail, fade)
            }
        }
    }

    /// Build Track2 (loop tail, faded out) padded to `track1_frames`.
    pub fn build_track2(
        &self,
        source: LoopSource<'_>,
        track1_frames: usize,
        fade: &FadeSettings,
    ) -> SampleBuffer {
        match *self {
            LoopAlgorithm::Overlap { overlap_rate } => track2::overlap_track(
                source.use_range,
                clamp_overlap(overlap_rate),
                track1_frames,
                fade,
            ),
            LoopAlgorithm::Tail {
                tail_time,
                use_range_duration,
                use_range_end,
            } => {
                let tail_time = non_negative(tail_time);
                match source.original {
                    Some(original) => {
                        let track1_duration =
                            track1_frames as f64 / original.sample_rate() as f64;
                        let remaining = (original.duration() - use_range_end).max(0.0);
                        let tail = tail_time.min(track1_duration).min(remaining);
                        track2::tail_track(original, use_range_end, tail, track1_frames, fade)
                    }
                    None => {
                        // Without the full recording the range itself is the post-roll.
                        let range_duration = use_range_duration
                            .unwrap_or_else(|| source.use_range.duration());
                        let tail = tail_time.min(range_duration.max(0.0));
                        track2::tail_track(source.use_range, 0.0, tail, track1_frames, fade)
                    }
                }
            }
        }
    }

    /// Build both tracks.
    pub fn build_tracks(&self, source: LoopSource<'_>, fades: &TrackFades) -> LoopTracks {
        let track1 = self.build_track1(source.use_range, &fades.track1);
        let track2 = self.build_track2(source, track1.frame_count(), &fades.track2);
        log::debug!(
            "built {} loop tracks: {} frames x {} ch",
            self.name(),
            track1.frame_count(),
            track1.channel_count()
        );
        LoopTracks { track1, track2 }
    }

    /// Where the fade sits on a track of `track_duration` seconds, for
    /// placing the fade editor's anchors. Both tracks fade from their start.
    pub fn fade_range(&self, _track: Track, track_duration: f64) -> FadeRange {
        let width = match *self {
            LoopAlgorithm::Overlap { overlap_rate } => {
                let rate = clamp_overlap(overlap_rate);
                if rate <= 0.0 {
                    0.0
                } else {
                    rate / (100.0 - rate)
                }
            }
            LoopAlgorithm::Tail { tail_time, .. } => {
                let tail_time = non_negative(tail_time);
                let track_duration = non_negative(track_duration);
                if tail_time <= 0.0 || track_duration <= 0.0 {
                    0.0
                } else {
                    tail_time / track_duration
                }
            }
        };
        FadeRange {
            fade_start_x: 0.0,
            fade_width: width.clamp(0.0, 1.0),
        }
    }

    pub fn render_options(&self, use_range_duration: f64) -> RenderOptions {
        match *self {
            LoopAlgorithm::Overlap { .. } => RenderOptions {
                algorithm: self.name(),
                show_tail_section: false,
                tail_time: None,
                use_range_duration: None,
            },
            LoopAlgorithm::Tail { tail_time, .. } => RenderOptions {
                algorithm: self.name(),
                show_tail_section: true,
                tail_time: Some(non_negative(tail_time)),
                use_range_duration: Some(use_range_duration),
            },
        }
    }
}

fn clamp_overlap(rate: f64) -> f64 {
    if rate.is_nan() {
        return 0.0;
    }
    rate.clamp(0.0, MAX_OVERLAP_RATE)
}

fn non_negative(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.max(0.0) }
}
