//! Editor session settings, saved and restored as JSON.

use serde::{Deserialize, Serialize};

use crate::dsp::fade::FadeSettings;
use crate::error::LoopMakerError;
use crate::looping::{LoopAlgorithm, TrackFades};
use crate::resample::{ResampleStrategy, SearchOptions, SilenceCutConfig};

/// Lowest and highest playback rates the slowdown tool offers.
pub const MIN_PLAYBACK_RATE: f64 = 0.1;
pub const MAX_PLAYBACK_RATE: f64 = 4.0;

/// Everything a session needs to rebuild its output. Missing fields take
/// their defaults, so older saved sessions still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    pub track1_fade: FadeSettings,
    pub track2_fade: FadeSettings,
    pub loop_algorithm: LoopAlgorithm,
    /// `"simple"` or `"silence-cut"`.
    pub resample_strategy: String,
    pub playback_rate: f64,
    pub silence_cut: SilenceCutConfig,
    pub search: SearchOptions,
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            track1_fade: FadeSettings::default(),
            track2_fade: FadeSettings::default(),
            loop_algorithm: LoopAlgorithm::default(),
            resample_strategy: ResampleStrategy::Simple.name().to_string(),
            playback_rate: 1.0,
            silence_cut: SilenceCutConfig::default(),
            search: SearchOptions::default(),
        }
    }
}

impl EditorConfig {
    /// Parse and validate a saved session.
    pub fn from_json(json: &str) -> Result<Self, LoopMakerError> {
        let config: EditorConfig = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    pub fn to_json(&self) -> Result<String, LoopMakerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Clamp every value into the range the processors accept and normalize
    /// the strategy name.
    pub fn validated(self) -> Self {
        let playback_rate = if self.playback_rate.is_finite() {
            self.playback_rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE)
        } else {
            1.0
        };
        EditorConfig {
            track1_fade: self.track1_fade.validated(),
            track2_fade: self.track2_fade.validated(),
            loop_algorithm: self.loop_algorithm.validated(),
            resample_strategy: ResampleStrategy::from_name(&self.resample_strategy)
                .name()
                .to_string(),
            playback_rate,
            silence_cut: self.silence_cut.sanitized(),
            search: self.search.validated(),
        }
    }

    pub fn fades(&self) -> TrackFades {
        TrackFades {
            track1: self.track1_fade,
            track2: self.track2_fade,
        }
    }

    /// The configured strategy, carrying this session's silence settings.
    pub fn strategy(&self) -> ResampleStrategy {
        match ResampleStrategy::from_name(&self.resample_strategy) {
            ResampleStrategy::SilenceCut(_) => ResampleStrategy::SilenceCut(self.silence_cut),
            simple => simple,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::fade::FadeMode;

    #[test]
    fn empty_json_is_default() {
        let config = EditorConfig::from_json("{}").unwrap();
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.strategy(), ResampleStrategy::Simple);
    }

    #[test]
    fn roundtrip_through_json() {
        let config = EditorConfig {
            track1_fade: FadeSettings::new(FadeMode::Custom, 0.3, 0.7),
            loop_algorithm: LoopAlgorithm::tail(1.25, 4.0),
            resample_strategy: "silence-cut".into(),
            playback_rate: 0.75,
            silence_cut: SilenceCutConfig::default().with_cut_ratios(0.5, 8.0),
            ..Default::default()
        };
        let json = config.to_json().unwrap();
        assert!(json.contains("\"track1Fade\""), "camelCase keys: {json}");
        assert_eq!(EditorConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn values_are_clamped_on_load() {
        let json = r#"{
            "track2Fade": { "mode": "custom", "controlX": 2.0, "controlY": -1.0 },
            "loopAlgorithm": { "algorithm": "overlap", "overlapRate": 90.0 },
            "resampleStrategy": "granular",
            "playbackRate": 12.0,
            "silenceCut": { "minSilenceRate": 9.0, "maxSilenceRate": 3.0 },
            "search": { "maxIterations": 0 }
        }"#;
        let config = EditorConfig::from_json(json).unwrap();
        assert_eq!(config.track2_fade.control_x, 0.9);
        assert_eq!(config.track2_fade.control_y, 0.1);
        assert_eq!(config.loop_algorithm, LoopAlgorithm::overlap(50.0));
        assert_eq!(config.resample_strategy, "simple");
        assert_eq!(config.playback_rate, MAX_PLAYBACK_RATE);
        assert!(config.silence_cut.min_silence_rate() <= config.silence_cut.max_silence_rate());
        assert_eq!(config.search.max_iterations, 1);
    }

    #[test]
    fn silence_cut_strategy_carries_settings() {
        let config = EditorConfig {
            resample_strategy: "silence-cut".into(),
            silence_cut: SilenceCutConfig::default().with_correction_strength(2.0),
            ..Default::default()
        };
        assert_eq!(
            config.strategy(),
            ResampleStrategy::SilenceCut(SilenceCutConfig::default().with_correction_strength(2.0))
        );
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            EditorConfig::from_json("{ not json"),
            Err(LoopMakerError::Config(_))
        ));
    }
}
