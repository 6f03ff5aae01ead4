//! Duration-convergence search.
//!
//! Repeatedly runs the silence-cut resampler, nudging its silence rates and
//! correction strength until the output duration lands within tolerance of
//! a target. The search is an [`Iterator`]: each `next()` is one resample
//! pass, so a host can yield to its event loop between passes or simply
//! stop pulling to cancel.

use serde::{Deserialize, Serialize};

use super::silence_cut::{MIN_SILENCE_RATE, SilenceCutConfig};
use super::{ResampleStrategy, Resampled};
use crate::dsp::buffer::SampleBuffer;

const DEFAULT_TOLERANCE: f64 = 0.01;
const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Stopping rules for [`DurationSearch`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchOptions {
    /// Acceptable |achieved - target| in seconds.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl SearchOptions {
    pub fn validated(self) -> Self {
        let tolerance = if self.tolerance.is_finite() && self.tolerance > 0.0 {
            self.tolerance
        } else {
            DEFAULT_TOLERANCE
        };
        SearchOptions {
            tolerance,
            max_iterations: self.max_iterations.max(1),
        }
    }
}

/// One resample pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationRecord {
    pub iteration: usize,
    pub config: SilenceCutConfig,
    pub duration: f64,
    /// `duration - target`; positive means too long.
    pub diff: f64,
}

/// Outcome of a search: the best pass seen, whether or not it converged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchReport {
    pub config: SilenceCutConfig,
    pub resampled: Resampled,
    pub target_duration: f64,
    pub achieved_duration: f64,
    /// |achieved - target| in seconds.
    pub residual: f64,
    pub iterations: usize,
    pub converged: bool,
    pub trace: Vec<IterationRecord>,
}

#[derive(Debug, Clone)]
struct Best {
    config: SilenceCutConfig,
    resampled: Resampled,
    diff: f64,
}

/// Iterative search for the silence-cut settings that hit a target duration.
#[derive(Debug, Clone)]
pub struct DurationSearch {
    source: SampleBuffer,
    rate: f64,
    target: f64,
    options: SearchOptions,
    config: SilenceCutConfig,
    previous: Option<(SilenceCutConfig, f64)>,
    iteration: usize,
    converged: bool,
    best: Option<Best>,
    trace: Vec<IterationRecord>,
}

impl DurationSearch {
    /// Search for settings that keep `source` at its own duration when
    /// played at `rate`, starting from `config`.
    pub fn new(source: SampleBuffer, rate: f64, config: SilenceCutConfig) -> Self {
        let target = source.duration();
        DurationSearch {
            source,
            rate,
            target,
            options: SearchOptions::default(),
            config: config.sanitized(),
            previous: None,
            iteration: 0,
            converged: false,
            best: None,
            trace: Vec::new(),
        }
    }

    /// Aim for `target` seconds instead of the source duration. Negative or
    /// non-finite targets are ignored.
    pub fn with_target(mut self, target: f64) -> Self {
        if target.is_finite() && target >= 0.0 {
            self.target = target;
        }
        self
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options.validated();
        self
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn is_converged(&self) -> bool {
        self.converged
    }

    /// Whether another call to `next()` would run a pass.
    pub fn is_finished(&self) -> bool {
        self.converged || self.iteration >= self.options.max_iterations
    }

    pub fn trace(&self) -> &[IterationRecord] {
        &self.trace
    }

    /// Drive the search until it converges or runs out of iterations.
    pub fn run(mut self) -> SearchReport {
        for _ in self.by_ref() {}
        self.into_report()
    }

    /// Best result so far. A search that never ran is evaluated once with
    /// its starting settings.
    pub fn into_report(self) -> SearchReport {
        let best = match self.best {
            Some(best) => best,
            None => {
                let resampled =
                    ResampleStrategy::SilenceCut(self.config).process(&self.source, self.rate);
                let diff = resampled.duration() - self.target;
                Best {
                    config: self.config,
                    resampled,
                    diff,
                }
            }
        };
        SearchReport {
            config: best.config,
            achieved_duration: best.resampled.duration(),
            resampled: best.resampled,
            target_duration: self.target,
            residual: best.diff.abs(),
            iterations: self.iteration,
            converged: self.converged,
            trace: self.trace,
        }
    }
}

impl Iterator for DurationSearch {
    type Item = IterationRecord;

    fn next(&mut self) -> Option<IterationRecord> {
        if self.is_finished() {
            return None;
        }

        let iteration = self.iteration;
        let resampled =
            ResampleStrategy::SilenceCut(self.config).process(&self.source, self.rate);
        let duration = resampled.duration();
        let diff = duration - self.target;
        let record = IterationRecord {
            iteration,
            config: self.config,
            duration,
            diff,
        };
        log::debug!(
            "search pass {iteration}: {duration:.4}s (diff {diff:+.4}s) min={:.3} max={:.3} strength={:.3}",
            self.config.min_silence_rate(),
            self.config.max_silence_rate(),
            self.config.correction_strength()
        );

        if self.best.as_ref().is_none_or(|b| diff.abs() < b.diff.abs()) {
            self.best = Some(Best {
                config: self.config,
                resampled,
                diff,
            });
        }

        if diff.abs() < self.options.tolerance {
            self.converged = true;
        } else {
            let previous_config = self.previous.map(|(c, _)| c);
            let previous_diff = self.previous.map(|(_, d)| d);
            let next = next_config(
                &self.config,
                previous_config.as_ref(),
                diff,
                previous_diff,
                self.target,
                iteration,
            );
            self.previous = Some((self.config, diff));
            self.config = next;
        }
        self.iteration += 1;

        if !self.converged && self.iteration >= self.options.max_iterations {
            let residual = self.best.as_ref().map_or(diff.abs(), |b| b.diff.abs());
            log::warn!(
                "duration search gave up after {} passes, best residual {residual:.4}s",
                self.iteration
            );
        }

        self.trace.push(record.clone());
        Some(record)
    }
}

/// Step-size multiplier: large early steps, finer ones later.
pub fn aggressiveness(iteration: usize) -> f64 {
    match iteration {
        0..=4 => 10.0,
        5..=9 => 5.0,
        _ => 2.0,
    }
}

/// Settings for the pass after `current`, which missed the target by
/// `diff` seconds.
///
/// When the error changed sign since the previous pass the two settings are
/// averaged. Otherwise the rates and strength move by a step proportional to
/// the relative error: a too-long result raises the maximum silence rate, a
/// too-short one lowers the minimum.
pub fn next_config(
    current: &SilenceCutConfig,
    previous: Option<&SilenceCutConfig>,
    diff: f64,
    previous_diff: Option<f64>,
    target: f64,
    iteration: usize,
) -> SilenceCutConfig {
    let too_long = diff > 0.0;

    if let (Some(previous), Some(previous_diff)) = (previous, previous_diff) {
        let overshot = (previous_diff > 0.0) != too_long;
        if overshot {
            return current.with_tuning(
                (current.min_silence_rate() + previous.min_silence_rate()) / 2.0,
                (current.max_silence_rate() + previous.max_silence_rate()) / 2.0,
                (current.correction_strength() + previous.correction_strength()) / 2.0,
            );
        }
    }

    let relative_error = if target > 0.0 {
        (diff.abs() / target).min(1.0)
    } else {
        1.0
    };
    let step = relative_error * aggressiveness(iteration);
    let strength = current.correction_strength() + step;

    if too_long {
        current.with_tuning(
            current.min_silence_rate().max(1.0),
            current.max_silence_rate() * (1.0 + step),
            strength,
        )
    } else {
        current.with_tuning(
            (current.min_silence_rate() / (1.0 + step)).max(MIN_SILENCE_RATE),
            current.max_silence_rate(),
            strength,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SR: u32 = 8000;

    fn tone(seconds: f64) -> Vec<f32> {
        let n = (SR as f64 * seconds) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / SR as f32).sin() * 0.5)
            .collect()
    }

    /// 4 s tone, 2 s silence, 4 s tone.
    fn speech_like() -> SampleBuffer {
        let mut data = tone(4.0);
        data.extend(std::iter::repeat_n(0.0, 2 * SR as usize));
        data.extend(tone(4.0));
        SampleBuffer::from_mono(data, SR).unwrap()
    }

    fn tuning(c: &SilenceCutConfig) -> (f64, f64, f64) {
        (c.min_silence_rate(), c.max_silence_rate(), c.correction_strength())
    }

    #[test]
    fn aggressiveness_schedule() {
        assert_eq!(aggressiveness(0), 10.0);
        assert_eq!(aggressiveness(4), 10.0);
        assert_eq!(aggressiveness(5), 5.0);
        assert_eq!(aggressiveness(9), 5.0);
        assert_eq!(aggressiveness(10), 2.0);
        assert_eq!(aggressiveness(19), 2.0);
    }

    #[test]
    fn too_long_raises_max_rate() {
        let next = next_config(&SilenceCutConfig::default(), None, 1.0, None, 10.0, 0);
        let (min, max, strength) = tuning(&next);
        assert_eq!(min, 1.0);
        assert_relative_eq!(max, 8.0, epsilon = 1e-12);
        assert_relative_eq!(strength, 1.5, epsilon = 1e-12);
    }

    #[test]
    fn too_long_restores_min_rate() {
        let current = SilenceCutConfig::default().with_cut_ratios(0.5, 4.0);
        let next = next_config(&current, None, 0.5, None, 10.0, 12);
        let (min, max, strength) = tuning(&next);
        assert_eq!(min, 1.0);
        assert_relative_eq!(max, 4.4, epsilon = 1e-12);
        assert_relative_eq!(strength, 0.6, epsilon = 1e-12);
    }

    #[test]
    fn too_short_lowers_min_rate() {
        let next = next_config(&SilenceCutConfig::default(), None, -2.0, None, 10.0, 5);
        let (min, max, strength) = tuning(&next);
        assert_relative_eq!(min, 0.5, epsilon = 1e-12);
        assert_eq!(max, 4.0);
        assert_relative_eq!(strength, 1.5, epsilon = 1e-12);
    }

    #[test]
    fn min_rate_has_a_floor() {
        let current = SilenceCutConfig::default().with_cut_ratios(0.002, 4.0);
        // Relative error caps at 1, so the step is 10
        let next = next_config(&current, None, -100.0, None, 10.0, 0);
        assert_eq!(next.min_silence_rate(), MIN_SILENCE_RATE);
        assert_relative_eq!(next.correction_strength(), 10.5, epsilon = 1e-12);
    }

    #[test]
    fn overshoot_averages_settings() {
        let previous = SilenceCutConfig::default();
        let current = previous.with_max_silence_rate(8.0).with_correction_strength(1.5);
        let next = next_config(&current, Some(&previous), -0.2, Some(1.0), 10.0, 1);
        let (min, max, strength) = tuning(&next);
        assert_eq!(min, 1.0);
        assert_relative_eq!(max, 6.0, epsilon = 1e-12);
        assert_relative_eq!(strength, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn same_sign_keeps_stepping() {
        let previous = SilenceCutConfig::default();
        let next = next_config(&previous, Some(&previous), 1.0, Some(2.0), 10.0, 0);
        assert_relative_eq!(next.max_silence_rate(), 8.0, epsilon = 1e-12);
    }

    #[test]
    fn identity_rate_converges_immediately() {
        let report = DurationSearch::new(speech_like(), 1.0, SilenceCutConfig::default()).run();
        assert!(report.converged);
        assert_eq!(report.iterations, 1);
        assert_eq!(report.residual, 0.0);
        assert!(report.resampled.rate_history.is_none());
    }

    #[test]
    fn slowed_speech_moves_toward_original_length() {
        let source = speech_like();
        let report = DurationSearch::new(source, 0.7, SilenceCutConfig::default()).run();

        assert!(!report.trace.is_empty());
        assert_eq!(report.trace.len(), report.iterations);
        let initial_gap = report.trace[0].diff.abs();
        assert!(initial_gap > 1.0, "plain slowdown should overshoot: {initial_gap}");
        assert!(
            report.converged || report.residual < initial_gap,
            "residual {} did not improve on {initial_gap}",
            report.residual
        );
        if !report.converged {
            assert_eq!(report.iterations, DEFAULT_MAX_ITERATIONS);
        }
        assert_relative_eq!(report.target_duration, 10.0, epsilon = 1e-12);
    }

    #[test]
    fn report_keeps_best_pass() {
        let source = SampleBuffer::silent(1, 6 * SR as usize, SR);
        let report = DurationSearch::new(source, 0.9, SilenceCutConfig::default()).run();

        let best = report
            .trace
            .iter()
            .map(|r| r.diff.abs())
            .fold(f64::INFINITY, f64::min);
        assert_eq!(report.residual, best);
        assert!(report.residual < report.trace[0].diff.abs() || report.iterations == 1);
        assert_relative_eq!(report.achieved_duration, report.resampled.buffer.duration());
    }

    #[test]
    fn stepping_stops_when_finished() {
        let options = SearchOptions {
            tolerance: 1e-9,
            max_iterations: 3,
        };
        let mut search = DurationSearch::new(speech_like(), 0.8, SilenceCutConfig::default())
            .with_options(options);
        assert_eq!(search.by_ref().count(), 3);
        assert!(search.is_finished());
        assert!(search.next().is_none());
        assert_eq!(search.trace().len(), 3);

        let iterations: Vec<usize> = search.trace().iter().map(|r| r.iteration).collect();
        assert_eq!(iterations, vec![0, 1, 2]);
        let report = search.into_report();
        assert!(!report.converged);
        assert_eq!(report.iterations, 3);
    }

    #[test]
    fn explicit_target_is_used() {
        let search = DurationSearch::new(speech_like(), 0.8, SilenceCutConfig::default())
            .with_target(11.0)
            .with_target(f64::NAN);
        assert_eq!(search.target(), 11.0);
    }

    #[test]
    fn unrun_search_still_reports() {
        let report = DurationSearch::new(speech_like(), 1.0, SilenceCutConfig::default()).into_report();
        assert_eq!(report.iterations, 0);
        assert!(!report.converged);
        assert_eq!(report.residual, 0.0);
    }

    #[test]
    fn options_are_validated() {
        let o = SearchOptions {
            tolerance: -1.0,
            max_iterations: 0,
        }
        .validated();
        assert_eq!(o.tolerance, DEFAULT_TOLERANCE);
        assert_eq!(o.max_iterations, 1);
    }
}
