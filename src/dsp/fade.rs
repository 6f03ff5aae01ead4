//! Fade curve evaluator.
//!
//! Maps normalized time in [0, 1] to a gain in [0, 1]. Every curve starts at
//! 0 and ends at 1; fade-outs are expressed as `1 - gain`.

use serde::{Deserialize, Serialize};

/// Steepness of the logarithmic and exponential curves.
pub const CURVE_STEEPNESS: f64 = 4.0;

/// Limits for the custom curve's control point.
pub const CONTROL_MIN: f64 = 0.1;
pub const CONTROL_MAX: f64 = 0.9;

/// Smallest exponent of the custom curve's time warp (near-vertical edge).
const MIN_WARP_POWER: f64 = 0.01;

/// Curve families offered by the fade editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FadeMode {
    Linear,
    /// Slow start, fast finish.
    #[default]
    #[serde(alias = "log")]
    Logarithmic,
    /// Fast start, slow finish.
    #[serde(alias = "exp")]
    Exponential,
    /// Quadratic Bézier through a draggable control point.
    Custom,
}

impl FadeMode {
    /// Parse a UI mode name. Unknown names fall back to logarithmic.
    pub fn from_name(name: &str) -> Self {
        match name {
            "linear" => FadeMode::Linear,
            "exp" | "exponential" => FadeMode::Exponential,
            "custom" => FadeMode::Custom,
            _ => FadeMode::Logarithmic,
        }
    }
}

/// Control point of the custom curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoint {
    pub x: f64,
    pub y: f64,
}

impl ControlPoint {
    /// Clamp both coordinates into the editable range.
    pub fn new(x: f64, y: f64) -> Self {
        ControlPoint {
            x: clamp_control(x),
            y: clamp_control(y),
        }
    }
}

/// Fade configuration for one track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FadeSettings {
    pub mode: FadeMode,
    /// Only meaningful when `mode` is `Custom`.
    pub control_x: f64,
    pub control_y: f64,
}

impl Default for FadeSettings {
    fn default() -> Self {
        FadeSettings {
            mode: FadeMode::Logarithmic,
            control_x: 0.5,
            control_y: 0.5,
        }
    }
}

impl FadeSettings {
    pub fn new(mode: FadeMode, control_x: f64, control_y: f64) -> Self {
        FadeSettings {
            mode,
            control_x: clamp_control(control_x),
            control_y: clamp_control(control_y),
        }
    }

    pub fn linear() -> Self {
        Self::new(FadeMode::Linear, 0.5, 0.5)
    }

    /// Re-apply the control point limits, e.g. after deserializing.
    pub fn validated(self) -> Self {
        Self::new(self.mode, self.control_x, self.control_y)
    }

    pub fn control_point(&self) -> ControlPoint {
        ControlPoint::new(self.control_x, self.control_y)
    }

    /// Gain for a fade-in at normalized time `t`.
    pub fn fade_in_gain(&self, t: f64) -> f64 {
        evaluate(self.mode, t, Some(self.control_point()), false)
    }

    /// Gain for a fade-out at normalized time `t` (1 at the start, 0 at the end).
    pub fn fade_out_gain(&self, t: f64) -> f64 {
        1.0 - evaluate(self.mode, t, Some(self.control_point()), true)
    }
}

fn clamp_control(v: f64) -> f64 {
    if v.is_nan() {
        return 0.5;
    }
    v.clamp(CONTROL_MIN, CONTROL_MAX)
}

/// Evaluate a fade curve at normalized time `t` (clamped to [0, 1]).
///
/// `Custom` without a control point evaluates as logarithmic. Fade-ins and
/// fade-outs share one curve; the caller inverts the gain for a fade-out, so
/// a small `x` drops steeply at the start and a large `x` at the end.
/// `_is_fade_out` is accepted for callers that pass the fade direction.
pub fn evaluate(mode: FadeMode, t: f64, control: Option<ControlPoint>, _is_fade_out: bool) -> f64 {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

    match (mode, control) {
        (FadeMode::Linear, _) => t,
        (FadeMode::Exponential, _) => exponential(t),
        (FadeMode::Custom, Some(cp)) => quadratic_bezier(t, cp),
        (FadeMode::Logarithmic, _) | (FadeMode::Custom, None) => logarithmic(t),
    }
}

fn logarithmic(t: f64) -> f64 {
    (CURVE_STEEPNESS * t).ln_1p() / CURVE_STEEPNESS.ln_1p()
}

fn exponential(t: f64) -> f64 {
    (CURVE_STEEPNESS * t).exp_m1() / CURVE_STEEPNESS.exp_m1()
}

/// Quadratic Bézier P0=(0,0), P1=(x,y), P2=(1,1), evaluated on a time
/// parameter warped by the control point's horizontal position.
fn quadratic_bezier(t: f64, cp: ControlPoint) -> f64 {
    let u = warp_time(t, cp.x);
    let inv = 1.0 - u;
    2.0 * inv * u * cp.y + u * u
}

/// Pull the steepest part of the curve towards the start (`x < 0.5`) or the
/// end (`x >= 0.5`). The exponent falls towards `MIN_WARP_POWER` as `x`
/// approaches either edge.
fn warp_time(t: f64, x: f64) -> f64 {
    if x < 0.5 {
        let left = 1.0 - x / 0.5;
        let power = 1.0 - left * (1.0 - MIN_WARP_POWER);
        t.powf(power)
    } else {
        let right = (x - 0.5) / 0.5;
        let power = 1.0 - right * (1.0 - MIN_WARP_POWER);
        1.0 - (1.0 - t).powf(power)
    }
}
