pub mod config;
pub mod dsp;
pub mod error;
pub mod looping;
pub mod resample;

pub use config::EditorConfig;
pub use dsp::buffer::SampleBuffer;
pub use dsp::fade::{FadeMode, FadeSettings};
pub use error::{BufferError, LoopMakerError};
pub use looping::{LoopAlgorithm, LoopSource, LoopTracks, TrackFades};
pub use resample::{
    DurationSearch, ResampleStrategy, Resampled, SearchOptions, SearchReport, SilenceCutConfig,
};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the loopmaker-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed: gain of a fade curve at normalized time `t`.
/// `mode` is a UI mode name (`linear`, `log`, `exp`, `custom`).
#[wasm_bindgen]
pub fn fade_gain(mode: &str, t: f64, control_x: f64, control_y: f64, fade_out: bool) -> f64 {
    let settings = FadeSettings::new(FadeMode::from_name(mode), control_x, control_y);
    if fade_out {
        settings.fade_out_gain(t)
    } else {
        settings.fade_in_gain(t)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoopRequest {
    use_range: SampleBuffer,
    #[serde(default)]
    original: Option<SampleBuffer>,
    #[serde(default)]
    algorithm: LoopAlgorithm,
    #[serde(default)]
    fades: TrackFades,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoopResponse {
    track1: SampleBuffer,
    track2: SampleBuffer,
    mixdown: SampleBuffer,
    fade_range: looping::FadeRange,
    render_options: looping::RenderOptions,
}

/// WASM-exposed: build both loop tracks and their mixdown.
///
/// `request` is `{ useRange, original?, algorithm, fades }` where buffers are
/// `{ sampleRate, channels: [[...]] }`.
#[wasm_bindgen]
pub fn loop_tracks(request: JsValue) -> Result<JsValue, JsValue> {
    let request: LoopRequest = serde_wasm_bindgen::from_value(request).map_err(to_js)?;
    let algorithm = request.algorithm.validated();

    let mut source = LoopSource::new(&request.use_range);
    if let Some(original) = request.original.as_ref() {
        source = source.with_original(original);
    }
    let tracks = algorithm.build_tracks(source, &request.fades);
    let mixdown = tracks.mixdown();
    let response = LoopResponse {
        fade_range: algorithm.fade_range(looping::Track::Track1, tracks.track1.duration()),
        render_options: algorithm.render_options(request.use_range.duration()),
        track1: tracks.track1,
        track2: tracks.track2,
        mixdown,
    };
    serde_wasm_bindgen::to_value(&response).map_err(to_js)
}

/// WASM-exposed: resample a buffer at `rate` with the named strategy
/// (`simple` or `silence-cut`). `silence_cut` may be undefined.
#[wasm_bindgen]
pub fn resample_samples(
    buffer: JsValue,
    rate: f64,
    strategy: &str,
    silence_cut: JsValue,
) -> Result<JsValue, JsValue> {
    let buffer: SampleBuffer = serde_wasm_bindgen::from_value(buffer).map_err(to_js)?;
    let strategy = match ResampleStrategy::from_name(strategy) {
        ResampleStrategy::SilenceCut(_) => ResampleStrategy::SilenceCut(optional(silence_cut)?),
        simple => simple,
    };
    let resampled = strategy.process(&buffer, rate);
    serde_wasm_bindgen::to_value(&resampled).map_err(to_js)
}

/// WASM-exposed: estimate the tempo of `[start, end)` seconds of mono samples.
#[wasm_bindgen]
pub fn estimate_tempo(
    samples: Vec<f32>,
    sample_rate: u32,
    start: f64,
    end: f64,
) -> Result<Option<f64>, JsValue> {
    let buffer = SampleBuffer::from_mono(samples, sample_rate).map_err(to_js)?;
    Ok(dsp::tempo::estimate_bpm(&buffer, start, end))
}

/// WASM-exposed: encode a buffer as 16-bit PCM WAV bytes.
#[wasm_bindgen]
pub fn buffer_to_wav(buffer: JsValue) -> Result<Vec<u8>, JsValue> {
    let buffer: SampleBuffer = serde_wasm_bindgen::from_value(buffer).map_err(to_js)?;
    Ok(dsp::wav::encode_wav(&buffer))
}

/// WASM-exposed: decode PCM WAV bytes into `{ sampleRate, channels }`.
#[wasm_bindgen]
pub fn wav_to_buffer(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let buffer = dsp::wav::decode_wav(bytes).map_err(to_js)?;
    serde_wasm_bindgen::to_value(&buffer).map_err(to_js)
}

/// WASM wrapper around [`DurationSearch`] so the page can run one pass per
/// animation frame and stay responsive.
#[wasm_bindgen]
pub struct DurationSearchHandle {
    search: DurationSearch,
}

#[wasm_bindgen]
impl DurationSearchHandle {
    /// - `buffer`: `{ sampleRate, channels }`
    /// - `rate`: playback rate to compensate for
    /// - `config`: starting silence-cut settings, or undefined for defaults
    /// - `options`: `{ tolerance, maxIterations }`, or undefined
    /// - `target`: target duration in seconds; defaults to the buffer's
    #[wasm_bindgen(constructor)]
    pub fn new(
        buffer: JsValue,
        rate: f64,
        config: JsValue,
        options: JsValue,
        target: Option<f64>,
    ) -> Result<DurationSearchHandle, JsValue> {
        let buffer: SampleBuffer = serde_wasm_bindgen::from_value(buffer).map_err(to_js)?;
        let mut search = DurationSearch::new(buffer, rate, optional(config)?)
            .with_options(optional::<SearchOptions>(options)?);
        if let Some(target) = target {
            search = search.with_target(target);
        }
        Ok(DurationSearchHandle { search })
    }

    /// Run one pass. Returns the pass record, or `null` once finished.
    pub fn step(&mut self) -> Result<JsValue, JsValue> {
        match self.search.next() {
            Some(record) => serde_wasm_bindgen::to_value(&record).map_err(to_js),
            None => Ok(JsValue::NULL),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.search.is_finished()
    }

    /// Best result so far. Consumes the handle.
    pub fn report(self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.search.into_report()).map_err(to_js)
    }
}

/// Deserialize `value`, treating `undefined`/`null` as the default.
fn optional<T: DeserializeOwned + Default>(value: JsValue) -> Result<T, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(T::default());
    }
    serde_wasm_bindgen::from_value(value).map_err(to_js)
}

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{e}"))
}
