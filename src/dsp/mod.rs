//! DSP building blocks: sample buffers, fade curves, mixing, tempo and WAV.
//!
//! Everything here works on whole in-memory buffers and returns new values;
//! the loop and resample modules are built on top of it.

pub mod buffer;
pub mod fade;
pub mod mixer;
pub mod tempo;
pub mod wav;
