use thiserror::Error;

/// Top-level error for the fallible boundaries of the crate: buffer
/// construction, WAV decoding and configuration loading.
///
/// The signal-processing operations themselves never fail; they clamp or
/// fall back to an identity result instead.
#[derive(Debug, Error)]
pub enum LoopMakerError {
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("Unsupported WAV format: {bits}-bit {format}")]
    UnsupportedWav { bits: u16, format: &'static str },
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("sample rate must be greater than zero")]
    ZeroSampleRate,
    #[error("buffer needs at least one channel")]
    NoChannels,
    #[error("channel {channel} has {found} frames, expected {expected}")]
    ChannelLengthMismatch {
        channel: usize,
        expected: usize,
        found: usize,
    },
    #[error("{len} interleaved samples do not divide into {channels} channels")]
    InterleavedLength { len: usize, channels: usize },
}
