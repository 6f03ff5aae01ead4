//! WAV codec: 16-bit PCM encoder and a `hound`-backed decoder.

use std::io::Cursor;

use hound::{SampleFormat, WavReader};

use super::buffer::SampleBuffer;
use crate::error::LoopMakerError;

/// Encode a buffer as canonical 16-bit PCM WAV bytes (44-byte header,
/// interleaved little-endian samples).
pub fn encode_wav(buffer: &SampleBuffer) -> Vec<u8> {
    let channels = buffer.channel_count() as u16;
    let sample_rate = buffer.sample_rate();
    let pcm: Vec<i16> = buffer.to_interleaved().into_iter().map(to_i16).collect();

    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data_size = (pcm.len() * 2) as u32;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(44 + data_size as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for sample in pcm {
        buf.extend_from_slice(&sample.to_le_bytes());
    }

    buf
}

/// Asymmetric scaling so that -1.0 maps to -32768 and 1.0 to 32767.
fn to_i16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    let scaled = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
    scaled.round() as i16
}

/// Decode PCM WAV bytes (8/16/24/32-bit integer or 32-bit float).
pub fn decode_wav(bytes: &[u8]) -> Result<SampleBuffer, LoopMakerError> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    log::debug!(
        "decoding WAV: {} ch, {} Hz, {}-bit {:?}",
        spec.channels,
        spec.sample_rate,
        spec.bits_per_sample,
        spec.sample_format
    );

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits @ 1..=32) => {
            let scale = 1.0 / (1u64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
        (format, bits) => {
            let format = match format {
                SampleFormat::Float => "float",
                SampleFormat::Int => "integer",
            };
            log::warn!("rejecting {bits}-bit {format} WAV");
            return Err(LoopMakerError::UnsupportedWav { bits, format });
        }
    };

    let buffer =
        SampleBuffer::from_interleaved(&interleaved, spec.channels as usize, spec.sample_rate)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Positive samples scale by 32767 but decode by 32768, so the fixture
    // stays under half scale to keep the round trip within one LSB.
    fn stereo_fixture() -> SampleBuffer {
        let left: Vec<f32> = (0..441)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin() * 0.45)
            .collect();
        let right: Vec<f32> = left.iter().map(|s| -s * 0.5).collect();
        SampleBuffer::new(44100, vec![left, right]).unwrap()
    }

    #[test]
    fn wav_header_valid() {
        let wav = encode_wav(&stereo_fixture());

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");

        // PCM format tag
        assert_eq!(u16::from_le_bytes([wav[20], wav[21]]), 1);
        // Channels
        assert_eq!(u16::from_le_bytes([wav[22], wav[23]]), 2);
        // Sample rate
        let sr = u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]);
        assert_eq!(sr, 44100);
        // Bits per sample
        assert_eq!(u16::from_le_bytes([wav[34], wav[35]]), 16);
    }

    #[test]
    fn wav_size_correct() {
        let wav = encode_wav(&stereo_fixture());

        // 441 frames * 2 channels * 2 bytes
        let data_size = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]);
        assert_eq!(data_size, 1764);
        assert_eq!(wav.len(), 44 + 1764);
        let riff_size = u32::from_le_bytes([wav[4], wav[5], wav[6], wav[7]]);
        assert_eq!(riff_size, 36 + 1764);
    }

    #[test]
    fn sample_scaling_is_asymmetric() {
        assert_eq!(to_i16(1.0), 32767);
        assert_eq!(to_i16(-1.0), -32768);
        assert_eq!(to_i16(2.5), 32767);
        assert_eq!(to_i16(-7.0), -32768);
        assert_eq!(to_i16(0.0), 0);
        assert_eq!(to_i16(0.5), 16384); // round(16383.5)
    }

    #[test]
    fn samples_are_interleaved() {
        let buf = SampleBuffer::new(8000, vec![vec![1.0, 0.0], vec![-1.0, 0.5]]).unwrap();
        let wav = encode_wav(&buf);
        let pcm: Vec<i16> = wav[44..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(pcm, vec![32767, -32768, 0, 16384]);
    }

    #[test]
    fn roundtrip_within_quantization() {
        let original = stereo_fixture();
        let decoded = decode_wav(&encode_wav(&original)).unwrap();

        assert_eq!(decoded.sample_rate(), original.sample_rate());
        assert_eq!(decoded.channel_count(), 2);
        assert_eq!(decoded.frame_count(), original.frame_count());
        for (a, b) in original.channels().iter().zip(decoded.channels()) {
            for (x, y) in a.iter().zip(b) {
                assert!(
                    (x - y).abs() <= 1.0 / 32768.0,
                    "sample drifted past 16-bit precision: {x} vs {y}"
                );
            }
        }
    }

    #[test]
    fn decodes_float_wav() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in [0.25f32, -0.5, 0.75] {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        let buf = decode_wav(cursor.get_ref()).unwrap();
        assert_eq!(buf.sample_rate(), 16000);
        assert_eq!(buf.channel(0).unwrap(), &[0.25f32, -0.5, 0.75]);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(matches!(
            decode_wav(b"definitely not a wav file"),
            Err(LoopMakerError::Wav(_))
        ));
    }
}
