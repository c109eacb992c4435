//! PCM codec for the fixed wire format
//!
//! The remote endpoint speaks 16-bit little-endian PCM carried over a
//! text channel as base64. Conversion between the device's f32 sample
//! buffers and that format is pure and stateless.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;

use crate::error::MalformedAudioError;

/// Scale factor between f32 samples in [-1, 1] and i16 PCM.
const PCM_SCALE: f32 = 32768.0;

/// Encode f32 samples to 16-bit little-endian PCM bytes.
///
/// Out-of-range samples are clamped, never rejected.
pub fn encode(samples: &[f32]) -> Bytes {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let value = (sample * PCM_SCALE).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }
    Bytes::from(out)
}

/// Decode 16-bit little-endian PCM bytes to f32 samples in [-1, 1].
pub fn decode(bytes: &[u8]) -> Result<Vec<f32>, MalformedAudioError> {
    if bytes.len() % 2 != 0 {
        return Err(MalformedAudioError::OddByteLength(bytes.len()));
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / PCM_SCALE)
        .collect();

    Ok(samples)
}

/// Encode raw bytes into the text-safe transport representation.
pub fn wire_encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode the text-safe transport representation back into raw bytes.
pub fn wire_decode(text: &str) -> Result<Vec<u8>, MalformedAudioError> {
    BASE64
        .decode(text)
        .map_err(|e| MalformedAudioError::InvalidWireEncoding(e.to_string()))
}
