//! 16-bit PCM WAV encoding
//!
//! Canonical 44-byte RIFF/WAVE header followed by interleaved little-endian
//! samples.

use thiserror::Error;

use crate::buffer::AudioBuffer;

const HEADER_LEN: usize = 44;
const BITS_PER_SAMPLE: u16 = 16;
const FORMAT_PCM: u16 = 1;

#[derive(Debug, Error)]
pub enum WavError {
    #[error("audio too large for a WAV file ({0} bytes of sample data)")]
    TooLarge(u64),
}

/// Convert a float sample to 16-bit PCM.
///
/// Clamps to [-1, 1], then scales negatives by 32768 and the rest by 32767
/// so both full-scale ends are reachable.
#[inline]
pub fn quantize(sample: f32) -> i16 {
    let s = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    let scaled = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
    scaled.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Inverse of `quantize`
#[cfg(test)]
pub(crate) fn dequantize(sample: i16) -> f32 {
    if sample < 0 {
        sample as f32 / 32768.0
    } else {
        sample as f32 / 32767.0
    }
}

/// Encode a buffer as a 16-bit PCM WAV file
pub fn encode_pcm16(buffer: &AudioBuffer) -> Result<Vec<u8>, WavError> {
    let channels = buffer.channels();
    let sample_rate = buffer.sample_rate();
    let data_len = buffer.samples().len() as u64 * 2;
    if data_len + HEADER_LEN as u64 - 8 > u32::MAX as u64 {
        return Err(WavError::TooLarge(data_len));
    }
    let data_len = data_len as u32;

    let block_align = channels * (BITS_PER_SAMPLE / 8);
    let byte_rate = sample_rate * block_align as u32;

    let mut out = Vec::with_capacity(HEADER_LEN + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for &s in buffer.samples() {
        out.extend_from_slice(&quantize(s).to_le_bytes());
    }

    Ok(out)
}

/// Read a 16-bit WAV back into a buffer
#[cfg(test)]
pub(crate) fn read_pcm16(bytes: &[u8]) -> Result<AudioBuffer, hound::Error> {
    let mut reader = hound::WavReader::new(std::io::Cursor::new(bytes))?;
    let spec = reader.spec();
    let samples = reader
        .samples::<i16>()
        .map(|s| s.map(dequantize))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(AudioBuffer::new(samples, spec.channels, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_extremes() {
        assert_eq!(quantize(1.0), 32767);
        assert_eq!(quantize(-1.0), -32768);
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(4.0), 32767);
        assert_eq!(quantize(-4.0), -32768);
        assert_eq!(quantize(f32::NAN), 0);
    }

    fn le_u16(bytes: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([bytes[at], bytes[at + 1]])
    }

    fn le_u32(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    #[test]
    fn test_header_layout() {
        let buffer = AudioBuffer::new(vec![0.0; 8], 2, 44100);
        let bytes = encode_pcm16(&buffer).unwrap();
        assert_eq!(bytes.len(), 44 + 16);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(le_u32(&bytes, 4), 36 + 16);
        assert_eq!(&bytes[8..16], b"WAVEfmt ");
        assert_eq!(le_u32(&bytes, 16), 16);
        assert_eq!(le_u16(&bytes, 20), 1);
        assert_eq!(le_u16(&bytes, 22), 2);
        assert_eq!(le_u32(&bytes, 24), 44100);
        assert_eq!(le_u32(&bytes, 28), 44100 * 4);
        assert_eq!(le_u16(&bytes, 32), 4);
        assert_eq!(le_u16(&bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(le_u32(&bytes, 40), 16);
    }

    #[test]
    fn test_hound_reads_export() {
        let samples: Vec<f32> = (0..64).map(|i| ((i as f32) * 0.3).sin() * 0.9).collect();
        let bytes = encode_pcm16(&AudioBuffer::new(samples.clone(), 1, 22050)).unwrap();

        let reader = hound::WavReader::new(std::io::Cursor::new(&bytes[..])).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 22050);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);
        assert_eq!(reader.duration(), 64);

        let decoded = read_pcm16(&bytes).unwrap();
        for (a, b) in samples.iter().zip(decoded.samples()) {
            assert!((a - b).abs() <= 1.0 / 32768.0);
        }
    }

    #[test]
    fn test_full_scale_survives() {
        let bytes = encode_pcm16(&AudioBuffer::new(vec![1.0, -1.0, 0.0], 1, 8000)).unwrap();
        let decoded = read_pcm16(&bytes).unwrap();
        assert_eq!(decoded.samples(), &[1.0, -1.0, 0.0]);
    }
}
