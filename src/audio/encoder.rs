use super::capture::TARGET_SAMPLE_RATE;

/// Convert one float sample in [-1.0, 1.0] to signed 16-bit PCM.
///
/// Out-of-range input is clamped first, then scaled and rounded. The
/// conversion is deterministic: no dithering, no noise shaping.
pub fn sample_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

/// Inverse of [`sample_to_i16`], accurate to within one quantization step.
pub fn i16_to_sample(sample: i16) -> f32 {
    sample as f32 / 32767.0
}

/// Downmix interleaved multi-channel samples to mono by averaging.
pub fn downmix_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    let channels = channels.max(1);
    if channels == 1 {
        return interleaved.to_vec();
    }

    let mut mono = Vec::with_capacity(interleaved.len() / channels);
    for frame in interleaved.chunks(channels) {
        let sum: f32 = frame.iter().sum();
        mono.push(sum / channels as f32);
    }
    mono
}

/// Serialize a PCM frame to little-endian bytes for transport.
///
/// No length prefix; the message boundary is the frame boundary.
pub fn frame_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Stateful mono f32 -> 16kHz i16 PCM encoder.
///
/// Carries the fractional resample position and the last input sample
/// across calls, so the output is identical no matter how the input is
/// chunked: samples at a chunk boundary interpolate with the previous
/// chunk's tail instead of extrapolating.
pub struct PcmEncoder {
    input_rate: u32,
    resample_pos: f64,
    carry: Option<f32>,
}

impl PcmEncoder {
    pub fn new(input_rate: u32) -> Self {
        Self {
            input_rate,
            resample_pos: 0.0,
            carry: None,
        }
    }

    /// Encode a chunk of mono float samples at the input rate into 16-bit
    /// PCM at the target rate. Input at the target rate is quantized as-is.
    pub fn encode(&mut self, mono: &[f32]) -> Vec<i16> {
        if mono.is_empty() {
            return Vec::new();
        }

        if self.input_rate == TARGET_SAMPLE_RATE {
            return mono.iter().copied().map(sample_to_i16).collect();
        }

        // Linear interpolation resample. The previous chunk's last sample
        // sits at index 0 of the working buffer; `resample_pos` is relative
        // to it and stays in [0, ratio).
        let ratio = self.input_rate as f64 / TARGET_SAMPLE_RATE as f64;
        let mut buf = Vec::with_capacity(mono.len() + 1);
        if let Some(prev) = self.carry {
            buf.push(prev);
        }
        buf.extend_from_slice(mono);

        let mut out = Vec::with_capacity((mono.len() as f64 / ratio) as usize + 1);
        let mut pos = self.resample_pos;

        while pos + 1.0 < buf.len() as f64 {
            let idx = pos as usize;
            let frac = pos - idx as f64;
            let a = buf[idx] as f64;
            let b = buf[idx + 1] as f64;
            out.push(sample_to_i16((a * (1.0 - frac) + b * frac) as f32));
            pos += ratio;
        }

        self.carry = Some(buf[buf.len() - 1]);
        self.resample_pos = pos - (buf.len() - 1) as f64;
        out
    }

    /// Reset resampler state (fresh capture sequence).
    pub fn reset(&mut self) {
        self.resample_pos = 0.0;
        self.carry = None;
    }
}
