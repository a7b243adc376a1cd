use medscribe::audio::encoder::{
    downmix_mono, frame_to_le_bytes, i16_to_sample, sample_to_i16, PcmEncoder,
};

#[test]
fn test_conversion_is_deterministic() {
    let inputs = [-1.0f32, -0.5, -0.001, 0.0, 0.001, 0.5, 0.999, 1.0];
    for &x in &inputs {
        assert_eq!(sample_to_i16(x), sample_to_i16(x));
    }
}

#[test]
fn test_full_scale_values() {
    assert_eq!(sample_to_i16(1.0), 32767);
    assert_eq!(sample_to_i16(-1.0), -32767);
    assert_eq!(sample_to_i16(0.0), 0);
}

#[test]
fn test_out_of_range_input_is_clamped() {
    assert_eq!(sample_to_i16(2.5), 32767);
    assert_eq!(sample_to_i16(-3.0), -32767);
    assert_eq!(sample_to_i16(f32::INFINITY), 32767);
    assert_eq!(sample_to_i16(f32::NEG_INFINITY), -32767);
}

#[test]
fn test_roundtrip_within_one_quantization_step() {
    let step = 1.0 / 32767.0;
    let mut x = -1.0f32;
    while x <= 1.0 {
        let decoded = i16_to_sample(sample_to_i16(x));
        assert!(
            (decoded - x).abs() <= step,
            "roundtrip error too large at {}: {}",
            x,
            (decoded - x).abs()
        );
        x += 0.0137;
    }
}

#[test]
fn test_frame_to_le_bytes() {
    let bytes = frame_to_le_bytes(&[0x0102, -2]);
    assert_eq!(bytes, vec![0x02, 0x01, 0xFE, 0xFF]);
}

#[test]
fn test_le_bytes_roundtrip() {
    let samples: Vec<i16> = vec![100, -200, 300, -400, i16::MAX, i16::MIN];
    let bytes = frame_to_le_bytes(&samples);

    let decoded: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect();

    assert_eq!(decoded, samples);
}

#[test]
fn test_downmix_stereo_averages_channels() {
    let interleaved = [0.2f32, 0.4, -0.6, -0.2];
    let mono = downmix_mono(&interleaved, 2);

    assert_eq!(mono.len(), 2);
    assert!((mono[0] - 0.3).abs() < 1e-6);
    assert!((mono[1] + 0.4).abs() < 1e-6);
}

#[test]
fn test_downmix_mono_passthrough() {
    let input = [0.1f32, -0.2, 0.3];
    assert_eq!(downmix_mono(&input, 1), input.to_vec());
}

#[test]
fn test_encoder_at_target_rate_quantizes_as_is() {
    let mut encoder = PcmEncoder::new(16000);
    let out = encoder.encode(&[0.0, 0.5, -0.5, 1.0]);
    assert_eq!(out, vec![0, sample_to_i16(0.5), sample_to_i16(-0.5), 32767]);
}

#[test]
fn test_encoder_downsamples_to_target_rate() {
    let mut encoder = PcmEncoder::new(48000);
    // One second of input should yield roughly one second of 16kHz output.
    let input = vec![0.25f32; 48000];
    let out = encoder.encode(&input);

    assert!(
        (out.len() as i64 - 16000).unsigned_abs() < 16,
        "unexpected output length: {}",
        out.len()
    );
    // Constant input stays constant through linear interpolation.
    assert!(out.iter().all(|&s| s == sample_to_i16(0.25)));
}

#[test]
fn test_encoder_is_gapless_across_chunks() {
    // The same signal split into chunks must yield exactly the same output
    // as one whole encode (position and tail sample carry across calls).
    let signal: Vec<f32> = (0..4800).map(|i| ((i as f32) * 0.01).sin() * 0.5).collect();

    let mut whole = PcmEncoder::new(48000);
    let all_at_once = whole.encode(&signal);

    let mut chunked = PcmEncoder::new(48000);
    let mut piecewise = Vec::new();
    for chunk in signal.chunks(480) {
        piecewise.extend(chunked.encode(chunk));
    }

    assert_eq!(all_at_once, piecewise);
}

#[test]
fn test_chunk_boundaries_interpolate_not_extrapolate() {
    // Chunk sizes that do not divide the resample ratio land output
    // positions across chunk boundaries. Those samples must interpolate
    // with the previous chunk's last sample, so the result stays identical
    // to an unchunked encode at a fractional ratio too.
    let signal: Vec<f32> = (0..4410).map(|i| ((i as f32) * 0.013).sin() * 0.8).collect();

    let mut whole = PcmEncoder::new(44100);
    let all_at_once = whole.encode(&signal);

    for chunk_size in [100, 441, 1000] {
        let mut chunked = PcmEncoder::new(44100);
        let mut piecewise = Vec::new();
        for chunk in signal.chunks(chunk_size) {
            piecewise.extend(chunked.encode(chunk));
        }
        assert_eq!(all_at_once, piecewise, "chunk size {}", chunk_size);
    }
}

#[test]
fn test_encoder_reset_clears_resample_state() {
    let mut encoder = PcmEncoder::new(48000);
    encoder.encode(&[0.1f32; 100]);
    encoder.reset();

    let mut fresh = PcmEncoder::new(48000);
    assert_eq!(encoder.encode(&[0.2f32; 300]), fresh.encode(&[0.2f32; 300]));
}

#[test]
fn test_empty_input_yields_empty_output() {
    let mut encoder = PcmEncoder::new(48000);
    assert!(encoder.encode(&[]).is_empty());
    assert!(frame_to_le_bytes(&[]).is_empty());
}
