mod common;

use common::{gen_sine, zero_crossings};
use voicedsp::{DspError, TimeStretcher, TimeStretcherConfig};

const SR: u32 = 16000;

/// Streams `input` through a stretcher in fixed chunks and returns the
/// collected output plus how much input was left buffered at the end.
fn run_stream(input: &[f32], rate: f32, chunk: usize) -> (Vec<f32>, usize) {
    let config = TimeStretcherConfig::default().with_initial_rate(rate);
    let mut ts = TimeStretcher::new(&config).unwrap();

    let mut collected = Vec::new();
    let mut scratch = vec![0.0f32; 8192];
    for part in input.chunks(chunk) {
        let result = ts.process(part, &mut scratch).unwrap();
        assert_eq!(
            result.accepted,
            part.len(),
            "ring should keep up at chunk size {}",
            chunk
        );
        collected.extend_from_slice(&scratch[..result.written]);
    }
    let buffered = ts.buffered();
    (collected, buffered)
}

#[test]
fn duration_tracks_rate() {
    let input = gen_sine(440.0, SR, SR as usize * 5);

    for &rate in &[0.5f32, 0.75, 1.0, 1.25, 1.5, 2.0] {
        let (output, buffered) = run_stream(&input, rate, 800);
        let consumed = input.len() - buffered;
        let expected = consumed as f64 / rate as f64;
        let actual = output.len() as f64;
        assert!(
            (actual - expected).abs() / expected < 0.02,
            "rate {}: output {} samples, expected ~{}",
            rate,
            actual,
            expected
        );
    }
}

#[test]
fn pitch_preserved_across_rates() {
    let input = gen_sine(440.0, SR, SR as usize * 5);
    let input_rate = zero_crossings(&input) as f64 / input.len() as f64;

    for &rate in &[0.75f32, 1.25, 1.5] {
        let (output, _) = run_stream(&input, rate, 800);
        assert!(output.len() > SR as usize, "rate {}: too little output", rate);
        let output_rate = zero_crossings(&output) as f64 / output.len() as f64;
        assert!(
            (output_rate - input_rate).abs() / input_rate < 0.05,
            "rate {}: zero-crossing rate drifted from {:.5} to {:.5}",
            rate,
            input_rate,
            output_rate
        );
    }
}

#[test]
fn first_frame_passthrough_after_reset() {
    let mut ts = TimeStretcher::new(&TimeStretcherConfig::default()).unwrap();
    let need = ts.frame_samples() + ts.search_samples();
    let input = gen_sine(330.0, SR, need);
    let mut output = vec![0.0f32; 1024];

    for round in 0..2 {
        let result = ts.process(&input, &mut output).unwrap();
        assert!(result.written > 0);
        for i in 0..result.written {
            assert_eq!(
                output[i], input[i],
                "round {}: first frame should be verbatim at {}",
                round, i
            );
        }
        ts.reset();
    }
}

#[test]
fn rate_clamping_is_visible() {
    let mut ts = TimeStretcher::new(&TimeStretcherConfig::default()).unwrap();
    ts.set_rate(0.1);
    assert_eq!(ts.rate(), 0.5);
    ts.set_rate(5.0);
    assert_eq!(ts.rate(), 2.0);

    let config = TimeStretcherConfig::default().with_initial_rate(3.7);
    let clamped = TimeStretcher::new(&config).unwrap();
    assert_eq!(clamped.rate(), 2.0);
}

#[test]
fn output_size_hint_is_an_upper_bound() {
    let n = SR as usize * 2;
    let input = gen_sine(440.0, SR, n);

    for &rate in &[0.5f32, 1.0, 1.3, 2.0] {
        let config = TimeStretcherConfig::default().with_initial_rate(rate);
        let output = voicedsp::stretch(&input, &config).unwrap();
        let hint = TimeStretcher::output_size_hint(n, rate);
        assert!(
            output.len() <= hint,
            "rate {}: produced {} samples but hint was {}",
            rate,
            output.len(),
            hint
        );
    }
}

#[test]
fn ring_truncation_is_reported() {
    let mut ts = TimeStretcher::new(&TimeStretcherConfig::default()).unwrap();
    let capacity = (ts.frame_samples() + ts.search_samples()) * 4;
    let oversized = vec![0.1f32; capacity + 1000];

    // No output capacity, so nothing drains and the ring must overflow.
    let result = ts.process(&oversized, &mut []).unwrap();
    assert_eq!(result.written, 0);
    assert_eq!(result.accepted, capacity);
    assert!(result.accepted < oversized.len());
    assert_eq!(ts.buffered(), capacity);
}

#[test]
fn flush_drains_buffered_input_verbatim() {
    let mut ts = TimeStretcher::new(&TimeStretcherConfig::default()).unwrap();
    let input = gen_sine(440.0, SR, 500); // below one analysis window
    let mut sink = vec![0.0f32; 64];
    let result = ts.process(&input, &mut sink).unwrap();
    assert_eq!(result.written, 0);
    assert_eq!(ts.buffered(), 500);

    let mut drained = vec![0.0f32; 1024];
    let written = ts.flush(&mut drained);
    assert_eq!(written, 500);
    assert_eq!(&drained[..500], &input[..]);
    assert_eq!(ts.buffered(), 0);
}

#[test]
fn flush_i16_saturates() {
    let mut ts = TimeStretcher::new(&TimeStretcherConfig::default()).unwrap();
    let loud = vec![2.0f32; 100];
    ts.process(&loud, &mut []).unwrap();

    let mut drained = vec![0i16; 256];
    let written = ts.flush_i16(&mut drained);
    assert_eq!(written, 100);
    assert!(drained[..100].iter().all(|&s| s == 32767));
}

#[test]
fn i16_path_matches_float_path() {
    let float_input = gen_sine(440.0, SR, 2000);
    let mut i16_input = vec![0i16; float_input.len()];
    voicedsp::math::float_to_int16(&float_input, &mut i16_input);

    // Drive the float path with the exact samples the i16 path sees.
    let mut as_float = vec![0.0f32; i16_input.len()];
    voicedsp::math::int16_to_float(&i16_input, &mut as_float);

    let config = TimeStretcherConfig::default().with_initial_rate(1.25);
    let mut ts_float = TimeStretcher::new(&config).unwrap();
    let mut ts_i16 = TimeStretcher::new(&config).unwrap();

    // Output buffers stay within the i16 staging capacity.
    let mut float_out = vec![0.0f32; 2048];
    let mut i16_out = vec![0i16; 2048];

    let rf = ts_float.process(&as_float, &mut float_out).unwrap();
    let ri = ts_i16.process_i16(&i16_input, &mut i16_out).unwrap();
    assert_eq!(rf.written, ri.written);

    let mut expected = vec![0i16; rf.written];
    voicedsp::math::float_to_int16(&float_out[..rf.written], &mut expected);
    assert_eq!(&i16_out[..ri.written], &expected[..]);
}

#[test]
fn process_i16_rejects_oversized_buffers() {
    let mut ts = TimeStretcher::new(&TimeStretcherConfig::default()).unwrap();
    let capacity = (ts.frame_samples() + ts.search_samples()) * 4;
    let huge = vec![0i16; capacity + 1];
    let mut out = vec![0i16; 16];
    assert!(matches!(
        ts.process_i16(&huge, &mut out),
        Err(DspError::BufferTooLarge { .. })
    ));
}

#[test]
fn stereo_output_stays_interleaved() {
    let config = TimeStretcherConfig::default()
        .with_channels(2)
        .with_initial_rate(1.5);
    let mut ts = TimeStretcher::new(&config).unwrap();

    let frames = SR as usize * 2;
    let mut input = vec![0.0f32; frames * 2];
    for i in 0..frames {
        let t = i as f32 / SR as f32;
        input[i * 2] = (2.0 * std::f32::consts::PI * 440.0 * t).sin();
        input[i * 2 + 1] = (2.0 * std::f32::consts::PI * 880.0 * t).sin();
    }

    let mut collected = Vec::new();
    let mut scratch = vec![0.0f32; 8192];
    for part in input.chunks(1600) {
        let result = ts.process(part, &mut scratch).unwrap();
        assert_eq!(result.accepted, part.len());
        assert_eq!(result.written % 2, 0, "stereo frames must stay paired");
        collected.extend_from_slice(&scratch[..result.written]);
    }
    assert!(!collected.is_empty());

    let consumed = input.len() - ts.buffered() * 2;
    let ratio = collected.len() as f64 / consumed as f64;
    assert!(
        (ratio - 1.0 / 1.5).abs() < 0.05,
        "stereo duration ratio {} too far from {}",
        ratio,
        1.0 / 1.5
    );
}

#[test]
fn state_reports_buffering_latency() {
    let mut ts = TimeStretcher::new(&TimeStretcherConfig::default()).unwrap();
    let input = vec![0.25f32; 500];
    ts.process(&input, &mut []).unwrap();

    let state = ts.state();
    assert_eq!(state.input_samples, 500);
    assert_eq!(state.output_samples, 0);
    assert!((state.latency_ms - 31.25).abs() < 1e-3);
}
