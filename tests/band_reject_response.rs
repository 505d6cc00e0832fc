/// Systematic tests: Band-reject Butterworth filter
///
/// Tests the notch through the full graph with level and spectral analysis.
///
/// Key characteristics:
/// - Deep rejection at the center frequency
/// - Near-unity gain far outside the stop band
/// - Coefficients only redesigned when center or bandwidth change
/// - Changes land on control tick boundaries
use opgraph::analysis::{gain_db, peak, tone_amplitude};
use opgraph::ops::{BandRejectButterworth, Oscillator};
use opgraph::{design_band_reject, EngineConfig, OperationId, SignalGraph};
use std::f32::consts::PI;

const SAMPLE_RATE: f32 = 44100.0;

/// Sine at `freq` through a notch; returns (graph, notch id)
fn sine_through_notch(freq: f32, center: f32, bandwidth: f32) -> (SignalGraph, OperationId) {
    let mut graph = SignalGraph::new(EngineConfig::default());
    let osc = graph.add(Oscillator::sine(freq)).unwrap();
    let notch = graph
        .add(
            BandRejectButterworth::patch(osc)
                .center_frequency(center)
                .bandwidth(bandwidth),
        )
        .unwrap();
    graph.set_output(notch).unwrap();
    (graph, notch)
}

/// Steady-state amplitude of the filtered sine
fn steady_state_amplitude(freq: f32, center: f32, bandwidth: f32) -> f32 {
    let (mut graph, _) = sine_through_notch(freq, center, bandwidth);
    graph.render(8820).unwrap();
    let tail = graph.render(4410).unwrap();
    tone_amplitude(&tail, freq, SAMPLE_RATE)
}

/// Perform FFT and analyze spectrum
fn analyze_spectrum(buffer: &[f32], sample_rate: f32) -> (Vec<f32>, Vec<f32>) {
    use rustfft::{num_complex::Complex, FftPlanner};

    let fft_size = 8192.min(buffer.len());
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);

    let mut input: Vec<Complex<f32>> = buffer[..fft_size]
        .iter()
        .enumerate()
        .map(|(i, &sample)| {
            let window = 0.5 * (1.0 - (2.0 * PI * i as f32 / fft_size as f32).cos());
            Complex::new(sample * window, 0.0)
        })
        .collect();

    fft.process(&mut input);

    let magnitudes: Vec<f32> = input[..fft_size / 2]
        .iter()
        .map(|c| (c.re * c.re + c.im * c.im).sqrt())
        .collect();

    let frequencies: Vec<f32> = (0..fft_size / 2)
        .map(|i| i as f32 * sample_rate / fft_size as f32)
        .collect();

    (frequencies, magnitudes)
}

/// Largest magnitude within ±50 Hz of `target`
fn band_magnitude(frequencies: &[f32], magnitudes: &[f32], target: f32) -> f32 {
    frequencies
        .iter()
        .zip(magnitudes)
        .filter(|(f, _)| (**f - target).abs() < 50.0)
        .map(|(_, m)| *m)
        .fold(0.0, f32::max)
}

// ========== Default Scenario ==========

#[test]
fn test_defaults_reject_center_tone() {
    let mut graph = SignalGraph::new(EngineConfig::default());
    let osc = graph.add(Oscillator::sine(3000.0)).unwrap();
    let notch = graph.add(BandRejectButterworth::patch(osc)).unwrap();
    graph.set_output(notch).unwrap();

    graph.render(4410).unwrap(); // settle
    let steady = graph.render(1000).unwrap();
    assert!(peak(&steady) < 0.05, "notch depth: peak {}", peak(&steady));
}

#[test]
fn test_defaults_pass_10khz_tone() {
    let mut graph = SignalGraph::new(EngineConfig::default());
    let osc = graph.add(Oscillator::sine(10000.0)).unwrap();
    let notch = graph.add(BandRejectButterworth::patch(osc)).unwrap();
    graph.set_output(notch).unwrap();

    graph.render(4410).unwrap();
    let steady = graph.render(1000).unwrap();
    let p = peak(&steady);
    assert!(p > 0.9 && p < 1.05, "10 kHz passband peak {p}");
}

// ========== Attenuation ==========

#[test]
fn test_attenuation_at_least_20db_across_settings() {
    // (center, bandwidth, far-away reference frequency)
    let cases = [
        (3000.0, 2000.0, 12000.0),
        (1000.0, 200.0, 8000.0),
        (5000.0, 1000.0, 500.0),
        (200.0, 50.0, 4000.0),
        (15000.0, 3000.0, 2000.0),
    ];

    for (center, bandwidth, far) in cases {
        let rejected = steady_state_amplitude(center, center, bandwidth);
        let passed = steady_state_amplitude(far, center, bandwidth);
        let attenuation = -gain_db(rejected, passed);
        assert!(
            attenuation >= 20.0,
            "center {center} bw {bandwidth}: only {attenuation:.1} dB"
        );
    }
}

#[test]
fn test_spectrum_notches_only_the_center_component() {
    let input: Vec<f32> = (0..16384)
        .map(|n| {
            let t = n as f32 / SAMPLE_RATE;
            ((2.0 * PI * 500.0 * t).sin() + (2.0 * PI * 3000.0 * t).sin() + (2.0 * PI * 12000.0 * t).sin())
                / 3.0
        })
        .collect();

    let mut graph = SignalGraph::new(EngineConfig::default());
    let source = graph.add(opgraph::ops::ExternalInput::new(0)).unwrap();
    let notch = graph.add(BandRejectButterworth::patch(source)).unwrap();
    graph.set_output(notch).unwrap();
    let mut output = vec![0.0; input.len()];
    graph.process_input(&input, &mut output).unwrap();

    let (freqs, before) = analyze_spectrum(&input[8192..], SAMPLE_RATE);
    let (_, after) = analyze_spectrum(&output[8192..], SAMPLE_RATE);

    let drop_at = |f: f32| {
        gain_db(
            band_magnitude(&freqs, &after, f),
            band_magnitude(&freqs, &before, f),
        )
    };
    assert!(drop_at(3000.0) < -20.0, "3 kHz: {:.1} dB", drop_at(3000.0));
    assert!(drop_at(12000.0) > -1.0, "12 kHz: {:.1} dB", drop_at(12000.0));
    assert!(drop_at(500.0) > -1.0, "500 Hz: {:.1} dB", drop_at(500.0));
}

#[test]
fn test_measured_gain_matches_design() {
    let coefficients = design_band_reject(3000.0, 2000.0, 44100.0).unwrap();
    for freq in [700.0f32, 6000.0, 10000.0] {
        let measured = steady_state_amplitude(freq, 3000.0, 2000.0);
        let expected = coefficients.magnitude_at(freq as f64, 44100.0) as f32;
        assert!(
            (measured - expected).abs() < 0.01,
            "{freq} Hz: measured {measured}, designed {expected}"
        );
    }
}

// ========== Control-Rate Behavior ==========

#[test]
fn test_setting_equal_value_does_not_redesign() {
    let (mut graph, notch) = sine_through_notch(440.0, 3000.0, 2000.0);
    graph.render(256).unwrap();

    graph.set_parameter(notch, "bandwidth", 2000.0).unwrap();
    graph.set_parameter(notch, "center_frequency", 3000.0).unwrap();
    graph.render(256).unwrap();

    let filter = graph.operation_as::<BandRejectButterworth>(notch).unwrap();
    assert_eq!(filter.coefficient_updates(), 1);
}

#[test]
fn test_retune_moves_the_notch() {
    let (mut graph, notch) = sine_through_notch(1000.0, 3000.0, 2000.0);
    graph.render(4410).unwrap();
    let before = tone_amplitude(&graph.render(4410).unwrap(), 1000.0, SAMPLE_RATE);

    graph.set_parameter(notch, "center_frequency", 1000.0).unwrap();
    graph.set_parameter(notch, "bandwidth", 300.0).unwrap();
    graph.render(4410).unwrap();
    let after = tone_amplitude(&graph.render(4410).unwrap(), 1000.0, SAMPLE_RATE);

    assert!(before > 0.5, "before retune {before}");
    assert!(after < 0.01, "after retune {after}");
    let filter = graph.operation_as::<BandRejectButterworth>(notch).unwrap();
    assert_eq!(filter.coefficient_updates(), 2);
}

#[test]
fn test_invalid_center_errors_at_refresh_and_keeps_running_coefficients() {
    let (mut graph, notch) = sine_through_notch(440.0, 3000.0, 2000.0);
    graph.render(64).unwrap();
    let before = *graph
        .operation_as::<BandRejectButterworth>(notch)
        .unwrap()
        .coefficients();

    // Accepted on the control path, rejected when the filter refreshes
    graph.set_parameter(notch, "center_frequency", 30000.0).unwrap();
    let result = graph.render(64);
    assert!(matches!(result, Err(opgraph::Error::InvalidParameter { .. })));
    let filter = graph.operation_as::<BandRejectButterworth>(notch).unwrap();
    assert_eq!(*filter.coefficients(), before);

    // Every tick fails until the corrected value lands on the next control tick
    graph.set_parameter(notch, "center_frequency", 2000.0).unwrap();
    let failed = (0..63).filter(|_| graph.tick().is_err()).count();
    assert_eq!(failed, 63);
    graph.render(64).unwrap();
    let filter = graph.operation_as::<BandRejectButterworth>(notch).unwrap();
    assert_eq!(filter.coefficient_updates(), 2);
}

#[test]
fn test_out_of_range_center_never_passes_input_through() {
    let (mut graph, notch) = sine_through_notch(3000.0, 30000.0, 2000.0);

    for n in 0..200 {
        assert!(
            matches!(graph.tick(), Err(opgraph::Error::InvalidParameter { .. })),
            "tick {n} succeeded with an undesigned filter"
        );
    }
    assert_eq!(graph.output_of(notch).unwrap(), 0.0);
    let filter = graph.operation_as::<BandRejectButterworth>(notch).unwrap();
    assert_eq!(filter.coefficient_updates(), 0);
}

#[test]
fn test_independent_control_cadences() {
    let mut graph = SignalGraph::new(EngineConfig::default());
    let osc = graph.add(Oscillator::sine(440.0)).unwrap();
    let fast = graph
        .add(
            BandRejectButterworth::patch(osc)
                .center_frequency(opgraph::ControlValue::with_period(3000.0, 8)),
        )
        .unwrap();
    let slow = graph.add(BandRejectButterworth::patch(osc)).unwrap();
    graph.render(1).unwrap();

    graph.set_parameter(fast, "bandwidth", 500.0).unwrap();
    graph.set_parameter(slow, "bandwidth", 500.0).unwrap();
    graph.render(8).unwrap();

    let updates = |id| {
        graph
            .operation_as::<BandRejectButterworth>(id)
            .unwrap()
            .coefficient_updates()
    };
    assert_eq!(updates(fast), 2);
    assert_eq!(updates(slow), 1);
}
