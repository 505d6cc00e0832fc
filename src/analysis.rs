//! Audio analysis helpers
//!
//! Level and spectrum measurements used by the render report, the CLI and
//! the filter response tests.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::f32::consts::PI;

/// Root-mean-square level
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|x| x * x).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Largest absolute sample
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|x| x.abs()).fold(0.0f32, f32::max)
}

pub fn dc_offset(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f32>() / samples.len() as f32
}

pub fn zero_crossings(samples: &[f32]) -> usize {
    samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count()
}

/// Amplitude of the sinusoidal component at `frequency`
///
/// Correlates the buffer with a complex exponential (a single DFT bin at an
/// arbitrary frequency). Exact for a whole number of periods; otherwise the
/// error shrinks with buffer length.
pub fn tone_amplitude(samples: &[f32], frequency: f32, sample_rate: f32) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let w = 2.0 * std::f64::consts::PI * frequency as f64 / sample_rate as f64;
    let (re, im) = samples
        .iter()
        .enumerate()
        .fold((0.0f64, 0.0f64), |(re, im), (n, &x)| {
            let phase = w * n as f64;
            (re + x as f64 * phase.cos(), im - x as f64 * phase.sin())
        });
    (2.0 * (re * re + im * im).sqrt() / samples.len() as f64) as f32
}

/// Level of `output` relative to `reference` in dB (negative = attenuation)
pub fn gain_db(output: f32, reference: f32) -> f32 {
    20.0 * (output.max(1e-12) / reference.max(1e-12)).log10()
}

/// Hann-windowed magnitude spectrum: (bin frequencies, magnitudes)
///
/// Uses the largest power of two not exceeding `samples.len()` (capped at
/// 16384) starting at the beginning of the buffer.
pub fn spectrum(samples: &[f32], sample_rate: f32) -> (Vec<f32>, Vec<f32>) {
    if samples.len() < 2 {
        return (Vec::new(), Vec::new());
    }
    let fft_size = prev_power_of_two(samples.len()).min(16384);
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);

    let mut buffer: Vec<Complex<f32>> = samples[..fft_size]
        .iter()
        .enumerate()
        .map(|(i, &sample)| {
            let window = 0.5 * (1.0 - (2.0 * PI * i as f32 / fft_size as f32).cos());
            Complex::new(sample * window, 0.0)
        })
        .collect();

    fft.process(&mut buffer);

    let magnitudes: Vec<f32> = buffer[..fft_size / 2].iter().map(|c| c.norm()).collect();
    let frequencies: Vec<f32> = (0..fft_size / 2)
        .map(|i| i as f32 * sample_rate / fft_size as f32)
        .collect();

    (frequencies, magnitudes)
}

/// Frequency of the strongest spectral bin, ignoring DC
pub fn dominant_frequency(samples: &[f32], sample_rate: f32) -> Option<f32> {
    let (frequencies, magnitudes) = spectrum(samples, sample_rate);
    magnitudes
        .iter()
        .enumerate()
        .skip(1)
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| frequencies[i])
}

fn prev_power_of_two(n: usize) -> usize {
    if n.is_power_of_two() {
        n
    } else {
        n.next_power_of_two() / 2
    }
}
