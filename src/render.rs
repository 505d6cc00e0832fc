//! Offline rendering
//!
//! Drives a [`SignalGraph`] without an audio device and writes the result to
//! 16-bit mono WAV files.

use crate::analysis;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::ops::{BandRejectButterworth, Oscillator};
use crate::signal_graph::SignalGraph;
use std::path::Path;
use tracing::info;

/// Configuration for rendering audio
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Duration in seconds
    pub duration: f32,
    /// Output gain (0.0 to 1.0)
    pub master_gain: f32,
    /// Fade in time in seconds
    pub fade_in: f32,
    /// Fade out time in seconds
    pub fade_out: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            duration: 1.0,
            master_gain: 1.0,
            fade_in: 0.01,
            fade_out: 0.01,
        }
    }
}

/// Test signal fed into the filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TestSignal {
    /// Fixed-frequency sine
    Tone { frequency: f32 },
    /// Exponential sine sweep from `start` to `end` Hz over the render
    Sweep { start: f32, end: f32 },
}

/// Render `signal` through a band-reject filter
///
/// Returns (filtered output, unfiltered source), both before fades and gain.
/// Sweeps retune the oscillator once per control period through
/// [`SignalGraph::set_parameter`].
pub fn render_band_reject(
    engine: &EngineConfig,
    signal: TestSignal,
    center_frequency: f32,
    bandwidth: f32,
    duration: f32,
) -> Result<(Vec<f32>, Vec<f32>)> {
    let mut graph = SignalGraph::new(engine.clone());
    let start = match signal {
        TestSignal::Tone { frequency } => frequency,
        TestSignal::Sweep { start, .. } => start,
    };
    let osc = graph.add(Oscillator::sine(start))?;
    let notch = graph.add(
        BandRejectButterworth::patch(osc)
            .center_frequency(center_frequency)
            .bandwidth(bandwidth),
    )?;
    graph.set_output(notch)?;

    let total = (duration * engine.sample_rate).max(0.0) as usize;
    let period = engine.control_period.max(1) as usize;
    let mut output = Vec::with_capacity(total);
    let mut source = Vec::with_capacity(total);

    for n in 0..total {
        if let TestSignal::Sweep { start, end } = signal {
            if n % period == 0 {
                let t = n as f32 / total as f32;
                graph.set_parameter(osc, "frequency", start * (end / start).powf(t))?;
            }
        }
        output.push(graph.tick()?);
        source.push(graph.output_of(osc)?);
    }

    Ok((output, source))
}

/// Apply gain, fade in and fade out
pub fn apply_envelope(samples: &mut [f32], config: &RenderConfig, sample_rate: f32) {
    for s in samples.iter_mut() {
        *s *= config.master_gain;
    }

    if config.fade_in > 0.0 {
        let fade_in_samples = (config.fade_in * sample_rate) as usize;
        for (i, s) in samples.iter_mut().take(fade_in_samples).enumerate() {
            *s *= i as f32 / fade_in_samples as f32;
        }
    }

    if config.fade_out > 0.0 {
        let fade_out_samples = ((config.fade_out * sample_rate) as usize).min(samples.len());
        let start = samples.len() - fade_out_samples;
        for (i, s) in samples[start..].iter_mut().enumerate() {
            *s *= 1.0 - i as f32 / fade_out_samples as f32;
        }
    }
}

/// Write samples to a 16-bit mono WAV file
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        // Clamp to prevent overflow
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * 32767.0) as i16)?;
    }
    writer.finalize()?;

    info!("Wrote {} samples to {}", samples.len(), path.display());
    Ok(())
}

/// Read a 16-bit mono WAV file back as floats
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path)?;
    let sample_rate = reader.spec().sample_rate;
    let samples = reader
        .samples::<i16>()
        .map(|s| s.map(|v| v as f32 / 32767.0))
        .collect::<std::result::Result<Vec<f32>, hound::Error>>()?;
    Ok((samples, sample_rate))
}

/// Statistics about rendered audio
#[derive(Debug, Clone)]
pub struct RenderStats {
    pub duration: f32,
    pub sample_count: usize,
    pub rms: f32,
    pub peak: f32,
    pub dc_offset: f32,
    pub zero_crossings: usize,
}

impl RenderStats {
    pub fn from_samples(samples: &[f32], sample_rate: f32) -> Self {
        Self {
            duration: samples.len() as f32 / sample_rate,
            sample_count: samples.len(),
            rms: analysis::rms(samples),
            peak: analysis::peak(samples),
            dc_offset: analysis::dc_offset(samples),
            zero_crossings: analysis::zero_crossings(samples),
        }
    }

    pub fn print_summary(&self) {
        println!("Render Statistics:");
        println!("  Duration:       {:.3} seconds", self.duration);
        println!("  Samples:        {}", self.sample_count);
        println!("  RMS:           {:.3}", self.rms);
        println!("  Peak:          {:.3}", self.peak);
        println!("  DC Offset:     {:.6}", self.dc_offset);
        println!("  Zero Crossings: {}", self.zero_crossings);

        // Estimate frequency from zero crossings
        if self.duration > 0.0 {
            let est_freq = self.zero_crossings as f32 / (2.0 * self.duration);
            println!("  Est. Frequency: {est_freq:.1} Hz");
        }
    }
}
