//! opgraph CLI - inspect filter designs and render test signals

use clap::{Parser, Subcommand, ValueEnum};
use opgraph::analysis;
use opgraph::render::{self, RenderConfig, RenderStats, TestSignal};
use opgraph::{design_band_pass, design_band_reject, CoefficientSet, EngineConfig};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "opgraph")]
#[command(about = "Operation graph and Butterworth filter toolkit", long_about = None)]
struct Cli {
    /// Engine configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Family {
    BandReject,
    BandPass,
}

#[derive(Subcommand)]
enum Commands {
    /// Print coefficients, poles and gains of a filter design
    Design {
        /// Filter family
        #[arg(short, long, value_enum, default_value = "band-reject")]
        family: Family,

        /// Center frequency in Hz (default: from config)
        #[arg(long)]
        center: Option<f32>,

        /// Bandwidth in Hz (default: from config)
        #[arg(long)]
        bandwidth: Option<f32>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Render a tone or sweep through a band-reject filter to WAV
    Render {
        /// Output WAV file path
        output: PathBuf,

        /// Tone frequency in Hz (ignored with --sweep)
        #[arg(short, long, default_value = "3000.0")]
        tone: f32,

        /// Sweep from 20 Hz to just below Nyquist instead of a tone
        #[arg(long)]
        sweep: bool,

        /// Center frequency in Hz (default: from config)
        #[arg(long)]
        center: Option<f32>,

        /// Bandwidth in Hz (default: from config)
        #[arg(long)]
        bandwidth: Option<f32>,

        /// Duration in seconds (default: 2.0)
        #[arg(short, long, default_value = "2.0")]
        duration: f32,

        /// Master gain 0.0-1.0 (default: 0.8)
        #[arg(short, long, default_value = "0.8")]
        gain: f32,

        /// Fade in time in seconds (default: 0.01)
        #[arg(long, default_value = "0.01")]
        fade_in: f32,

        /// Fade out time in seconds (default: 0.01)
        #[arg(long, default_value = "0.01")]
        fade_out: f32,
    },
}

#[derive(Serialize)]
struct DesignReport {
    family: &'static str,
    center_frequency: f32,
    bandwidth: f32,
    sample_rate: f32,
    coefficients: CoefficientSet,
    poles: [[f64; 2]; 2],
    pole_radius: f64,
    stable: bool,
    center_gain_db: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let engine = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Design {
            family,
            center,
            bandwidth,
            json,
        } => {
            let (name, defaults) = match family {
                Family::BandReject => ("band_reject", engine.band_reject),
                Family::BandPass => ("band_pass", engine.band_pass),
            };
            let center = center.unwrap_or(defaults.center_frequency);
            let bandwidth = bandwidth.unwrap_or(defaults.bandwidth);
            let fs = engine.sample_rate as f64;

            let coefficients = match family {
                Family::BandReject => design_band_reject(center as f64, bandwidth as f64, fs)?,
                Family::BandPass => design_band_pass(center as f64, bandwidth as f64, fs)?,
            };
            let poles = coefficients.poles();
            let report = DesignReport {
                family: name,
                center_frequency: center,
                bandwidth,
                sample_rate: engine.sample_rate,
                coefficients,
                poles: [[poles[0].re, poles[0].im], [poles[1].re, poles[1].im]],
                pole_radius: coefficients.pole_radius(),
                stable: coefficients.is_stable(),
                center_gain_db: coefficients.gain_db_at(center as f64, fs),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_design(&report);
            }
        }

        Commands::Render {
            output,
            tone,
            sweep,
            center,
            bandwidth,
            duration,
            gain,
            fade_in,
            fade_out,
        } => {
            let center = center.unwrap_or(engine.band_reject.center_frequency);
            let bandwidth = bandwidth.unwrap_or(engine.band_reject.bandwidth);
            let signal = if sweep {
                TestSignal::Sweep {
                    start: 20.0,
                    end: engine.nyquist() * 0.9,
                }
            } else {
                TestSignal::Tone { frequency: tone }
            };

            info!(
                "Rendering {:?} through band-reject {} Hz / {} Hz for {}s",
                signal, center, bandwidth, duration
            );
            let (mut samples, source) =
                render::render_band_reject(&engine, signal, center, bandwidth, duration)?;

            if let TestSignal::Tone { frequency } = signal {
                // Skip the first 100 ms of settling
                let settle = ((engine.sample_rate * 0.1) as usize).min(samples.len());
                let input_level = analysis::tone_amplitude(&source[settle..], frequency, engine.sample_rate);
                let output_level =
                    analysis::tone_amplitude(&samples[settle..], frequency, engine.sample_rate);
                println!("Tone level in:  {input_level:.4}");
                println!("Tone level out: {output_level:.4}");
                println!(
                    "Attenuation:    {:.1} dB",
                    -analysis::gain_db(output_level, input_level)
                );
            }

            let config = RenderConfig {
                duration,
                master_gain: gain,
                fade_in,
                fade_out,
            };
            render::apply_envelope(&mut samples, &config, engine.sample_rate);
            render::write_wav(&output, &samples, engine.sample_rate as u32)?;

            RenderStats::from_samples(&samples, engine.sample_rate).print_summary();
            println!("✅ Rendered to: {}", output.display());
        }
    }

    Ok(())
}

fn print_design(report: &DesignReport) {
    let c = &report.coefficients;
    println!(
        "{} at {} Hz, bandwidth {} Hz, fs {} Hz",
        report.family, report.center_frequency, report.bandwidth, report.sample_rate
    );
    println!("  b0 = {:+.9}", c.b0);
    println!("  b1 = {:+.9}", c.b1);
    println!("  b2 = {:+.9}", c.b2);
    println!("  a1 = {:+.9}", c.a1);
    println!("  a2 = {:+.9}", c.a2);
    for (i, pole) in report.poles.iter().enumerate() {
        println!("  pole {}: {:+.6} {:+.6}i", i, pole[0], pole[1]);
    }
    println!(
        "  |p| = {:.6} ({})",
        report.pole_radius,
        if report.stable { "stable" } else { "UNSTABLE" }
    );
    println!("  gain at center: {:.1} dB", report.center_gain_db);
}
