use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::debug;

use ecg_scan_st_analysis::{analyze_image, PipelineConfig, WaveformSink};

#[derive(Parser)]
#[command(name = "ecg-scan-st-analysis")]
#[command(version, about = "Extract an ECG trace from a scanned strip and check it for ST elevation", long_about = None)]
struct Cli {
    /// Scanned or photographed ECG strip (PNG, JPEG, BMP, TIFF)
    image: PathBuf,

    /// JSON file with pipeline settings; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Samples per second assumed for the extracted waveform
    #[arg(long)]
    sampling_rate: Option<f64>,

    /// ST elevation above which a heart attack is reported
    #[arg(long)]
    elevation_threshold: Option<f64>,

    /// ST elevation above which an early heart attack is reported
    #[arg(long)]
    depression_threshold: Option<f64>,

    /// Band-pass low cutoff in Hz
    #[arg(long)]
    low_hz: Option<f64>,

    /// Band-pass high cutoff in Hz
    #[arg(long)]
    high_hz: Option<f64>,

    /// Butterworth filter order
    #[arg(long)]
    order: Option<usize>,

    /// Grid-removal structuring element width in pixels
    #[arg(long)]
    structuring_length: Option<u32>,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config: PipelineConfig = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => PipelineConfig::default(),
        };

        if let Some(v) = self.sampling_rate {
            config.sampling_rate_hz = v;
        }
        if let Some(v) = self.elevation_threshold {
            config.st.elevation_threshold = v;
        }
        if let Some(v) = self.depression_threshold {
            config.st.depression_threshold = v;
        }
        if let Some(v) = self.low_hz {
            config.filter.low_hz = v;
        }
        if let Some(v) = self.high_hz {
            config.filter.high_hz = v;
        }
        if let Some(v) = self.order {
            config.filter.order = v;
        }
        if let Some(v) = self.structuring_length {
            config.extraction.structuring_length = v;
        }

        Ok(config)
    }
}

/// Reports waveform ranges at debug level in place of plotting.
struct LogSink;

impl WaveformSink for LogSink {
    fn raw_waveform(&mut self, signal: &[f64]) {
        let (min_v, max_v) = range(signal);
        debug!("Raw waveform: {} samples, range [{:.3}, {:.3}]", signal.len(), min_v, max_v);
    }

    fn filtered_waveform(&mut self, signal: &[f64], peaks: &[usize]) {
        let (min_v, max_v) = range(signal);
        debug!(
            "Filtered waveform: {} samples, range [{:.3}, {:.3}], R-peaks at {:?}",
            signal.len(),
            min_v,
            max_v,
            peaks
        );
    }
}

fn range(signal: &[f64]) -> (f64, f64) {
    let min_v = signal.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_v = signal.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    (min_v, max_v)
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.pipeline_config()?;

    let report = analyze_image(&cli.image, &config, &mut LogSink)
        .with_context(|| format!("analyzing {}", cli.image.display()))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let duration_sec = report.samples as f64 / report.sampling_rate_hz;
    println!("Samples: {}", report.samples);
    println!("Duration: {:.2} seconds", duration_sec);
    println!("Sampling rate: {} Hz", report.sampling_rate_hz);
    println!("R-peaks: {} {:?}", report.peaks.len(), report.peaks);
    match report.heart_rate_bpm {
        Some(bpm) => println!("Heart rate: {:.0} bpm", bpm),
        None => println!("Heart rate: n/a"),
    }
    for m in &report.measurements {
        println!("  beat @{}: ST {:+.4}", m.peak, m.elevation);
    }
    println!("\nMax ST elevation: {:.4}", report.result.max_elevation);
    println!("Result: {}", report.result.label);

    Ok(())
}
