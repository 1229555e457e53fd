use std::path::Path;

use image::GrayImage;
use log::info;
use serde::Serialize;

use crate::bandpass::bandpass;
use crate::beat_detect::{detect_peaks, heart_rate_bpm};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::image_extract::{extract_waveform, load_image};
use crate::st_analysis::{measure_beats, summarize, ClassificationResult, StMeasurement};

/// Side channel for presenting intermediate waveforms.
///
/// The pipeline hands data out and never reads anything back, so a sink
/// cannot influence the classification.
pub trait WaveformSink {
    /// The normalized waveform straight out of extraction.
    fn raw_waveform(&mut self, _signal: &[f64]) {}

    /// The band-passed waveform and the R-peaks found in it.
    fn filtered_waveform(&mut self, _signal: &[f64], _peaks: &[usize]) {}
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl WaveformSink for NullSink {}

/// Outcome of one image run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub result: ClassificationResult,
    pub samples: usize,
    pub sampling_rate_hz: f64,
    pub peaks: Vec<usize>,
    pub heart_rate_bpm: Option<f64>,
    pub measurements: Vec<StMeasurement>,
}

/// Filter, detect beats and classify an already extracted waveform.
pub fn analyze_waveform(
    raw: &[f64],
    config: &PipelineConfig,
    sink: &mut dyn WaveformSink,
) -> Result<Report> {
    config.validate()?;
    run_waveform(raw, config, sink)
}

/// Run the full pipeline on a decoded grayscale scan.
pub fn analyze_gray_image(
    image: &GrayImage,
    config: &PipelineConfig,
    sink: &mut dyn WaveformSink,
) -> Result<Report> {
    config.validate()?;
    run_gray_image(image, config, sink)
}

/// Run the full pipeline on an image file.
///
/// Parameters are validated before the file is touched.
pub fn analyze_image(
    path: &Path,
    config: &PipelineConfig,
    sink: &mut dyn WaveformSink,
) -> Result<Report> {
    config.validate()?;
    let image = load_image(path)?;
    run_gray_image(&image, config, sink)
}

// Stages below expect a config that already passed `validate`.

fn run_gray_image(
    image: &GrayImage,
    config: &PipelineConfig,
    sink: &mut dyn WaveformSink,
) -> Result<Report> {
    let raw = extract_waveform(image, &config.extraction)?;
    sink.raw_waveform(&raw);
    run_waveform(&raw, config, sink)
}

fn run_waveform(
    raw: &[f64],
    config: &PipelineConfig,
    sink: &mut dyn WaveformSink,
) -> Result<Report> {
    let fs = config.sampling_rate_hz;

    let filtered = bandpass(raw, &config.filter, fs)?;
    let peaks = detect_peaks(&filtered, fs, &config.beats);
    sink.filtered_waveform(&filtered, &peaks);

    let measurements = measure_beats(&filtered, &peaks, fs, &config.st);
    let result = summarize(&measurements, &config.st);
    let heart_rate = heart_rate_bpm(&peaks, fs);

    info!(
        "{} beats, max ST elevation {:.4}: {}",
        peaks.len(),
        result.max_elevation,
        result.label
    );

    Ok(Report {
        result,
        samples: filtered.len(),
        sampling_rate_hz: fs,
        peaks,
        heart_rate_bpm: heart_rate,
        measurements,
    })
}
