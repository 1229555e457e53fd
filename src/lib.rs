//! Read a scanned single-lead ECG strip, recover its waveform, find the
//! R-peaks and grade ST-segment elevation.
//!
//! Stages run in order and each returns a fresh value:
//! image -> trace mask -> raw waveform -> band-passed waveform -> R-peaks
//! -> per-beat ST measurements -> classification.

pub mod bandpass;
pub mod beat_detect;
pub mod config;
pub mod ecg_process;
pub mod error;
pub mod image_extract;
pub mod pipeline;
pub mod st_analysis;

pub use config::PipelineConfig;
pub use error::{EcgError, Result};
pub use image_extract::{load_image, load_image_bytes};
pub use pipeline::{analyze_gray_image, analyze_image, analyze_waveform, NullSink, Report, WaveformSink};
pub use st_analysis::{ClassificationResult, StLabel, StMeasurement};
