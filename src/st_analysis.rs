use std::fmt;

use log::{debug, warn};
use serde::Serialize;

use crate::config::StConfig;

/// Overall reading of the ST segments of one trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StLabel {
    Normal,
    EarlyElevation,
    Elevation,
}

impl StLabel {
    pub fn description(&self) -> &'static str {
        match self {
            StLabel::Normal => "Normal",
            StLabel::EarlyElevation => "Early Heart Attack Detected (ST Elevation)",
            StLabel::Elevation => "Heart Attack Detected (ST Elevation)",
        }
    }
}

impl fmt::Display for StLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// ST level of one beat relative to its pre-beat baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StMeasurement {
    /// R-peak sample index.
    pub peak: usize,
    pub elevation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassificationResult {
    /// Largest per-beat elevation, 0 when no beat could be measured.
    pub max_elevation: f64,
    pub label: StLabel,
}

fn mean(samples: &[f64]) -> f64 {
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Measure one beat, or `None` when its windows fall outside the waveform.
pub fn measure_beat(
    signal: &[f64],
    peak: usize,
    sampling_rate_hz: f64,
    config: &StConfig,
) -> Option<StMeasurement> {
    let st_start = peak + (config.st_start_s * sampling_rate_hz) as usize;
    let st_end = peak + (config.st_end_s * sampling_rate_hz) as usize;
    if st_end >= signal.len() || st_start >= st_end {
        return None;
    }

    let baseline_start = peak.checked_sub(config.baseline_start_offset)?;
    let baseline_end = peak.checked_sub(config.baseline_end_offset)?;
    if baseline_start >= baseline_end {
        return None;
    }

    let st_level = mean(&signal[st_start..st_end]);
    let baseline = mean(&signal[baseline_start..baseline_end]);
    Some(StMeasurement {
        peak,
        elevation: st_level - baseline,
    })
}

/// Measure every beat that has room for both windows, in peak order.
pub fn measure_beats(
    signal: &[f64],
    peaks: &[usize],
    sampling_rate_hz: f64,
    config: &StConfig,
) -> Vec<StMeasurement> {
    let measurements: Vec<StMeasurement> = peaks
        .iter()
        .filter_map(|&peak| measure_beat(signal, peak, sampling_rate_hz, config))
        .collect();

    let skipped = peaks.len() - measurements.len();
    if skipped > 0 {
        warn!("Skipped {} of {} beats too close to the waveform edge", skipped, peaks.len());
    }
    measurements
}

/// Classify by the largest elevation. Rules are checked top-down, so a
/// `depression_threshold` at or above `elevation_threshold` leaves
/// `EarlyElevation` unreachable.
pub fn classify(max_elevation: f64, config: &StConfig) -> StLabel {
    if max_elevation > config.elevation_threshold {
        StLabel::Elevation
    } else if max_elevation > config.depression_threshold {
        StLabel::EarlyElevation
    } else {
        StLabel::Normal
    }
}

/// Aggregate per-beat measurements into one result.
pub fn summarize(measurements: &[StMeasurement], config: &StConfig) -> ClassificationResult {
    let max_elevation = measurements
        .iter()
        .map(|m| m.elevation)
        .reduce(f64::max)
        .unwrap_or(0.0);
    let label = classify(max_elevation, config);
    debug!(
        "ST: {} beats measured, max elevation {:.4} -> {:?}",
        measurements.len(),
        max_elevation,
        label
    );
    ClassificationResult {
        max_elevation,
        label,
    }
}

/// Measure and classify the ST segments of a filtered waveform.
pub fn analyze(
    signal: &[f64],
    peaks: &[usize],
    sampling_rate_hz: f64,
    config: &StConfig,
) -> ClassificationResult {
    summarize(&measure_beats(signal, peaks, sampling_rate_hz, config), config)
}
