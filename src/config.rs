use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{EcgError, Result};

/// Samples per second assumed for a waveform extracted from one image column per sample.
pub const DEFAULT_SAMPLING_RATE_HZ: f64 = 500.0;

/// Image-to-waveform extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Gaussian blur sigma in pixels (1.1 matches a 5x5 kernel).
    pub blur_sigma: f32,
    /// Inverted intensities strictly above this become trace ink.
    pub binarize_threshold: u8,
    /// Width in pixels of the 1-row structuring element used for grid removal.
    /// Scales with scan resolution.
    pub structuring_length: u32,
    /// Smallest acceptable peak of the normalized waveform.
    pub min_signal: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            binarize_threshold: 150,
            structuring_length: 50,
            min_signal: 0.1,
        }
    }
}

/// Butterworth band-pass settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub low_hz: f64,
    pub high_hz: f64,
    pub order: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            low_hz: 0.5,
            high_hz: 50.0,
            order: 4,
        }
    }
}

/// R-peak detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatConfig {
    /// Height threshold as a fraction of the waveform's own maximum.
    pub height_fraction: f64,
    /// Minimum time between two beats, in seconds.
    pub refractory_s: f64,
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            height_fraction: 0.6,
            refractory_s: 0.6,
        }
    }
}

/// ST-segment window and classification settings.
///
/// The ST window is placed in seconds after the R-peak and scales with the
/// sampling rate. The baseline window is given in raw samples before the
/// R-peak and does not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StConfig {
    pub elevation_threshold: f64,
    /// Lower cutoff; elevations between this and `elevation_threshold`
    /// are reported as early elevation.
    pub depression_threshold: f64,
    pub st_start_s: f64,
    pub st_end_s: f64,
    /// Samples before the R-peak where the baseline window starts.
    pub baseline_start_offset: usize,
    /// Samples before the R-peak where the baseline window ends (exclusive).
    pub baseline_end_offset: usize,
}

impl Default for StConfig {
    fn default() -> Self {
        Self {
            elevation_threshold: 0.2,
            depression_threshold: 0.1,
            st_start_s: 0.06,
            st_end_s: 0.08,
            baseline_start_offset: 40,
            baseline_end_offset: 10,
        }
    }
}

/// Every tunable of one pipeline run. Shared read-only between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sampling_rate_hz: f64,
    pub extraction: ExtractionConfig,
    pub filter: FilterConfig,
    pub beats: BeatConfig,
    pub st: StConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sampling_rate_hz: DEFAULT_SAMPLING_RATE_HZ,
            extraction: ExtractionConfig::default(),
            filter: FilterConfig::default(),
            beats: BeatConfig::default(),
            st: StConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Reject parameter combinations no stage can work with.
    pub fn validate(&self) -> Result<()> {
        let fs = self.sampling_rate_hz;
        if !fs.is_finite() || fs <= 0.0 {
            return Err(invalid(format!("sampling rate must be positive, got {}", fs)));
        }

        validate_filter(&self.filter, fs)?;

        validate_extraction(&self.extraction)?;

        let beats = &self.beats;
        if !(beats.height_fraction > 0.0 && beats.height_fraction <= 1.0) {
            return Err(invalid(format!(
                "height fraction must be in (0, 1], got {}",
                beats.height_fraction
            )));
        }
        if !beats.refractory_s.is_finite() || beats.refractory_s <= 0.0 {
            return Err(invalid(format!(
                "refractory period must be positive, got {}",
                beats.refractory_s
            )));
        }

        let st = &self.st;
        if !st.elevation_threshold.is_finite() || !st.depression_threshold.is_finite() {
            return Err(invalid("classification thresholds must be finite".to_string()));
        }
        if !st.st_start_s.is_finite()
            || !st.st_end_s.is_finite()
            || st.st_start_s < 0.0
            || st.st_start_s > st.st_end_s
        {
            return Err(invalid(format!(
                "ST window [{}, {}] s is not a forward interval",
                st.st_start_s, st.st_end_s
            )));
        }
        if st.baseline_end_offset >= st.baseline_start_offset {
            return Err(invalid(format!(
                "baseline window offsets {}..{} must count down towards the R-peak",
                st.baseline_start_offset, st.baseline_end_offset
            )));
        }
        if st.elevation_threshold <= st.depression_threshold {
            warn!(
                "elevation threshold {} is not above depression threshold {}; early elevation can never be reported",
                st.elevation_threshold, st.depression_threshold
            );
        }

        Ok(())
    }
}

/// Check the image stage settings; the blur needs a positive sigma.
pub fn validate_extraction(extraction: &ExtractionConfig) -> Result<()> {
    if !extraction.blur_sigma.is_finite() || extraction.blur_sigma <= 0.0 {
        return Err(invalid(format!(
            "blur sigma must be positive, got {}",
            extraction.blur_sigma
        )));
    }
    if extraction.structuring_length == 0 {
        return Err(invalid("structuring element length must be at least 1".to_string()));
    }
    if !extraction.min_signal.is_finite() {
        return Err(invalid("minimum signal level must be finite".to_string()));
    }
    Ok(())
}

/// Check band-pass cutoffs against the Nyquist frequency.
pub fn validate_filter(filter: &FilterConfig, sampling_rate_hz: f64) -> Result<()> {
    let nyquist = sampling_rate_hz / 2.0;
    if filter.order == 0 {
        return Err(invalid("filter order must be at least 1".to_string()));
    }
    if !(filter.low_hz > 0.0 && filter.low_hz < nyquist) {
        return Err(invalid(format!(
            "low cutoff {} Hz must lie in (0, {}) Hz",
            filter.low_hz, nyquist
        )));
    }
    if !(filter.high_hz > 0.0 && filter.high_hz < nyquist) {
        return Err(invalid(format!(
            "high cutoff {} Hz must lie in (0, {}) Hz",
            filter.high_hz, nyquist
        )));
    }
    if filter.low_hz >= filter.high_hz {
        return Err(invalid(format!(
            "low cutoff {} Hz must be below high cutoff {} Hz",
            filter.low_hz, filter.high_hz
        )));
    }
    Ok(())
}

fn invalid(message: String) -> EcgError {
    EcgError::InvalidParameter(message)
}
