use log::{debug, warn};
use sci_rs::signal::filter::design::{
    butter_dyn, DigitalFilter, FilterBandType, FilterOutputType, Sos, SosFormatFilter,
};
use sci_rs::signal::filter::sosfiltfilt_dyn;

use crate::config::{validate_filter, FilterConfig};
use crate::error::{EcgError, Result};

/// Design a digital Butterworth band-pass as cascaded second-order sections.
///
/// `order` is the low-pass prototype order, so the result has `order`
/// sections.
pub fn design_bandpass(filter: &FilterConfig, sampling_rate_hz: f64) -> Result<Vec<Sos<f64>>> {
    validate_filter(filter, sampling_rate_hz)?;

    let design = butter_dyn(
        filter.order,
        vec![filter.low_hz, filter.high_hz],
        Some(FilterBandType::Bandpass),
        Some(false),
        Some(FilterOutputType::Sos),
        Some(sampling_rate_hz),
    );
    let sections = match design {
        DigitalFilter::Sos(SosFormatFilter { sos }) => sos,
        _ => {
            return Err(EcgError::InvalidParameter(
                "Butterworth design did not return second-order sections".to_string(),
            ))
        }
    };

    debug!(
        "Butterworth band-pass {}-{} Hz, order {}: {} sections",
        filter.low_hz,
        filter.high_hz,
        filter.order,
        sections.len()
    );

    Ok(sections)
}

/// Odd-extension padding the forward-backward pass needs on each side.
fn padding(sections: &[Sos<f64>]) -> usize {
    3 * (2 * sections.len() + 1)
}

/// Filter forward then backward so the phase shifts cancel.
///
/// Signals no longer than the edge padding are returned unchanged.
pub fn filtfilt(sections: &[Sos<f64>], signal: &[f64]) -> Vec<f64> {
    let pad = padding(sections);
    if sections.is_empty() || signal.len() <= pad {
        if !signal.is_empty() {
            warn!(
                "Signal of {} samples is too short for the {}-sample filter padding, left unfiltered",
                signal.len(),
                pad
            );
        }
        return signal.to_vec();
    }
    sosfiltfilt_dyn(signal.iter(), sections)
}

/// Band-pass a waveform with zero phase, as configured.
pub fn bandpass(signal: &[f64], filter: &FilterConfig, sampling_rate_hz: f64) -> Result<Vec<f64>> {
    let sections = design_bandpass(filter, sampling_rate_hz)?;
    Ok(filtfilt(&sections, signal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;
    use std::f64::consts::PI;

    const FS: f64 = 500.0;

    fn sine(freq: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / FS).sin())
            .collect()
    }

    fn argmax(signal: &[f64]) -> usize {
        signal
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap()
    }

    /// |H(e^jw)| of the cascade.
    fn magnitude(sections: &[Sos<f64>], freq: f64) -> f64 {
        let z_inv = Complex64::from_polar(1.0, -2.0 * PI * freq / FS);
        sections
            .iter()
            .map(|s| {
                let num = s.b[0] + s.b[1] * z_inv + s.b[2] * z_inv * z_inv;
                let den = s.a[0] + s.a[1] * z_inv + s.a[2] * z_inv * z_inv;
                (num / den).norm()
            })
            .product()
    }

    #[test]
    fn test_design_has_one_section_per_order() {
        let sections = design_bandpass(&FilterConfig::default(), FS).unwrap();
        assert_eq!(sections.len(), 4);
        for s in &sections {
            // Poles inside the unit circle
            assert!((s.a[2] / s.a[0]).abs() < 1.0);
        }
    }

    #[test]
    fn test_passband_and_stopband_gain() {
        let sections = design_bandpass(&FilterConfig::default(), FS).unwrap();
        let center = magnitude(&sections, 5.0);
        assert!((center - 1.0).abs() < 0.01, "passband gain {}", center);
        // Half power at the cutoffs
        let edge = magnitude(&sections, 50.0);
        assert!((edge - std::f64::consts::FRAC_1_SQRT_2).abs() < 0.01, "edge gain {}", edge);
        assert!(magnitude(&sections, 150.0) < 0.01);
        assert!(magnitude(&sections, 0.05) < 0.01);
    }

    #[test]
    fn test_odd_order_design() {
        let filter = FilterConfig {
            low_hz: 0.5,
            high_hz: 50.0,
            order: 3,
        };
        let sections = design_bandpass(&filter, FS).unwrap();
        assert_eq!(sections.len(), 3);
        assert!((magnitude(&sections, 5.0) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_zero_phase_keeps_peak_position() {
        let input = sine(5.0, 2000);
        let output = bandpass(&input, &FilterConfig::default(), FS).unwrap();
        assert_eq!(output.len(), input.len());

        // One full 5 Hz period in the middle of the record
        let (start, end) = (900, 1000);
        let in_peak = argmax(&input[start..end]);
        let out_peak = argmax(&output[start..end]);
        assert!(
            (in_peak as i64 - out_peak as i64).abs() <= 1,
            "input peak {} vs output peak {}",
            in_peak,
            out_peak
        );
    }

    #[test]
    fn test_removes_constant_offset() {
        let input: Vec<f64> = sine(5.0, 2000).iter().map(|v| v + 3.0).collect();
        let output = bandpass(&input, &FilterConfig::default(), FS).unwrap();
        let mid = &output[500..1500];
        let mean = mid.iter().sum::<f64>() / mid.len() as f64;
        assert!(mean.abs() < 0.05, "residual offset {}", mean);
    }

    #[test]
    fn test_deterministic() {
        let input = sine(7.0, 1200);
        let a = bandpass(&input, &FilterConfig::default(), FS).unwrap();
        let b = bandpass(&input, &FilterConfig::default(), FS).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_signals_pass_through() {
        let sections = design_bandpass(&FilterConfig::default(), FS).unwrap();
        assert!(filtfilt(&sections, &[]).is_empty());
        assert_eq!(filtfilt(&sections, &[0.4]), vec![0.4]);
        let short = vec![0.1; padding(&sections)];
        assert_eq!(filtfilt(&sections, &short), short);
        let long = sine(5.0, padding(&sections) + 1);
        assert_eq!(filtfilt(&sections, &long).len(), long.len());
    }

    #[test]
    fn test_cutoff_above_nyquist_is_invalid() {
        let filter = FilterConfig {
            low_hz: 0.5,
            high_hz: 300.0,
            order: 4,
        };
        assert!(matches!(
            bandpass(&[0.0; 100], &filter, FS),
            Err(EcgError::InvalidParameter(_))
        ));
    }
}
