use image::GrayImage;
use log::debug;

use crate::error::{EcgError, Result};

/// Collapse a trace mask to one sample per pixel column by summing intensities.
pub fn project_columns(mask: &GrayImage) -> Vec<f64> {
    let (width, height) = mask.dimensions();
    (0..width)
        .map(|x| {
            (0..height)
                .map(|y| mask.get_pixel(x, y)[0] as f64)
                .sum::<f64>()
        })
        .collect()
}

/// Median of a sample sequence; the mean of the middle pair for even lengths.
pub fn median(signal: &[f64]) -> Option<f64> {
    if signal.is_empty() {
        return None;
    }
    let mut sorted = signal.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Center a raw projection on its median and scale it by its peak-to-peak range.
///
/// Column sums are mostly background with rare trace columns, so the median
/// tracks the baseline where a mean would be dragged by the trace.
pub fn normalize(raw: &[f64]) -> Result<Vec<f64>> {
    let center = median(raw).ok_or_else(|| EcgError::Extraction("empty projection".to_string()))?;
    let min_v = raw.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_v = raw.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max_v - min_v;

    debug!(
        "Projection: {} columns, median {:.1}, range [{:.1}, {:.1}]",
        raw.len(),
        center,
        min_v,
        max_v
    );

    if !(range > 0.0) || !range.is_finite() {
        return Err(EcgError::Extraction(
            "projection is flat, no trace columns stand out".to_string(),
        ));
    }

    Ok(raw.iter().map(|v| (v - center) / range).collect())
}
