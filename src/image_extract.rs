use std::path::Path;

use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;
use log::debug;

use crate::config::{validate_extraction, ExtractionConfig};
use crate::ecg_process;
use crate::error::{EcgError, Result};

const INK: u8 = 255;
const BACKGROUND: u8 = 0;

/// Load an image file and convert it to 8-bit grayscale.
///
/// The file handle is owned by the decoder and released before this returns,
/// on success and on failure.
pub fn load_image(path: &Path) -> Result<GrayImage> {
    let img = image::open(path).map_err(|source| EcgError::ImageLoad {
        source_name: path.display().to_string(),
        source,
    })?;
    Ok(img.into_luma8())
}

/// Decode an in-memory image (PNG, JPEG, ...) to 8-bit grayscale.
pub fn load_image_bytes(bytes: &[u8]) -> Result<GrayImage> {
    let img = image::load_from_memory(bytes).map_err(|source| EcgError::ImageLoad {
        source_name: "<memory>".to_string(),
        source,
    })?;
    Ok(img.into_luma8())
}

/// Turn a grayscale scan into a binary trace mask with the grid removed.
///
/// Dark ink on light paper is inverted so the trace is bright, blurred to
/// suppress scan noise, thresholded, then opened with a 1-row structuring
/// element of `structuring_length` pixels.
pub fn trace_mask(image: &GrayImage, config: &ExtractionConfig) -> Result<GrayImage> {
    validate_extraction(config)?;
    Ok(build_mask(image, config))
}

fn build_mask(image: &GrayImage, config: &ExtractionConfig) -> GrayImage {
    let mut inverted = image.clone();
    image::imageops::invert(&mut inverted);

    let blurred = gaussian_blur_f32(&inverted, config.blur_sigma);
    let binary = binarize(&blurred, config.binarize_threshold);

    let length = config.structuring_length as usize;
    let eroded = erode_horizontal(&binary, length);
    dilate_horizontal(&eroded, length)
}

/// Extract a normalized 1-D waveform from a grayscale scan.
///
/// Fails with `EcgError::Extraction` when the normalized waveform never
/// reaches `min_signal`, which happens for blank images or when grid
/// removal erased the trace.
pub fn extract_waveform(image: &GrayImage, config: &ExtractionConfig) -> Result<Vec<f64>> {
    validate_extraction(config)?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(EcgError::Extraction("image has no pixels".to_string()));
    }

    let mask = build_mask(image, config);
    let raw = ecg_process::project_columns(&mask);
    let signal = ecg_process::normalize(&raw)?;

    let peak = signal.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    debug!(
        "Extracted {} samples from {}x{} image, peak {:.3}",
        signal.len(),
        width,
        height,
        peak
    );

    if peak < config.min_signal {
        return Err(EcgError::Extraction(format!(
            "waveform peak {:.3} is below the minimum signal level {:.3}",
            peak, config.min_signal
        )));
    }

    Ok(signal)
}

fn binarize(image: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y)[0] > threshold {
            Luma([INK])
        } else {
            Luma([BACKGROUND])
        }
    })
}

/// Window of a 1 x `length` element anchored at its center, clipped to the row.
/// Pixels outside the image do not take part in the min/max.
fn window(x: usize, length: usize, width: usize, reflect: bool) -> (usize, usize) {
    let anchor = length / 2;
    let (lo, hi) = if reflect {
        ((x + anchor + 1).saturating_sub(length), x + anchor)
    } else {
        (x.saturating_sub(anchor), (x + length - 1).saturating_sub(anchor))
    };
    (lo, hi.min(width - 1))
}

fn erode_horizontal(image: &GrayImage, length: usize) -> GrayImage {
    morph_horizontal(image, length, false)
}

fn dilate_horizontal(image: &GrayImage, length: usize) -> GrayImage {
    morph_horizontal(image, length, true)
}

/// Erosion takes the row minimum over the element, dilation the maximum over
/// the reflected element, so erode-then-dilate is a proper opening.
fn morph_horizontal(image: &GrayImage, length: usize, dilate: bool) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut out = GrayImage::new(width, height);
    let w = width as usize;

    for y in 0..height {
        let row: Vec<u8> = (0..width).map(|x| image.get_pixel(x, y)[0]).collect();
        for x in 0..w {
            let (lo, hi) = window(x, length, w, dilate);
            let span = &row[lo..=hi];
            let value = if dilate {
                span.iter().copied().max()
            } else {
                span.iter().copied().min()
            };
            out.put_pixel(x as u32, y, Luma([value.unwrap_or(BACKGROUND)]));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// White paper with a 3-pixel-thick dark stroke over `x_range`.
    fn paper_with_stroke(width: u32, height: u32, x_range: std::ops::Range<u32>) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if x_range.contains(&x) && (48..51).contains(&y) {
                Luma([0])
            } else {
                Luma([255])
            }
        })
    }

    #[test]
    fn test_blank_paper_is_extraction_error() {
        let img = GrayImage::from_pixel(200, 100, Luma([255]));
        let result = extract_waveform(&img, &ExtractionConfig::default());
        assert!(matches!(result, Err(EcgError::Extraction(_))));
    }

    #[test]
    fn test_all_zero_image_is_extraction_error() {
        let img = GrayImage::new(200, 100);
        let result = extract_waveform(&img, &ExtractionConfig::default());
        assert!(matches!(result, Err(EcgError::Extraction(_))));
    }

    #[test]
    fn test_zero_blur_sigma_is_invalid_parameter() {
        let img = GrayImage::from_pixel(100, 50, Luma([255]));
        let config = ExtractionConfig {
            blur_sigma: 0.0,
            ..ExtractionConfig::default()
        };
        assert!(matches!(
            extract_waveform(&img, &config),
            Err(EcgError::InvalidParameter(_))
        ));
        assert!(matches!(
            trace_mask(&img, &config),
            Err(EcgError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let result = load_image(Path::new("/nonexistent/ecg-strip.png"));
        match result {
            Err(EcgError::ImageLoad { source_name, .. }) => {
                assert!(source_name.contains("ecg-strip.png"));
            }
            other => panic!("expected ImageLoad, got {:?}", other),
        }
    }

    #[test]
    fn test_garbage_bytes_are_load_error() {
        let result = load_image_bytes(b"definitely not an image");
        assert!(matches!(result, Err(EcgError::ImageLoad { .. })));
    }

    #[test]
    fn test_long_stroke_survives_opening() {
        let img = paper_with_stroke(200, 100, 0..80);
        let mask = trace_mask(&img, &ExtractionConfig::default()).unwrap();
        assert_eq!(mask.get_pixel(40, 49)[0], INK);
        assert_eq!(mask.get_pixel(150, 49)[0], BACKGROUND);
    }

    #[test]
    fn test_short_stroke_removed_by_opening() {
        let img = paper_with_stroke(200, 100, 100..120);
        let mask = trace_mask(&img, &ExtractionConfig::default()).unwrap();
        assert!(mask.pixels().all(|p| p[0] == BACKGROUND));
    }

    #[test]
    fn test_stroke_extracts_one_sample_per_column() {
        let img = paper_with_stroke(200, 100, 0..80);
        let signal = extract_waveform(&img, &ExtractionConfig::default()).unwrap();
        assert_eq!(signal.len(), 200);
        assert!((signal[40] - 1.0).abs() < 1e-9);
        assert!(signal[150].abs() < 1e-9);
    }

    #[test]
    fn test_opening_restores_long_runs() {
        let mut row = GrayImage::new(120, 1);
        for x in 10..90 {
            row.put_pixel(x, 0, Luma([INK]));
        }
        let opened = dilate_horizontal(&erode_horizontal(&row, 50), 50);
        for x in 0..120 {
            let expected = if (10..90).contains(&x) { INK } else { BACKGROUND };
            assert_eq!(opened.get_pixel(x, 0)[0], expected, "column {}", x);
        }
    }
}
