use log::debug;

use crate::config::BeatConfig;

/// Indices of local maxima, in increasing order.
///
/// A flat top counts once, at its midpoint (rounded down). The first and
/// last samples are never maxima.
pub fn local_maxima(signal: &[f64]) -> Vec<usize> {
    let n = signal.len();
    let mut maxima = Vec::new();
    if n < 3 {
        return maxima;
    }

    let mut i = 1;
    let i_max = n - 1;
    while i < i_max {
        if signal[i - 1] < signal[i] {
            let mut ahead = i + 1;
            while ahead < i_max && signal[ahead] == signal[i] {
                ahead += 1;
            }
            if signal[ahead] < signal[i] {
                let left = i;
                let right = ahead - 1;
                maxima.push((left + right) / 2);
                i = ahead;
            }
        }
        i += 1;
    }

    maxima
}

/// Keep the tallest candidates so that no two survivors are closer than
/// `min_distance` samples. Returns survivors in increasing index order.
pub fn enforce_distance(signal: &[f64], candidates: &[usize], min_distance: usize) -> Vec<usize> {
    if min_distance <= 1 || candidates.len() < 2 {
        return candidates.to_vec();
    }

    let mut keep = vec![true; candidates.len()];

    // Tallest first; ties go to the later index
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        signal[candidates[a]]
            .total_cmp(&signal[candidates[b]])
            .then(a.cmp(&b))
    });

    for &i in order.iter().rev() {
        if !keep[i] {
            continue;
        }
        let mut j = i;
        while j > 0 && candidates[i] - candidates[j - 1] < min_distance {
            keep[j - 1] = false;
            j -= 1;
        }
        let mut j = i + 1;
        while j < candidates.len() && candidates[j] - candidates[i] < min_distance {
            keep[j] = false;
            j += 1;
        }
    }

    candidates
        .iter()
        .zip(keep)
        .filter_map(|(&idx, kept)| kept.then_some(idx))
        .collect()
}

/// Refractory distance in samples for a sampling rate.
pub fn refractory_samples(config: &BeatConfig, sampling_rate_hz: f64) -> usize {
    ((config.refractory_s * sampling_rate_hz).ceil() as usize).max(1)
}

/// Locate R-peaks in a filtered waveform.
///
/// The height threshold is `height_fraction` of the waveform's own maximum,
/// since the trace has no calibrated voltage scale. An empty result is valid.
pub fn detect_peaks(signal: &[f64], sampling_rate_hz: f64, config: &BeatConfig) -> Vec<usize> {
    if signal.is_empty() {
        return Vec::new();
    }

    let max_v = signal.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let height = config.height_fraction * max_v;
    let min_distance = refractory_samples(config, sampling_rate_hz);

    let candidates: Vec<usize> = local_maxima(signal)
        .into_iter()
        .filter(|&i| signal[i] >= height)
        .collect();
    let peaks = enforce_distance(signal, &candidates, min_distance);

    debug!(
        "Peaks: {} of {} candidates above {:.3} with {}-sample spacing",
        peaks.len(),
        candidates.len(),
        height,
        min_distance
    );

    peaks
}

/// Mean heart rate in beats per minute from consecutive R-R intervals.
pub fn heart_rate_bpm(peaks: &[usize], sampling_rate_hz: f64) -> Option<f64> {
    if peaks.len() < 2 {
        return None;
    }
    let span = (peaks[peaks.len() - 1] - peaks[0]) as f64;
    let mean_rr = span / (peaks.len() - 1) as f64;
    Some(60.0 * sampling_rate_hz / mean_rr)
}
