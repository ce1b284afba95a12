use tracing::warn;

/// Pyramid level of each native level: `round(log2(downsample))`.
///
/// Downsamples below 1 or not finite map to level 0. Sequences that are
/// not powers of two or not strictly increasing are accepted with a
/// warning, since the rounded levels are then approximate or duplicated.
pub fn pyramid_levels_from_downsamples(downsamples: &[f64]) -> Vec<u32> {
    let levels: Vec<u32> = downsamples.iter().map(|&d| pyramid_level(d)).collect();

    let off_pattern: Vec<f64> = downsamples
        .iter()
        .zip(&levels)
        .filter(|&(&d, &level)| (d - f64::from(level).exp2()).abs() > 1e-3 * d.abs().max(1.0))
        .map(|(&d, _)| d)
        .collect();
    if !off_pattern.is_empty() {
        warn!(downsamples = ?off_pattern, "downsamples are not powers of two, rounding");
    }

    if downsamples.windows(2).any(|w| w[1] <= w[0]) {
        warn!(?downsamples, "downsamples are not strictly increasing");
    }

    levels
}

fn pyramid_level(downsample: f64) -> u32 {
    if !downsample.is_finite() || downsample < 1.0 {
        return 0;
    }
    downsample.log2().round() as u32
}
