//! Otsu threshold selection

/// Number of histogram bins
pub const OTSU_BINS: usize = 256;

/// Otsu's threshold over the finite values in `values`.
///
/// The histogram spans the valid range in [`OTSU_BINS`] equal bins and the
/// threshold returned is the centre of the last bin of the lower class, the
/// bin that maximizes between-class variance. Returns `None` when there are
/// fewer than two distinct values.
pub fn otsu_threshold<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let values: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if values.len() < 2 || !(hi > lo) {
        return None;
    }

    let width = (hi - lo) / OTSU_BINS as f64;
    let mut histogram = [0u64; OTSU_BINS];
    for &v in &values {
        let bin = (((v - lo) / width) as usize).min(OTSU_BINS - 1);
        histogram[bin] += 1;
    }
    let centre = |bin: usize| lo + (bin as f64 + 0.5) * width;

    let total = values.len() as f64;
    let total_sum: f64 = histogram.iter().enumerate().map(|(i, &n)| n as f64 * centre(i)).sum();

    let mut best: Option<(usize, f64)> = None;
    let mut w0 = 0.0;
    let mut sum0 = 0.0;
    for (bin, &count) in histogram.iter().enumerate().take(OTSU_BINS - 1) {
        w0 += count as f64;
        sum0 += count as f64 * centre(bin);
        let w1 = total - w0;
        if w0 == 0.0 || w1 == 0.0 {
            continue;
        }
        let mu0 = sum0 / w0;
        let mu1 = (total_sum - sum0) / w1;
        let between = w0 * w1 * (mu0 - mu1).powi(2);
        if best.map_or(true, |(_, b)| between > b) {
            best = Some((bin, between));
        }
    }

    best.map(|(bin, _)| centre(bin))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bimodal_split_between_modes() {
        let mut values = vec![-22.0; 400];
        values.extend(std::iter::repeat(-8.0).take(600));
        values.extend([-21.5, -22.5, -7.5, -8.5]);
        let t = otsu_threshold(values).unwrap();
        assert!(t > -22.5 && t < -8.5, "threshold {}", t);
        // values at the low mode fall below the threshold
        assert!(-22.0 <= t);
    }

    #[test]
    fn constant_input_has_no_threshold() {
        assert_eq!(otsu_threshold(vec![3.0; 10]), None);
        assert_eq!(otsu_threshold(vec![f64::NAN, 1.0]), None);
        assert_eq!(otsu_threshold(Vec::new()), None);
    }

    #[test]
    fn two_values_split() {
        let t = otsu_threshold(vec![0.0, 0.0, 10.0, 10.0]).unwrap();
        assert!(t >= 0.0 && t < 10.0);
    }
}
