//! Robust statistics over repeated timing samples.
//!
//! The median ignores single cold-cache or scheduling outliers that would drag
//! a mean around. This is also the client-side fallback behind the SQL
//! `MEDIAN` aggregate, see [`crate::storage::median`].

/// Median of the samples, `None` for an empty slice.
///
/// Even-sized inputs return the mean of the two middle values. NaN sorts last
/// (`f64::total_cmp`) so it only wins when it is the majority.
pub fn median(samples: &mut [f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_unstable_by(f64::total_cmp);

    let mid = samples.len() / 2;
    if samples.len() % 2 == 0 {
        Some((samples[mid - 1] + samples[mid]) / 2.0)
    } else {
        Some(samples[mid])
    }
}

/// Relative runtime improvement over the baseline.
///
/// Positive when the alternative is faster.
pub fn savings(baseline: f64, runtime: f64) -> f64 {
    (baseline - runtime) / baseline
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_median_odd() {
        assert_eq!(median(&mut [30.0, 10.0, 20.0]), Some(20.0));
    }

    #[test]
    fn test_median_even_averages_middle() {
        assert_eq!(median(&mut [10.0, 20.0, 30.0, 1000.0]), Some(25.0));
    }

    #[test]
    fn test_median_empty() {
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn test_savings() {
        assert!((savings(100.0, 80.0) - 0.2).abs() < 1e-12);
        assert!((savings(100.0, 60.0) - 0.4).abs() < 1e-12);
        assert!(savings(100.0, 150.0) < 0.0);
    }

    proptest! {
        #[test]
        fn prop_median_within_bounds(mut samples in prop::collection::vec(0.0f64..1e6, 1..64)) {
            let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let m = median(&mut samples).unwrap();
            prop_assert!(m >= min && m <= max);
        }

        #[test]
        fn prop_single_outlier_moves_median_at_most_one_rank(
            mut samples in prop::collection::vec(0.0f64..1e3, 2..64),
            outlier in 1e6f64..1e9,
        ) {
            let before = median(&mut samples.clone()).unwrap();
            let mut sorted = samples.clone();
            sorted.sort_unstable_by(f64::total_cmp);
            samples.push(outlier);
            let after = median(&mut samples).unwrap();

            // The new median never passes the next larger sample.
            let idx = sorted.partition_point(|v| *v <= before);
            let next = sorted.get(idx).copied().unwrap_or(before);
            prop_assert!(after >= before);
            prop_assert!(after <= next.max(before));
        }
    }
}
