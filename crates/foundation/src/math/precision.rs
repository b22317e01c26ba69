//! Deterministic float ordering.
//!
//! Extents, legends and label merges sort metric values; all of them go
//! through these helpers so `-0.0` and NaN never produce unstable output.

use core::cmp::Ordering;

/// Canonicalize a floating-point value for deterministic ordering.
///
/// Rules:
/// - `-0.0` becomes `0.0`
/// - all NaNs become a single canonical NaN
pub fn canonical_f64(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

/// Deterministic total ordering for floats.
pub fn stable_total_cmp_f64(a: f64, b: f64) -> Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}

/// Finite values, deduplicated and sorted largest first.
pub fn unique_desc(values: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .map(canonical_f64)
        .collect();
    out.sort_by(|a, b| stable_total_cmp_f64(*b, *a));
    out.dedup_by(|a, b| stable_total_cmp_f64(*a, *b) == Ordering::Equal);
    out
}

/// `(min, max)` over the finite values, or `None` when there are none.
pub fn finite_extent(values: &[f64]) -> Option<(f64, f64)> {
    let mut it = values.iter().copied().filter(|v| v.is_finite());
    let first = it.next()?;
    let mut min = first;
    let mut max = first;
    for v in it {
        min = min.min(v);
        max = max.max(v);
    }
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::{canonical_f64, finite_extent, stable_total_cmp_f64, unique_desc};
    use core::cmp::Ordering;

    #[test]
    fn canonicalizes_negative_zero() {
        assert_eq!(canonical_f64(-0.0), 0.0);
        assert_eq!(canonical_f64(0.0), 0.0);
    }

    #[test]
    fn stable_cmp_is_total_and_deterministic() {
        assert_eq!(stable_total_cmp_f64(1.0, 2.0), Ordering::Less);
        assert_eq!(stable_total_cmp_f64(f64::NAN, f64::NAN), Ordering::Equal);
        assert_eq!(stable_total_cmp_f64(-0.0, 0.0), Ordering::Equal);
    }

    #[test]
    fn unique_desc_drops_duplicates_and_nan() {
        let got = unique_desc(&[3.0, 1.0, f64::NAN, 3.0, -0.0, 0.0, 2.0]);
        assert_eq!(got, vec![3.0, 2.0, 1.0, 0.0]);
    }

    #[test]
    fn extent_ignores_non_finite() {
        assert_eq!(finite_extent(&[f64::INFINITY, 4.0, -1.0]), Some((-1.0, 4.0)));
        assert_eq!(finite_extent(&[f64::NAN]), None);
    }
}
