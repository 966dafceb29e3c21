use std::f64;

/// Stable `ln(Σ exp(lp))`. An empty slice, or one holding only `-inf`, sums to `-inf`.
#[inline(always)]
pub fn logsumexp(lps: &[f64]) -> f64 {
    let largest = lps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if largest == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let x = lps.iter().map(|lp| (lp - largest).exp()).sum::<f64>().ln();
    largest + x
}

/// `logsumexp(&[a, b])` without the slice.
#[inline(always)]
pub fn logsumexp2(a: f64, b: f64) -> f64 {
    let largest = a.max(b);
    if largest == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    largest + ((a - largest).exp() + (b - largest).exp()).ln()
}
