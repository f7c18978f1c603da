//! Calibration math for capacity and false positive rate.
//!
//! The filter core answers two questions: "how many bits do I need to hold
//! `n` items at rate `fpr`" and "what rate does `m` bits over `n` items
//! give". Both reduce to evaluating a per-round false positive model and
//! inverting it numerically.
//!
//! # Model
//!
//! One round reaches `w` bits from its chosen position (the block plus its
//! overhang into the next bucket). With `n = m / c` items inserted, the
//! number landing in a given `w`-bit window is approximately Poisson with
//! mean `lambda = w * k / c`. The per-round rate is the Poisson-weighted sum
//! of the subfilter's conditional model `fpr(i, w)`, and the filter-level
//! rate raises it to the `k`-th power. The closed-form classical Bloom
//! result
//!
//! ```text
//! (1 - e^(-k_total / c))^k_total
//! ```
//!
//! is a lower bound on every discipline and doubles as a floor against
//! truncation error in the series.
//!
//! # References
//!
//! - Bloom, Burton H. (1970). "Space/Time Trade-offs in Hash Coding with
//!   Allowable Errors"
//! - Putze, Sanders, Singler (2007). "Cache-, Hash- and Space-Efficient
//!   Bloom Filters"

#![allow(clippy::cast_precision_loss)]

/// Series truncation limit for the Poisson-weighted sum.
const MAX_POISSON_TERMS: usize = 1000;

/// Bisection resolution on the bits-per-item ratio.
const EPS: f64 = 1.0 / usize::MAX as f64;

/// False positive rate of a classical Bloom filter at `c` bits per item
/// with `k_total` bit probes per element.
///
/// # Examples
///
/// ```
/// use bloomforge::core::params::classical_fpr;
///
/// // ~9.6 bits per item with 7 probes is the textbook 1% configuration.
/// let fpr = classical_fpr(7, 9.6);
/// assert!((fpr - 0.01).abs() < 0.002);
/// ```
#[must_use]
pub fn classical_fpr(k_total: usize, c: f64) -> f64 {
    (1.0 - (-(k_total as f64) / c).exp()).powi(k_total as i32)
}

/// Bits per item of a classical Bloom filter achieving `fpr` with `k_total`
/// probes: `k / -ln(1 - fpr^(1/k))`.
///
/// The expression degenerates at both ends of the unit interval: `fpr` so
/// close to 1 that `1 - fpr^(1/k)` underflows to zero means any capacity
/// works, and `fpr` so close to 0 that the logarithm vanishes means no
/// finite capacity does; the variants report which.
#[must_use]
pub fn classical_capacity(k_total: usize, fpr: f64) -> ClassicalCapacity {
    let d = 1.0 - fpr.powf(1.0 / k_total as f64);
    if d == 0.0 {
        return ClassicalCapacity::AnyCapacity;
    }
    let l = d.ln();
    if l == 0.0 {
        return ClassicalCapacity::Unbounded;
    }
    ClassicalCapacity::BitsPerItem(k_total as f64 / -l)
}

/// Outcome of the classical capacity estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClassicalCapacity {
    /// A finite bits-per-item ratio.
    BitsPerItem(f64),
    /// The requested rate is effectively 1; any capacity satisfies it.
    AnyCapacity,
    /// The requested rate is effectively 0; no finite capacity satisfies it.
    Unbounded,
}

/// Poisson-weighted sum `sum_i Poisson(i; lambda) * term(i)`.
///
/// Evaluated in log space (so large `lambda` degrades to zero instead of
/// overflowing the factorial) and truncated at [`MAX_POISSON_TERMS`] terms
/// or earlier once the unimodal series is on its descending slope and the
/// partial sum has stopped changing.
#[must_use]
pub fn poisson_weighted_sum(lambda: f64, mut term: impl FnMut(usize) -> f64) -> f64 {
    let loglambda = lambda.ln();
    let mut res = 0.0;
    let mut prev_delta = 0.0;
    let mut ln_factorial = 0.0;
    for i in 0..MAX_POISSON_TERMS {
        if i > 0 {
            ln_factorial += (i as f64).ln();
        }
        let poisson = (i as f64 * loglambda - lambda - ln_factorial).exp();
        let delta = poisson * term(i);
        let next = res + delta;
        if delta < prev_delta && next == res {
            break;
        }
        prev_delta = delta;
        res = next;
    }
    res
}

/// Find the bits-per-item ratio whose modeled rate meets `target_fpr`.
///
/// Starting from the classical estimate `c_start`, widen a bracket by
/// factors of 1.5 until the target is enclosed, then bisect down to [`EPS`].
/// The result is capped at `c_max` (the largest ratio whose bit count still
/// fits in `usize` for the caller's item count).
#[must_use]
pub fn solve_capacity_ratio(
    c_start: f64,
    c_max: f64,
    target_fpr: f64,
    fpr_for_c: impl Fn(f64) -> f64,
) -> f64 {
    let mut c0 = c_start;
    let mut c1 = c_start;
    if fpr_for_c(c1) > target_fpr {
        // Expected case: the classical bound undershoots the discipline.
        loop {
            let cn = c1 * 1.5;
            if cn > c_max {
                return c_max;
            }
            c0 = c1;
            c1 = cn;
            if fpr_for_c(c1) <= target_fpr {
                break;
            }
        }
    } else {
        // The start overshoots; shrink until bracketed.
        loop {
            let cn = c0 / 1.5;
            c1 = c0;
            c0 = cn;
            if fpr_for_c(c0) >= target_fpr {
                break;
            }
        }
    }

    let mut cm;
    loop {
        cm = c0 + (c1 - c0) / 2.0;
        if !(cm > c0 && cm < c1 && c1 - c0 >= EPS) {
            break;
        }
        if fpr_for_c(cm) > target_fpr {
            c0 = cm;
        } else {
            c1 = cm;
        }
    }
    cm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classical_fpr_textbook_values() {
        // m/n = 9.585, k = 7 gives ~1%; m/n = 14.377, k = 10 gives ~0.1%.
        assert!((classical_fpr(7, 9.585) - 0.01).abs() < 0.001);
        assert!((classical_fpr(10, 14.377) - 0.001).abs() < 0.0002);
    }

    #[test]
    fn test_classical_fpr_limits() {
        // Starved filter: every probe lands on a set bit.
        assert!(classical_fpr(4, 0.01) > 0.99);
        // Overprovisioned filter: vanishing rate.
        assert!(classical_fpr(4, 1e6) < 1e-20);
    }

    #[test]
    fn test_classical_fpr_decreases_with_capacity() {
        let mut prev = 1.0;
        for c in [1.0, 2.0, 4.0, 8.0, 16.0, 32.0] {
            let f = classical_fpr(5, c);
            assert!(f < prev);
            prev = f;
        }
    }

    #[test]
    fn test_classical_capacity_finite() {
        match classical_capacity(7, 0.01) {
            ClassicalCapacity::BitsPerItem(c) => {
                assert!((c - 9.585).abs() < 0.01, "c={}", c);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classical_capacity_degenerate_high() {
        // fpr exactly 1: 1 - 1^(1/k) is zero.
        assert_eq!(classical_capacity(7, 1.0), ClassicalCapacity::AnyCapacity);
    }

    #[test]
    fn test_classical_capacity_degenerate_low() {
        // fpr = 0: fpr^(1/k) = 0, d = 1, ln(1) = 0.
        assert_eq!(classical_capacity(7, 0.0), ClassicalCapacity::Unbounded);
    }

    #[test]
    fn test_poisson_sum_of_unit_terms_is_one() {
        for lambda in [0.1, 1.0, 5.0, 50.0, 300.0] {
            let total = poisson_weighted_sum(lambda, |_| 1.0);
            assert!((total - 1.0).abs() < 1e-9, "lambda={} total={}", lambda, total);
        }
    }

    #[test]
    fn test_poisson_sum_recovers_mean() {
        for lambda in [0.5, 2.0, 20.0] {
            let mean = poisson_weighted_sum(lambda, |i| i as f64);
            assert!((mean - lambda).abs() < 1e-6 * lambda.max(1.0));
        }
    }

    #[test]
    fn test_poisson_huge_lambda_degrades_to_zero() {
        // exp(-lambda) underflows; the sum collapses instead of overflowing.
        let total = poisson_weighted_sum(1e6, |_| 1.0);
        assert!(total.is_finite());
    }

    #[test]
    fn test_solve_capacity_ratio_inverts_model() {
        // Model: fpr = 2^-c, so the answer for 1% is log2(100).
        let f = |c: f64| (-c * std::f64::consts::LN_2).exp();
        let c = solve_capacity_ratio(1.0, 1e12, 0.01, f);
        assert!((c - 100f64.log2()).abs() < 1e-6, "c={}", c);
    }

    #[test]
    fn test_solve_capacity_ratio_overshooting_start() {
        let f = |c: f64| (-c * std::f64::consts::LN_2).exp();
        // Start far above the answer; the downward bracket must engage.
        let c = solve_capacity_ratio(1000.0, 1e12, 0.01, f);
        assert!((c - 100f64.log2()).abs() < 1e-6, "c={}", c);
    }

    #[test]
    fn test_solve_capacity_ratio_caps_at_max() {
        // Unsatisfiable target within the cap.
        let f = |c: f64| (-c * std::f64::consts::LN_2).exp();
        let c = solve_capacity_ratio(1.0, 50.0, 1e-30, f);
        assert_eq!(c, 50.0);
    }
}
