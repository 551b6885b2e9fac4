//! Per-point test statistics and their canonical critical values.
//!
//! The permutation engine treats the statistic as a pluggable function from
//! observation matrices to a per-point statistic array. This module supplies
//! the stock implementations — one-sample t, two-sample pooled t, and K-group
//! one-way F — plus default thresholds derived from the matching reference
//! distribution at a conventional significance level. Custom statistics are
//! welcome at the same signature but must bring their own threshold.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

use crate::errors::{validate_n_observations, ClusterAnalysisError, ClusterResult};
use crate::threshold::Tail;

/// Significance level used when no explicit threshold is supplied.
pub const DEFAULT_ALPHA: f64 = 0.05;

/// One-sample t statistic against zero, per point.
///
/// `x` is observations × points. Uses the n-1 (sample) variance. A
/// zero-variance point yields a non-finite t, which the engine rejects as a
/// hard numerical failure rather than skewing the null.
pub fn one_sample_t(x: &ArrayView2<'_, f64>) -> ClusterResult<Array1<f64>> {
    let n = x.nrows();
    validate_n_observations(n, 2)?;
    let n_f = n as f64;

    let mean = x.mean_axis(Axis(0)).ok_or_else(|| {
        ClusterAnalysisError::NumericalError {
            reason: "one-sample t: empty observation axis".to_string(),
        }
    })?;
    let mut t = Array1::zeros(x.ncols());
    for (j, col) in x.axis_iter(Axis(1)).enumerate() {
        let m = mean[j];
        let ss: f64 = col.iter().map(|&v| (v - m) * (v - m)).sum();
        let sem = (ss / (n_f - 1.0) / n_f).sqrt();
        t[j] = m / sem;
    }
    Ok(t)
}

/// Two-sample pooled-variance t statistic, per point.
///
/// Positive where group `a` exceeds group `b`.
pub fn two_sample_t(a: &ArrayView2<'_, f64>, b: &ArrayView2<'_, f64>) -> ClusterResult<Array1<f64>> {
    let (na, nb) = (a.nrows(), b.nrows());
    validate_n_observations(na, 2)?;
    validate_n_observations(nb, 2)?;
    if a.ncols() != b.ncols() {
        return Err(ClusterAnalysisError::ShapeMismatch {
            context: "two-sample t groups".to_string(),
            expected: a.ncols(),
            actual: b.ncols(),
        });
    }
    let (na_f, nb_f) = (na as f64, nb as f64);
    let df = na_f + nb_f - 2.0;

    let mut t = Array1::zeros(a.ncols());
    for j in 0..a.ncols() {
        let col_a = a.column(j);
        let col_b = b.column(j);
        let ma = col_a.sum() / na_f;
        let mb = col_b.sum() / nb_f;
        let ssa: f64 = col_a.iter().map(|&v| (v - ma) * (v - ma)).sum();
        let ssb: f64 = col_b.iter().map(|&v| (v - mb) * (v - mb)).sum();
        let pooled = ((ssa + ssb) / df).sqrt();
        t[j] = (ma - mb) / (pooled * (1.0 / na_f + 1.0 / nb_f).sqrt());
    }
    Ok(t)
}

/// One-way F statistic (between-group / within-group variance ratio) across
/// K groups, per point.
///
/// This is the stock statistic of the independent-samples cluster test; it is
/// nonnegative, so only `Tail::Right` (or the equivalent two-sided mask) is
/// meaningful for it.
pub fn f_oneway(groups: &[ArrayView2<'_, f64>]) -> ClusterResult<Array1<f64>> {
    if groups.len() < 2 {
        return Err(ClusterAnalysisError::InvalidParameter {
            parameter: "groups".to_string(),
            value: groups.len() as f64,
            constraint: "at least 2 groups".to_string(),
        });
    }
    let n_points = groups[0].ncols();
    let mut n_total = 0usize;
    for g in groups {
        validate_n_observations(g.nrows(), 2)?;
        if g.ncols() != n_points {
            return Err(ClusterAnalysisError::ShapeMismatch {
                context: "f_oneway group points".to_string(),
                expected: n_points,
                actual: g.ncols(),
            });
        }
        n_total += g.nrows();
    }
    let k = groups.len() as f64;
    let df_between = k - 1.0;
    let df_within = n_total as f64 - k;

    let mut f = Array1::zeros(n_points);
    for j in 0..n_points {
        let mut grand_sum = 0.0;
        let mut group_means = Vec::with_capacity(groups.len());
        for g in groups {
            let s: f64 = g.column(j).sum();
            group_means.push((s / g.nrows() as f64, g.nrows() as f64));
            grand_sum += s;
        }
        let grand_mean = grand_sum / n_total as f64;

        let ss_between: f64 = group_means
            .iter()
            .map(|&(m, n)| n * (m - grand_mean) * (m - grand_mean))
            .sum();
        let ss_within: f64 = groups
            .iter()
            .zip(group_means.iter())
            .map(|(g, &(m, _))| g.column(j).iter().map(|&v| (v - m) * (v - m)).sum::<f64>())
            .sum();

        f[j] = (ss_between / df_between) / (ss_within / df_within);
    }
    Ok(f)
}

/// Default threshold for a one-sample (or paired) t test: the critical t
/// value at [`DEFAULT_ALPHA`] for the given observation count and tail.
///
/// For `Tail::Left` the returned value is negative; for `Tail::TwoSided` it
/// is the positive magnitude at alpha/2.
pub fn default_t_threshold(n_observations: usize, tail: Tail) -> ClusterResult<f64> {
    validate_n_observations(n_observations, 2)?;
    let df = (n_observations - 1) as f64;
    let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| ClusterAnalysisError::NumericalError {
        reason: format!("Student t distribution with df={}: {}", df, e),
    })?;
    let threshold = match tail {
        Tail::Right => dist.inverse_cdf(1.0 - DEFAULT_ALPHA),
        // Negate the upper critical value so left and right thresholds are
        // exact mirrors, keeping the sign-symmetry property bit-exact.
        Tail::Left => -dist.inverse_cdf(1.0 - DEFAULT_ALPHA),
        Tail::TwoSided => dist.inverse_cdf(1.0 - DEFAULT_ALPHA / 2.0),
    };
    Ok(threshold)
}

/// Default threshold for the K-group one-way F test: the critical F value at
/// [`DEFAULT_ALPHA`] for the given group sizes.
///
/// The F statistic is one-sided by construction, so the same magnitude serves
/// `Tail::Right` and `Tail::TwoSided`.
pub fn default_f_threshold(group_sizes: &[usize], tail: Tail) -> ClusterResult<f64> {
    if group_sizes.len() < 2 {
        return Err(ClusterAnalysisError::InvalidParameter {
            parameter: "groups".to_string(),
            value: group_sizes.len() as f64,
            constraint: "at least 2 groups".to_string(),
        });
    }
    if tail == Tail::Left {
        return Err(ClusterAnalysisError::InvalidParameter {
            parameter: "tail".to_string(),
            value: -1.0,
            constraint: "the F statistic is nonnegative; use tail 0 or 1".to_string(),
        });
    }
    let n_total: usize = group_sizes.iter().sum();
    // Check before subtracting so degenerate group sizes (empty groups
    // included) fail cleanly instead of underflowing the within df.
    if n_total <= group_sizes.len() {
        return Err(ClusterAnalysisError::InsufficientData {
            required: group_sizes.len() + 1,
            actual: n_total,
        });
    }
    let df_between = (group_sizes.len() - 1) as f64;
    let df_within = (n_total - group_sizes.len()) as f64;
    let dist = FisherSnedecor::new(df_between, df_within).map_err(|e| {
        ClusterAnalysisError::NumericalError {
            reason: format!(
                "F distribution with df=({}, {}): {}",
                df_between, df_within, e
            ),
        }
    })?;
    Ok(dist.inverse_cdf(1.0 - DEFAULT_ALPHA))
}

/// Flatten an observation array's measurement axes into one point axis.
///
/// The engine works on observations × points internally; the measurement
/// shape is carried separately for lattice clustering and result masks.
pub fn flatten_observations(
    x: &ndarray::ArrayD<f64>,
) -> ClusterResult<(Array2<f64>, Vec<usize>)> {
    if x.ndim() < 2 {
        return Err(ClusterAnalysisError::ShapeMismatch {
            context: "observation array rank".to_string(),
            expected: 2,
            actual: x.ndim(),
        });
    }
    let n_obs = x.shape()[0];
    let point_shape: Vec<usize> = x.shape()[1..].to_vec();
    let n_points: usize = point_shape.iter().product();
    let flat = x
        .to_owned()
        .into_shape((n_obs, n_points))
        .map_err(|_| ClusterAnalysisError::ShapeMismatch {
            context: "observation array flattening".to_string(),
            expected: n_obs * n_points,
            actual: x.len(),
        })?;
    Ok((flat, point_shape))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use ndarray::array;

    #[test]
    fn test_one_sample_t_known_values() {
        // Column 0: mean 2, sd 1, n 4 -> t = 2 / (1/2) = 4.
        let x = array![[1.0, 0.0], [2.0, 0.0], [2.0, 1.0], [3.0, -1.0]];
        let t = one_sample_t(&x.view()).unwrap();
        assert_approx_eq!(t[0], 4.0, 1e-12);
        // Column 1: mean 0 -> t = 0.
        assert_approx_eq!(t[1], 0.0, 1e-12);
    }

    #[test]
    fn test_one_sample_t_sign_antisymmetry() {
        let x = array![[1.0, -0.5], [2.0, 0.3], [0.5, -1.2], [1.7, 0.9]];
        let neg = x.mapv(|v| -v);
        let t_pos = one_sample_t(&x.view()).unwrap();
        let t_neg = one_sample_t(&neg.view()).unwrap();
        // Exact in floating point: every operation commutes with negation.
        for (a, b) in t_pos.iter().zip(t_neg.iter()) {
            assert_eq!(*a, -*b);
        }
    }

    #[test]
    fn test_two_sample_t_direction() {
        let a = array![[3.0], [4.0], [5.0]];
        let b = array![[0.0], [1.0], [2.0]];
        let t = two_sample_t(&a.view(), &b.view()).unwrap();
        assert!(t[0] > 0.0);
        let t_rev = two_sample_t(&b.view(), &a.view()).unwrap();
        assert_approx_eq!(t[0], -t_rev[0], 1e-12);
    }

    #[test]
    fn test_f_oneway_matches_squared_t_for_two_groups() {
        // With two groups, one-way F equals the pooled t squared.
        let a = array![[3.0, 1.0], [4.0, 2.0], [5.5, 0.5]];
        let b = array![[0.0, 1.5], [1.0, 2.5], [2.0, 0.0], [1.5, 1.0]];
        let f = f_oneway(&[a.view(), b.view()]).unwrap();
        let t = two_sample_t(&a.view(), &b.view()).unwrap();
        for j in 0..2 {
            assert_approx_eq!(f[j], t[j] * t[j], 1e-10);
        }
    }

    #[test]
    fn test_f_oneway_rejects_single_group() {
        let a = array![[1.0], [2.0]];
        assert!(f_oneway(&[a.view()]).is_err());
    }

    #[test]
    fn test_shape_mismatch_between_groups() {
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        let b = array![[1.0], [2.0]];
        assert!(matches!(
            two_sample_t(&a.view(), &b.view()),
            Err(ClusterAnalysisError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            f_oneway(&[a.view(), b.view()]),
            Err(ClusterAnalysisError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_default_t_threshold_values() {
        // t_{0.95, 39} ~= 1.685, t_{0.975, 39} ~= 2.023.
        let right = default_t_threshold(40, Tail::Right).unwrap();
        assert_approx_eq!(right, 1.685, 1e-2);
        let two = default_t_threshold(40, Tail::TwoSided).unwrap();
        assert_approx_eq!(two, 2.023, 1e-2);
        let left = default_t_threshold(40, Tail::Left).unwrap();
        assert_eq!(left, -right);
    }

    #[test]
    fn test_default_f_threshold_values() {
        // F_{0.95}(1, 71) ~= 3.976.
        let f = default_f_threshold(&[40, 33], Tail::Right).unwrap();
        assert_approx_eq!(f, 3.976, 1e-2);
        assert!(default_f_threshold(&[40, 33], Tail::Left).is_err());
    }

    #[test]
    fn test_default_f_threshold_degenerate_group_sizes() {
        // Too few pooled observations must error, not underflow the
        // within-group degrees of freedom.
        assert!(matches!(
            default_f_threshold(&[0, 0], Tail::Right),
            Err(ClusterAnalysisError::InsufficientData { .. })
        ));
        assert!(matches!(
            default_f_threshold(&[1, 1], Tail::Right),
            Err(ClusterAnalysisError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_flatten_observations() {
        let x = ndarray::ArrayD::from_shape_vec(
            ndarray::IxDyn(&[2, 3, 2]),
            (0..12).map(|v| v as f64).collect(),
        )
        .unwrap();
        let (flat, shape) = flatten_observations(&x).unwrap();
        assert_eq!(flat.dim(), (2, 6));
        assert_eq!(shape, vec![3, 2]);
        // Row-major flattening preserves point order.
        assert_eq!(flat[[0, 0]], 0.0);
        assert_eq!(flat[[1, 5]], 11.0);
    }
}
