//! Cluster-level permutation testing engine.
//!
//! Orchestrates the full pipeline: observed statistic → threshold → cluster
//! formation, then a permutation loop (group relabeling or sign flips) that
//! records the maximum cluster mass per trial into a null distribution, and
//! finally rank-based p-values for the observed clusters.
//!
//! ## Permutation policy
//!
//! The identity arrangement is *not* forced as a trial: the `1 +` terms of
//! the rank formula `(1 + #{null >= mass}) / (1 + n_permutations)` already
//! behave as if the observed arrangement were one extra trial, so every
//! p-value lies in `[1/(n_permutations + 1), 1]`.
//!
//! ## Determinism
//!
//! Each trial derives an independent RNG substream from the base seed and its
//! own index, so a fixed seed reproduces the null distribution exactly,
//! sequentially or in parallel (enable the `parallel` cargo feature for a
//! rayon worker pool).

use ndarray::{Array1, Array2, Array3, ArrayD, ArrayView2, Axis, IxDyn};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::cluster::{find_clusters, Cluster};
use crate::connectivity::{AdjacencyGraph, Connectivity};
use crate::errors::{
    validate_all_finite, validate_permutation_count, ClusterAnalysisError, ClusterResult,
};
use crate::rng::PermutationRng;
use crate::statistic::{
    default_f_threshold, default_t_threshold, f_oneway, flatten_observations, one_sample_t,
};
use crate::threshold::{threshold_statistic, validate_threshold, Tail};

/// Configuration for a cluster permutation test.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterTestConfig {
    /// Number of permutation trials.
    pub n_permutations: usize,
    /// Test direction.
    pub tail: Tail,
    /// Cluster-forming threshold. `None` derives the canonical critical
    /// value for the stock statistic at alpha = 0.05; a caller-supplied
    /// statistic requires an explicit value.
    pub threshold: Option<f64>,
    /// Temporal adjacency bound for graph connectivity on space × time
    /// data: points up to this many time steps apart may join a cluster;
    /// `0` clusters each time slice independently. Ignored for lattice
    /// adjacency.
    pub max_time_step: usize,
    /// Base RNG seed. `None` draws one from OS entropy (irreproducible).
    pub seed: Option<u64>,
}

impl Default for ClusterTestConfig {
    fn default() -> Self {
        Self {
            n_permutations: 1024,
            tail: Tail::TwoSided,
            threshold: None,
            max_time_step: 0,
            seed: None,
        }
    }
}

/// Results of a cluster permutation test.
#[derive(Debug, Clone)]
pub struct ClusterTestResult {
    /// Observed per-point statistic, in the measurement-space shape.
    pub statistic: ArrayD<f64>,
    /// Membership mask per observed cluster (same shape as `statistic`).
    pub clusters: Vec<ArrayD<bool>>,
    /// Cluster masses, parallel to `clusters`.
    pub cluster_masses: Vec<f64>,
    /// Rank p-value per observed cluster, parallel to `clusters`.
    pub p_values: Vec<f64>,
    /// Per-trial maximum tail-adjusted cluster mass (0 where a trial formed
    /// no clusters); length `n_permutations`.
    pub null_distribution: Vec<f64>,
}

/// Tail-adjusted score of a cluster mass, making the null comparison
/// one-sided for every tail: mass for `Right`, negated mass for `Left`,
/// magnitude for `TwoSided`.
fn tail_score(mass: f64, tail: Tail) -> f64 {
    match tail {
        Tail::Right => mass,
        Tail::Left => -mass,
        Tail::TwoSided => mass.abs(),
    }
}

/// One statistic → threshold → cluster pass. Returns the clusters; a
/// non-finite statistic anywhere is a hard failure (a silently skipped trial
/// would bias the null distribution).
fn cluster_pass(
    stat: &Array1<f64>,
    threshold: f64,
    tail: Tail,
    point_shape: &[usize],
    connectivity: &Connectivity<'_>,
    max_time_step: usize,
) -> ClusterResult<Vec<Cluster>> {
    let stat_slice = stat.as_slice().ok_or_else(|| {
        ClusterAnalysisError::NumericalError {
            reason: "statistic array is not contiguous".to_string(),
        }
    })?;
    validate_all_finite(stat_slice, "statistic")?;
    let mask = threshold_statistic(stat_slice, threshold, tail)?;
    find_clusters(stat_slice, &mask, point_shape, connectivity, max_time_step)
}

/// Shared engine: observed pass plus the permutation loop.
///
/// `trial_stat` computes the per-point statistic for one permutation trial
/// from its derived RNG; it must be pure in (data, RNG draws).
fn run_permutation_engine<T>(
    observed_stat: Array1<f64>,
    point_shape: Vec<usize>,
    threshold: f64,
    tail: Tail,
    connectivity: &Connectivity<'_>,
    max_time_step: usize,
    n_permutations: usize,
    base_seed: u64,
    trial_stat: T,
) -> ClusterResult<ClusterTestResult>
where
    T: Fn(&mut PermutationRng) -> ClusterResult<Array1<f64>> + Sync,
{
    let observed_clusters = cluster_pass(
        &observed_stat,
        threshold,
        tail,
        &point_shape,
        connectivity,
        max_time_step,
    )?;
    log::debug!(
        "observed pass: {} cluster(s) above threshold {}",
        observed_clusters.len(),
        threshold
    );

    let run_trial = |trial: usize| -> ClusterResult<f64> {
        let mut rng = PermutationRng::for_trial(base_seed, trial);
        let stat = trial_stat(&mut rng)?;
        let clusters = cluster_pass(
            &stat,
            threshold,
            tail,
            &point_shape,
            connectivity,
            max_time_step,
        )?;
        Ok(clusters
            .iter()
            .map(|c| tail_score(c.mass, tail))
            .fold(0.0, f64::max))
    };

    let null_distribution: Vec<f64> = {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            (0..n_permutations)
                .into_par_iter()
                .map(run_trial)
                .collect::<ClusterResult<Vec<f64>>>()?
        }
        #[cfg(not(feature = "parallel"))]
        {
            let mut null = Vec::with_capacity(n_permutations);
            for trial in 0..n_permutations {
                null.push(run_trial(trial)?);
            }
            null
        }
    };

    let n_f = n_permutations as f64;
    let p_values: Vec<f64> = observed_clusters
        .iter()
        .map(|c| {
            let score = tail_score(c.mass, tail);
            let exceed = null_distribution.iter().filter(|&&v| v >= score).count();
            (1.0 + exceed as f64) / (1.0 + n_f)
        })
        .collect();

    let cluster_masses: Vec<f64> = observed_clusters.iter().map(|c| c.mass).collect();
    let clusters = observed_clusters
        .into_iter()
        .map(|c| {
            ArrayD::from_shape_vec(IxDyn(&point_shape), c.mask).map_err(|_| {
                ClusterAnalysisError::ShapeMismatch {
                    context: "cluster mask reshape".to_string(),
                    expected: point_shape.iter().product(),
                    actual: 0,
                }
            })
        })
        .collect::<ClusterResult<Vec<ArrayD<bool>>>>()?;

    let statistic = observed_stat
        .into_shape(IxDyn(&point_shape))
        .map_err(|_| ClusterAnalysisError::ShapeMismatch {
            context: "statistic reshape".to_string(),
            expected: point_shape.iter().product(),
            actual: 0,
        })?;

    Ok(ClusterTestResult {
        statistic,
        clusters,
        cluster_masses,
        p_values,
        null_distribution,
    })
}

/// Resolve and validate the cluster-forming threshold before any trial runs.
fn resolve_threshold(
    configured: Option<f64>,
    default: Option<ClusterResult<f64>>,
    tail: Tail,
) -> ClusterResult<f64> {
    let threshold = match (configured, default) {
        (Some(value), _) => value,
        (None, Some(derived)) => derived?,
        (None, None) => {
            return Err(ClusterAnalysisError::InvalidParameter {
                parameter: "threshold".to_string(),
                value: f64::NAN,
                constraint: "required for a caller-supplied statistic".to_string(),
            })
        }
    };
    validate_threshold(threshold, tail)?;
    Ok(threshold)
}

/// Independent-samples cluster permutation test across K groups.
///
/// Each group is observations × measurement space (axis 0 = observations).
/// The stock statistic is the one-way F across groups, with the F critical
/// value at alpha = 0.05 as the default threshold. Each permutation pools
/// all observation rows and randomly re-partitions them into groups of the
/// original sizes.
///
/// Returns the observed statistic array, the observed cluster masks and
/// masses, their rank p-values, and the null max-mass distribution. When no
/// observed point crosses the threshold the cluster and p-value vectors are
/// empty — that outcome is not an error.
pub fn permutation_cluster_test(
    groups: &[ArrayD<f64>],
    connectivity: Option<&AdjacencyGraph>,
    config: &ClusterTestConfig,
) -> ClusterResult<ClusterTestResult> {
    let sizes: Vec<usize> = groups
        .iter()
        .map(|g| g.shape().first().copied().unwrap_or(0))
        .collect();
    let default = Some(default_f_threshold(&sizes, config.tail));
    permutation_cluster_test_impl(groups, connectivity, config, default, |views| {
        f_oneway(views)
    })
}

/// Independent-samples variant with a caller-supplied statistic function.
///
/// The statistic maps the flattened groups (observations × points each) to a
/// per-point statistic. An explicit `threshold` is required: no canonical
/// critical value exists for an arbitrary statistic family.
pub fn permutation_cluster_test_with<S>(
    groups: &[ArrayD<f64>],
    connectivity: Option<&AdjacencyGraph>,
    config: &ClusterTestConfig,
    stat_fn: S,
) -> ClusterResult<ClusterTestResult>
where
    S: Fn(&[ArrayView2<'_, f64>]) -> ClusterResult<Array1<f64>> + Sync,
{
    permutation_cluster_test_impl(groups, connectivity, config, None, stat_fn)
}

fn permutation_cluster_test_impl<S>(
    groups: &[ArrayD<f64>],
    connectivity: Option<&AdjacencyGraph>,
    config: &ClusterTestConfig,
    default_threshold: Option<ClusterResult<f64>>,
    stat_fn: S,
) -> ClusterResult<ClusterTestResult>
where
    S: Fn(&[ArrayView2<'_, f64>]) -> ClusterResult<Array1<f64>> + Sync,
{
    validate_permutation_count(config.n_permutations)?;
    if groups.len() < 2 {
        return Err(ClusterAnalysisError::InvalidParameter {
            parameter: "groups".to_string(),
            value: groups.len() as f64,
            constraint: "at least 2 groups".to_string(),
        });
    }
    let threshold = resolve_threshold(config.threshold, default_threshold, config.tail)?;

    // Flatten every group to observations x points and pool the rows.
    let mut flat_groups = Vec::with_capacity(groups.len());
    let mut point_shape: Option<Vec<usize>> = None;
    for g in groups {
        let (flat, shape) = flatten_observations(g)?;
        match &point_shape {
            None => point_shape = Some(shape),
            Some(expected) => {
                if *expected != shape {
                    return Err(ClusterAnalysisError::ShapeMismatch {
                        context: "group measurement-space shapes".to_string(),
                        expected: expected.iter().product(),
                        actual: shape.iter().product(),
                    });
                }
            }
        }
        if let Some(slice) = flat.as_slice() {
            validate_all_finite(slice, "observations")?;
        }
        flat_groups.push(flat);
    }
    let point_shape = point_shape.unwrap_or_default();
    let connectivity = Connectivity::from_option(connectivity);
    connectivity.validate_shape(&point_shape)?;

    let sizes: Vec<usize> = flat_groups.iter().map(|g| g.nrows()).collect();
    let n_total: usize = sizes.iter().sum();
    let n_points: usize = point_shape.iter().product();
    let mut pooled = Array2::zeros((n_total, n_points));
    let mut row = 0;
    for g in &flat_groups {
        pooled
            .slice_mut(ndarray::s![row..row + g.nrows(), ..])
            .assign(g);
        row += g.nrows();
    }

    let views: Vec<ArrayView2<'_, f64>> = flat_groups.iter().map(|g| g.view()).collect();
    let observed_stat = stat_fn(&views)?;
    if observed_stat.len() != n_points {
        return Err(ClusterAnalysisError::ShapeMismatch {
            context: "statistic function output".to_string(),
            expected: n_points,
            actual: observed_stat.len(),
        });
    }

    let base_seed = PermutationRng::resolve_base_seed(config.seed);
    log::debug!(
        "independent-samples cluster test: {} groups, {} observations, {} permutations",
        sizes.len(),
        n_total,
        config.n_permutations
    );

    run_permutation_engine(
        observed_stat,
        point_shape,
        threshold,
        config.tail,
        &connectivity,
        config.max_time_step,
        config.n_permutations,
        base_seed,
        |rng: &mut PermutationRng| {
            let mut indices: Vec<usize> = (0..n_total).collect();
            rng.shuffle(&mut indices);
            let mut permuted = Vec::with_capacity(sizes.len());
            let mut start = 0;
            for &size in &sizes {
                permuted.push(pooled.select(Axis(0), &indices[start..start + size]));
                start += size;
            }
            let views: Vec<ArrayView2<'_, f64>> = permuted.iter().map(|g| g.view()).collect();
            stat_fn(&views)
        },
    )
}

/// One-sample cluster permutation test (sign-flip scheme).
///
/// `x` is observations × measurement space; under the null each observation
/// is symmetric around zero, so each permutation flips the sign of every
/// observation row independently with probability 1/2. The stock statistic
/// is the one-sample t against zero, with the t critical value at
/// alpha = 0.05 as the default threshold.
pub fn permutation_cluster_1samp_test(
    x: &ArrayD<f64>,
    connectivity: Option<&AdjacencyGraph>,
    config: &ClusterTestConfig,
) -> ClusterResult<ClusterTestResult> {
    let n_obs = x.shape().first().copied().unwrap_or(0);
    let default = Some(default_t_threshold(n_obs, config.tail));
    permutation_cluster_1samp_impl(x, connectivity, config, default, |view| one_sample_t(view))
}

/// One-sample variant with a caller-supplied statistic function.
///
/// The statistic maps the flattened observations (observations × points) to
/// a per-point statistic; an explicit `threshold` is required.
pub fn permutation_cluster_1samp_test_with<S>(
    x: &ArrayD<f64>,
    connectivity: Option<&AdjacencyGraph>,
    config: &ClusterTestConfig,
    stat_fn: S,
) -> ClusterResult<ClusterTestResult>
where
    S: Fn(&ArrayView2<'_, f64>) -> ClusterResult<Array1<f64>> + Sync,
{
    permutation_cluster_1samp_impl(x, connectivity, config, None, stat_fn)
}

fn permutation_cluster_1samp_impl<S>(
    x: &ArrayD<f64>,
    connectivity: Option<&AdjacencyGraph>,
    config: &ClusterTestConfig,
    default_threshold: Option<ClusterResult<f64>>,
    stat_fn: S,
) -> ClusterResult<ClusterTestResult>
where
    S: Fn(&ArrayView2<'_, f64>) -> ClusterResult<Array1<f64>> + Sync,
{
    validate_permutation_count(config.n_permutations)?;
    let threshold = resolve_threshold(config.threshold, default_threshold, config.tail)?;

    let (flat, point_shape) = flatten_observations(x)?;
    if let Some(slice) = flat.as_slice() {
        validate_all_finite(slice, "observations")?;
    }
    let connectivity = Connectivity::from_option(connectivity);
    connectivity.validate_shape(&point_shape)?;

    let n_obs = flat.nrows();
    let n_points: usize = point_shape.iter().product();
    let observed_stat = stat_fn(&flat.view())?;
    if observed_stat.len() != n_points {
        return Err(ClusterAnalysisError::ShapeMismatch {
            context: "statistic function output".to_string(),
            expected: n_points,
            actual: observed_stat.len(),
        });
    }

    let base_seed = PermutationRng::resolve_base_seed(config.seed);
    log::debug!(
        "one-sample cluster test: {} observations, {} points, {} permutations",
        n_obs,
        n_points,
        config.n_permutations
    );

    run_permutation_engine(
        observed_stat,
        point_shape,
        threshold,
        config.tail,
        &connectivity,
        config.max_time_step,
        config.n_permutations,
        base_seed,
        |rng: &mut PermutationRng| {
            let signs = rng.draw_signs(n_obs);
            let mut flipped = flat.clone();
            for (i, mut row) in flipped.axis_iter_mut(Axis(0)).enumerate() {
                if signs[i] < 0.0 {
                    row.mapv_inplace(|v| -v);
                }
            }
            stat_fn(&flipped.view())
        },
    )
}

/// Spatio-temporal convenience entry point for the one-sample test.
///
/// Accepts data already shaped observations × space × time and runs the same
/// engine; the spatial connectivity graph (when given) must cover the space
/// axis, and `max_time_step` bounds temporal adjacency as in
/// [`ClusterTestConfig`]. Purely a layout adapter — with `connectivity`
/// absent the point lattice of the space × time plane applies.
pub fn spatio_temporal_cluster_1samp_test(
    x: &Array3<f64>,
    connectivity: Option<&AdjacencyGraph>,
    config: &ClusterTestConfig,
) -> ClusterResult<ClusterTestResult> {
    let dyn_x = x.to_owned().into_dyn();
    permutation_cluster_1samp_test(&dyn_x, connectivity, config)
}
