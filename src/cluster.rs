//! Connected-component cluster formation over a thresholded statistic.
//!
//! Clusters are maximal connected sets of active points under three rules:
//! sign consistency (positive and negative excursions never merge), spatial
//! adjacency (index lattice or explicit graph), and — for spatio-temporal
//! data with a graph — a bounded temporal step. Discovery is a deterministic
//! row-major scan with breadth-first growth, so identical input always yields
//! the identical cluster list. Each cluster's mass (sum of statistic values
//! over its members) is accumulated during labeling.

use std::collections::VecDeque;

use crate::connectivity::Connectivity;
use crate::errors::{ClusterAnalysisError, ClusterResult};

/// A single cluster: flat membership mask plus its mass.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Membership over the flattened statistic array.
    pub mask: Vec<bool>,
    /// Sum of statistic values over the member points.
    pub mass: f64,
}

/// Partition the active points of a signed mask into clusters.
///
/// `stat` and `mask` are flat, row-major views of a statistic array with
/// shape `point_shape`. With `Connectivity::Lattice` any rank is accepted
/// and adjacency is ±1 along each axis. With `Connectivity::Graph` the
/// shape must be `[space]` or `[space, time]`; two points `(s, t)` and
/// `(s', t')` are adjacent iff (`s == s'` or the graph joins `s` and `s'`)
/// and `|t - t'| <= max_time_step`. `max_time_step == 0` therefore clusters
/// each time slice independently.
///
/// The returned clusters exactly partition the active set: every active
/// point belongs to exactly one cluster and masks are pairwise disjoint.
pub fn find_clusters(
    stat: &[f64],
    mask: &[i8],
    point_shape: &[usize],
    connectivity: &Connectivity<'_>,
    max_time_step: usize,
) -> ClusterResult<Vec<Cluster>> {
    let n_points: usize = point_shape.iter().product();
    if stat.len() != n_points || mask.len() != n_points {
        return Err(ClusterAnalysisError::ShapeMismatch {
            context: "statistic length vs point shape".to_string(),
            expected: n_points,
            actual: stat.len(),
        });
    }
    connectivity.validate_shape(point_shape)?;

    let mut clusters = Vec::new();
    let mut visited = vec![false; n_points];
    let mut queue = VecDeque::new();
    let mut neighbor_buf = Vec::new();

    for seed in 0..n_points {
        if mask[seed] == 0 || visited[seed] {
            continue;
        }
        let sign = mask[seed];
        let mut member_mask = vec![false; n_points];
        let mut mass = 0.0;

        visited[seed] = true;
        queue.push_back(seed);
        while let Some(point) = queue.pop_front() {
            member_mask[point] = true;
            mass += stat[point];

            neighbor_buf.clear();
            match connectivity {
                Connectivity::Lattice => {
                    lattice_neighbors(point, point_shape, &mut neighbor_buf)
                }
                Connectivity::Graph(graph) => {
                    let n_time = if point_shape.len() == 2 {
                        point_shape[1]
                    } else {
                        1
                    };
                    graph_neighbors(point, graph, n_time, max_time_step, &mut neighbor_buf)
                }
            }
            for &next in &neighbor_buf {
                if !visited[next] && mask[next] == sign {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }

        clusters.push(Cluster {
            mask: member_mask,
            mass,
        });
    }
    Ok(clusters)
}

/// Neighbors of `point` on the row-major index lattice of `shape` (±1 along
/// each axis).
fn lattice_neighbors(point: usize, shape: &[usize], out: &mut Vec<usize>) {
    let mut stride = 1;
    // Walk axes from the innermost outward; stride grows by each extent.
    for axis in (0..shape.len()).rev() {
        let extent = shape[axis];
        let index = (point / stride) % extent;
        if index > 0 {
            out.push(point - stride);
        }
        if index + 1 < extent {
            out.push(point + stride);
        }
        stride *= extent;
    }
}

/// Neighbors of `point` under graph connectivity with a bounded temporal
/// step. Flat layout is `s * n_time + t`.
fn graph_neighbors(
    point: usize,
    graph: &crate::connectivity::AdjacencyGraph,
    n_time: usize,
    max_time_step: usize,
    out: &mut Vec<usize>,
) {
    let s = point / n_time;
    let t = point % n_time;

    let t_lo = t.saturating_sub(max_time_step);
    let t_hi = (t + max_time_step).min(n_time - 1);

    // Same spatial node, nearby time slices.
    for t2 in t_lo..=t_hi {
        if t2 != t {
            out.push(s * n_time + t2);
        }
    }
    // Spatial neighbors, same or nearby time slices.
    for &s2 in graph.neighbors(s) {
        for t2 in t_lo..=t_hi {
            out.push(s2 * n_time + t2);
        }
    }
}
