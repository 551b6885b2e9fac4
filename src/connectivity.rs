//! Spatial adjacency for cluster formation.
//!
//! Connectivity over the spatial axis is optional. When absent, the cluster
//! finder falls back to the natural index lattice of the statistic array
//! (neighbors at ±1 along each axis). When present, it is a symmetric
//! adjacency-list graph supplied once by the caller and shared read-only by
//! every permutation trial.

use crate::errors::{ClusterAnalysisError, ClusterResult};

/// Symmetric adjacency graph over spatial locations.
///
/// Self-loops are dropped on construction; edges are stored in both
/// directions.
#[derive(Debug, Clone)]
pub struct AdjacencyGraph {
    neighbors: Vec<Vec<usize>>,
}

impl AdjacencyGraph {
    /// Build a graph over `n_nodes` locations from an undirected edge list.
    ///
    /// Duplicate edges are deduplicated; node indices out of range fail.
    pub fn from_edges(n_nodes: usize, edges: &[(usize, usize)]) -> ClusterResult<Self> {
        let mut neighbors = vec![Vec::new(); n_nodes];
        for &(a, b) in edges {
            let hi = a.max(b);
            if hi >= n_nodes {
                return Err(ClusterAnalysisError::ShapeMismatch {
                    context: "adjacency edge node index".to_string(),
                    expected: n_nodes,
                    actual: hi + 1,
                });
            }
            if a == b {
                continue;
            }
            neighbors[a].push(b);
            neighbors[b].push(a);
        }
        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }
        Ok(Self { neighbors })
    }

    /// 1-D chain graph: node `i` adjacent to `i - 1` and `i + 1`.
    ///
    /// Equivalent to the default lattice adjacency on a 1-D statistic array,
    /// which makes it the reference graph for equivalence checks.
    pub fn chain(n_nodes: usize) -> Self {
        let edges: Vec<(usize, usize)> = (1..n_nodes).map(|i| (i - 1, i)).collect();
        // Cannot fail: all indices are in range by construction.
        Self::from_edges(n_nodes, &edges).unwrap_or(Self {
            neighbors: vec![Vec::new(); n_nodes],
        })
    }

    /// Block-diagonal union of two graphs: nodes of `other` are re-indexed
    /// after the nodes of `self`, with no edges between the blocks.
    pub fn block_diag(&self, other: &AdjacencyGraph) -> AdjacencyGraph {
        let offset = self.n_nodes();
        let mut neighbors = self.neighbors.clone();
        neighbors.extend(
            other
                .neighbors
                .iter()
                .map(|list| list.iter().map(|&n| n + offset).collect::<Vec<usize>>()),
        );
        AdjacencyGraph { neighbors }
    }

    /// Number of spatial locations covered by the graph.
    pub fn n_nodes(&self) -> usize {
        self.neighbors.len()
    }

    /// Neighbors of a node.
    pub fn neighbors(&self, node: usize) -> &[usize] {
        &self.neighbors[node]
    }
}

/// Adjacency rule consumed by the cluster finder.
#[derive(Debug, Clone)]
pub enum Connectivity<'a> {
    /// Natural index-lattice adjacency of the statistic array (±1 per axis).
    Lattice,
    /// Explicit graph over the spatial axis.
    Graph(&'a AdjacencyGraph),
}

impl<'a> Connectivity<'a> {
    /// Wrap an optional graph the way callers typically hold one.
    pub fn from_option(graph: Option<&'a AdjacencyGraph>) -> Self {
        match graph {
            Some(g) => Connectivity::Graph(g),
            None => Connectivity::Lattice,
        }
    }

    /// Check the graph (if any) against the statistic array shape.
    ///
    /// A graph requires a 1-D (space) or 2-D (space × time) statistic array
    /// whose spatial extent matches the node count; time is the trailing
    /// axis. Lattice adjacency accepts any rank.
    pub fn validate_shape(&self, point_shape: &[usize]) -> ClusterResult<()> {
        match self {
            Connectivity::Lattice => Ok(()),
            Connectivity::Graph(g) => {
                if point_shape.is_empty() || point_shape.len() > 2 {
                    return Err(ClusterAnalysisError::ShapeMismatch {
                        context: "statistic rank with graph connectivity".to_string(),
                        expected: 2,
                        actual: point_shape.len(),
                    });
                }
                let n_space = point_shape[0];
                if n_space != g.n_nodes() {
                    return Err(ClusterAnalysisError::ShapeMismatch {
                        context: "connectivity spatial extent".to_string(),
                        expected: g.n_nodes(),
                        actual: n_space,
                    });
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_edges_symmetric_dedup() {
        let g = AdjacencyGraph::from_edges(4, &[(0, 1), (1, 0), (1, 2), (3, 3)]).unwrap();
        assert_eq!(g.neighbors(0), &[1]);
        assert_eq!(g.neighbors(1), &[0, 2]);
        assert_eq!(g.neighbors(2), &[1]);
        // Self-loop dropped.
        assert!(g.neighbors(3).is_empty());
    }

    #[test]
    fn test_from_edges_out_of_range() {
        assert!(matches!(
            AdjacencyGraph::from_edges(3, &[(0, 5)]),
            Err(ClusterAnalysisError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_chain_structure() {
        let g = AdjacencyGraph::chain(5);
        assert_eq!(g.n_nodes(), 5);
        assert_eq!(g.neighbors(0), &[1]);
        assert_eq!(g.neighbors(2), &[1, 3]);
        assert_eq!(g.neighbors(4), &[3]);

        let empty = AdjacencyGraph::chain(0);
        assert_eq!(empty.n_nodes(), 0);
    }

    #[test]
    fn test_block_diag_no_cross_edges() {
        let g = AdjacencyGraph::chain(3);
        let d = g.block_diag(&g);
        assert_eq!(d.n_nodes(), 6);
        assert_eq!(d.neighbors(2), &[1]);
        assert_eq!(d.neighbors(3), &[4]);
        // No edge from node 2 (end of first block) to node 3 (start of second).
        assert!(!d.neighbors(2).contains(&3));
    }

    #[test]
    fn test_validate_shape() {
        let g = AdjacencyGraph::chain(10);
        let conn = Connectivity::Graph(&g);
        assert!(conn.validate_shape(&[10]).is_ok());
        assert!(conn.validate_shape(&[10, 4]).is_ok());
        assert!(conn.validate_shape(&[9]).is_err());
        assert!(conn.validate_shape(&[10, 4, 2]).is_err());
        assert!(Connectivity::Lattice.validate_shape(&[3, 4, 5]).is_ok());
    }

    #[test]
    fn test_from_option() {
        let g = AdjacencyGraph::chain(3);
        assert!(matches!(
            Connectivity::from_option(Some(&g)),
            Connectivity::Graph(_)
        ));
        assert!(matches!(
            Connectivity::from_option(None),
            Connectivity::Lattice
        ));
    }
}
