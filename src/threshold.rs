//! Thresholding of a statistic array into a signed active mask.
//!
//! The mask carries one `i8` per point: `+1` for a positive excursion,
//! `-1` for a negative excursion, `0` for inactive. Keeping the sign in the
//! mask is what prevents the cluster finder from merging positive and
//! negative excursions in a two-sided test.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{ClusterAnalysisError, ClusterResult};

/// Direction of the statistical test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Tail {
    /// One-sided test against small values: active where `stat < threshold`.
    Left,
    /// Two-sided test: active where `|stat| > threshold` (positive magnitude).
    TwoSided,
    /// One-sided test against large values: active where `stat > threshold`.
    Right,
}

impl Tail {
    /// Convert from the conventional integer encoding {-1, 0, 1}.
    pub fn from_i32(tail: i32) -> ClusterResult<Self> {
        match tail {
            -1 => Ok(Tail::Left),
            0 => Ok(Tail::TwoSided),
            1 => Ok(Tail::Right),
            other => Err(ClusterAnalysisError::InvalidParameter {
                parameter: "tail".to_string(),
                value: other as f64,
                constraint: "one of {-1, 0, 1}".to_string(),
            }),
        }
    }

    /// The conventional integer encoding of this tail.
    pub fn as_i32(self) -> i32 {
        match self {
            Tail::Left => -1,
            Tail::TwoSided => 0,
            Tail::Right => 1,
        }
    }
}

/// Validate a (tail, threshold) combination before any trial runs.
///
/// A two-sided test needs a positive threshold magnitude; without one the
/// active sets of the two signs would overlap or cover everything.
pub fn validate_threshold(threshold: f64, tail: Tail) -> ClusterResult<()> {
    if !threshold.is_finite() {
        return Err(ClusterAnalysisError::InvalidParameter {
            parameter: "threshold".to_string(),
            value: threshold,
            constraint: "must be finite".to_string(),
        });
    }
    if tail == Tail::TwoSided && threshold <= 0.0 {
        return Err(ClusterAnalysisError::InvalidParameter {
            parameter: "threshold".to_string(),
            value: threshold,
            constraint: "must be a positive magnitude for a two-sided test".to_string(),
        });
    }
    Ok(())
}

/// Threshold a flat statistic array into a signed active mask.
///
/// - `Tail::Right`: active (`+1`) where `stat > threshold`.
/// - `Tail::Left`: active (`-1`) where `stat < threshold` (threshold is
///   expected to be negative).
/// - `Tail::TwoSided`: active where `stat > threshold` (`+1`) or
///   `stat < -threshold` (`-1`).
pub fn threshold_statistic(stat: &[f64], threshold: f64, tail: Tail) -> ClusterResult<Vec<i8>> {
    validate_threshold(threshold, tail)?;
    let mask = match tail {
        Tail::Right => stat
            .iter()
            .map(|&v| if v > threshold { 1 } else { 0 })
            .collect(),
        Tail::Left => stat
            .iter()
            .map(|&v| if v < threshold { -1 } else { 0 })
            .collect(),
        Tail::TwoSided => stat
            .iter()
            .map(|&v| {
                if v > threshold {
                    1
                } else if v < -threshold {
                    -1
                } else {
                    0
                }
            })
            .collect(),
    };
    Ok(mask)
}
