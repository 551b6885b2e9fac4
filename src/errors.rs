//! Error types and validation functions for cluster-level permutation testing.
//!
//! All configuration problems are detected eagerly, before any permutation
//! trial runs, so a misconfigured call never wastes a partial computation.

use thiserror::Error;

/// Error types for cluster permutation analysis.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum ClusterAnalysisError {
    /// Invalid configuration parameter (tail, threshold, permutation count, ...).
    #[error("Invalid parameter: {parameter} = {value}, expected {constraint}")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value provided
        value: f64,
        /// Valid range or constraint description
        constraint: String,
    },

    /// Connectivity or group shapes are incompatible with the data.
    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Operation or structure being validated
        context: String,
        /// Expected extent
        expected: usize,
        /// Actual extent
        actual: usize,
    },

    /// Too few observations for the requested statistic.
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData {
        /// Minimum required observations
        required: usize,
        /// Actual number of observations provided
        actual: usize,
    },

    /// Numerical computation produced a non-finite or degenerate value.
    #[error("Numerical computation failed: {reason}")]
    NumericalError {
        /// Detailed reason for the failure
        reason: String,
    },
}

/// Result type for cluster permutation operations.
pub type ClusterResult<T> = Result<T, ClusterAnalysisError>;

/// Validates that a group carries enough observation rows.
///
/// # Example
/// ```rust
/// use cluster_stats::errors::validate_n_observations;
///
/// assert!(validate_n_observations(10, 2).is_ok());
/// assert!(validate_n_observations(1, 2).is_err());
/// ```
pub fn validate_n_observations(actual: usize, min_required: usize) -> ClusterResult<()> {
    if actual < min_required {
        Err(ClusterAnalysisError::InsufficientData {
            required: min_required,
            actual,
        })
    } else {
        Ok(())
    }
}

/// Validates that every value in a statistic or data slice is finite.
///
/// NaN and infinite values would silently corrupt cluster masses and the
/// permutation null, so any non-finite value is a hard failure.
///
/// # Example
/// ```rust
/// use cluster_stats::errors::validate_all_finite;
///
/// assert!(validate_all_finite(&[1.0, -2.0, 0.0], "stat").is_ok());
/// assert!(validate_all_finite(&[1.0, f64::NAN], "stat").is_err());
/// ```
pub fn validate_all_finite(data: &[f64], name: &str) -> ClusterResult<()> {
    if let Some((i, &value)) = data.iter().enumerate().find(|(_, &v)| !v.is_finite()) {
        let value_desc = if value.is_nan() {
            "NaN".to_string()
        } else if value.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        };
        return Err(ClusterAnalysisError::NumericalError {
            reason: format!(
                "{} contains non-finite value at index {}: {}",
                name, i, value_desc
            ),
        });
    }
    Ok(())
}

/// Validates the permutation count of a test configuration.
pub fn validate_permutation_count(n_permutations: usize) -> ClusterResult<()> {
    if n_permutations == 0 {
        return Err(ClusterAnalysisError::InvalidParameter {
            parameter: "n_permutations".to_string(),
            value: 0.0,
            constraint: "must be greater than 0".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_n_observations_sufficient() {
        assert!(validate_n_observations(5, 3).is_ok());
        assert!(validate_n_observations(3, 3).is_ok());
    }

    #[test]
    fn test_validate_n_observations_insufficient() {
        match validate_n_observations(1, 2) {
            Err(ClusterAnalysisError::InsufficientData { required, actual }) => {
                assert_eq!(required, 2);
                assert_eq!(actual, 1);
            }
            _ => panic!("Expected InsufficientData error"),
        }
    }

    #[test]
    fn test_validate_all_finite_valid() {
        let good = vec![1.0, -2.5, 0.0, 1e-12, 1e12];
        assert!(validate_all_finite(&good, "stat").is_ok());
        assert!(validate_all_finite(&[], "stat").is_ok());
    }

    #[test]
    fn test_validate_all_finite_nan_reports_index() {
        let bad = vec![1.0, 2.0, f64::NAN, 4.0];
        match validate_all_finite(&bad, "t_values") {
            Err(ClusterAnalysisError::NumericalError { reason }) => {
                assert!(reason.contains("t_values"));
                assert!(reason.contains("index 2"));
                assert!(reason.contains("NaN"));
            }
            _ => panic!("Expected NumericalError for NaN"),
        }
    }

    #[test]
    fn test_validate_all_finite_infinity() {
        let bad = vec![1.0, f64::NEG_INFINITY];
        match validate_all_finite(&bad, "stat") {
            Err(ClusterAnalysisError::NumericalError { reason }) => {
                assert!(reason.contains("-Infinity"));
            }
            _ => panic!("Expected NumericalError for -Infinity"),
        }
    }

    #[test]
    fn test_validate_permutation_count() {
        assert!(validate_permutation_count(1).is_ok());
        assert!(validate_permutation_count(500).is_ok());
        assert!(matches!(
            validate_permutation_count(0),
            Err(ClusterAnalysisError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_error_display_formatting() {
        let err = ClusterAnalysisError::ShapeMismatch {
            context: "connectivity".to_string(),
            expected: 350,
            actual: 700,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("connectivity"));
        assert!(msg.contains("350"));
        assert!(msg.contains("700"));

        let err = ClusterAnalysisError::InvalidParameter {
            parameter: "tail".to_string(),
            value: 2.0,
            constraint: "one of {-1, 0, 1}".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("tail"));
        assert!(msg.contains("{-1, 0, 1}"));
    }
}
