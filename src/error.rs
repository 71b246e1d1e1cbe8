//! # Errors
//!
//! Error taxonomy shared by the risk, optimization and backtest layers.

use thiserror::Error;

use crate::optimization::Strategy;

/// Main error type of the crate.
#[derive(Error, Debug)]
pub enum VarToolsError {
  #[error("Invalid parameter: {0}")]
  InvalidParameter(String),

  #[error("Insufficient data: {0}")]
  InsufficientData(String),

  #[error("Numerical degeneracy: {0}")]
  NumericalDegeneracy(String),

  #[error("{strategy} optimization did not converge: {reason}")]
  OptimizationNonConvergence { strategy: Strategy, reason: String },

  #[error("Solver error: {0}")]
  Solver(#[from] argmin::core::Error),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("TOML parsing error: {0}")]
  Toml(#[from] toml::de::Error),
}

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, VarToolsError>;

/// Fail fast unless `value` lies strictly inside (0, 100).
pub fn validate_confidence(value: f64, name: &str) -> Result<()> {
  if value > 0.0 && value < 100.0 {
    Ok(())
  } else {
    Err(VarToolsError::InvalidParameter(format!(
      "{name} must be between 0 and 100 (exclusive), got {value}"
    )))
  }
}

pub(crate) fn validate_same_length(expected: usize, actual: usize, what: &str) -> Result<()> {
  if expected == actual {
    Ok(())
  } else {
    Err(VarToolsError::InvalidParameter(format!(
      "{what} has length {actual}, expected {expected}"
    )))
  }
}
