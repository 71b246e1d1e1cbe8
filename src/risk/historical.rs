//! # Historical VaR / CVaR
//!
//! $$
//! q = \begin{cases} Q_{100-c}(R_p) & \text{long} \\ Q_{c}(R_p) & \text{short} \end{cases}
//! $$
//!
//! Empirical tail estimates of a weighted return stream.

use crate::data::stats::masked_mean;
use crate::data::stats::percentile;
use crate::data::ReturnMatrix;
use crate::error::validate_confidence;
use crate::error::Result;

/// Direction of the exposure, selects which tail is the loss tail.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Position {
  #[default]
  Long,
  Short,
}

impl Position {
  /// Percentile (in percent) that marks the VaR boundary.
  pub fn var_percentile(self, confidence: f64) -> f64 {
    match self {
      Position::Long => 100.0 - confidence,
      Position::Short => confidence,
    }
  }

  /// Whether `r` lies strictly beyond `threshold` on the loss side.
  #[inline]
  pub fn is_beyond(self, r: f64, threshold: f64) -> bool {
    match self {
      Position::Long => r < threshold,
      Position::Short => r > threshold,
    }
  }
}

/// Signed VaR threshold and signed tail mean of a return stream.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Tail {
  pub threshold: f64,
  pub mean: f64,
}

impl Tail {
  pub(crate) fn estimate(returns: &[f64], confidence: f64, position: Position) -> Self {
    let threshold = percentile(returns, position.var_percentile(confidence));
    let mask: Vec<bool> = returns
      .iter()
      .map(|&r| position.is_beyond(r, threshold))
      .collect();
    // nothing strictly beyond the boundary: the tail collapses onto it
    let mean = masked_mean(returns, &mask).unwrap_or(threshold);

    Self { threshold, mean }
  }

  pub(crate) fn var(&self) -> f64 {
    self.threshold.abs()
  }

  pub(crate) fn cvar(&self) -> f64 {
    self.mean.abs()
  }
}

fn portfolio_tail(
  returns: &ReturnMatrix,
  weights: &[f64],
  confidence: f64,
  position: Position,
) -> Result<Tail> {
  validate_confidence(confidence, "confidence")?;
  let portfolio = returns.portfolio_returns(weights)?.to_vec();
  Ok(Tail::estimate(&portfolio, confidence, position))
}

/// Historical VaR of `returns · weights` as a non-negative magnitude.
pub fn historical_var(
  returns: &ReturnMatrix,
  weights: &[f64],
  confidence: f64,
  position: Position,
) -> Result<f64> {
  portfolio_tail(returns, weights, confidence, position).map(|tail| tail.var())
}

/// Mean portfolio return strictly beyond the VaR threshold, as a magnitude.
///
/// Falls back to the VaR magnitude when no observation lies beyond the threshold.
pub fn historical_cvar(
  returns: &ReturnMatrix,
  weights: &[f64],
  confidence: f64,
  position: Position,
) -> Result<f64> {
  portfolio_tail(returns, weights, confidence, position).map(|tail| tail.cvar())
}
