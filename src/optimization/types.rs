//! # Optimization Types
//!
//! $$
//! \mathbf w \in \{\, l \le w_i \le u,\ \textstyle\sum_i w_i = 1 \,\}
//! $$
//!
//! Strategy catalogue, solver outcomes and the asset-by-strategy weight table.

use std::fmt::Display;

use ndarray::Array2;
use ndarray::ArrayView1;

use crate::error::validate_same_length;
use crate::error::Result;
use crate::error::VarToolsError;

/// The six allocation objectives, in reporting order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strategy {
  /// `wᵀCw`
  MinVariance,
  /// Annualized Sharpe ratio.
  MaxSharpe,
  /// Benchmark-relative target semivariance.
  MinSemivariance,
  /// Benchmark-relative Omega ratio.
  MaxOmega,
  /// Mean of the left tail at or below VaR.
  MinCvar,
  /// Largest single-asset CVaR contribution.
  MinCvarContribution,
}

impl Strategy {
  pub const ALL: [Strategy; 6] = [
    Strategy::MinVariance,
    Strategy::MaxSharpe,
    Strategy::MinSemivariance,
    Strategy::MaxOmega,
    Strategy::MinCvar,
    Strategy::MinCvarContribution,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Strategy::MinVariance => "Min Variance",
      Strategy::MaxSharpe => "Sharpe",
      Strategy::MinSemivariance => "Semivariance",
      Strategy::MaxOmega => "Omega",
      Strategy::MinCvar => "Min CVaR",
      Strategy::MinCvarContribution => "MCC",
    }
  }

  /// Per-asset box `(lower, upper)`.
  pub fn bounds(self) -> (f64, f64) {
    match self {
      Strategy::MaxSharpe => (0.0, f64::INFINITY),
      Strategy::MinSemivariance | Strategy::MaxOmega => (0.0, 3.0),
      _ => (0.0, 1.0),
    }
  }

  /// Whether the objective is measured against a benchmark return series.
  pub fn needs_benchmark(self) -> bool {
    matches!(self, Strategy::MinSemivariance | Strategy::MaxOmega)
  }

  /// Whether the objective takes a CVaR confidence level.
  pub fn needs_confidence(self) -> bool {
    matches!(self, Strategy::MinCvar | Strategy::MinCvarContribution)
  }

  /// Position in [`Strategy::ALL`].
  pub fn index(self) -> usize {
    self as usize
  }
}

impl Display for Strategy {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.name())
  }
}

/// How a solver run ended.
#[derive(Clone, Debug, PartialEq)]
pub enum ConvergenceStatus {
  Converged,
  /// Iteration budget exhausted; the best iterate is still returned.
  MaxIterations,
  /// The line search could not make progress.
  Stalled(String),
}

impl Display for ConvergenceStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ConvergenceStatus::Converged => f.write_str("converged"),
      ConvergenceStatus::MaxIterations => f.write_str("iteration budget exhausted"),
      ConvergenceStatus::Stalled(reason) => write!(f, "stalled: {reason}"),
    }
  }
}

/// Best-effort weights of one strategy on one window.
#[derive(Clone, Debug, PartialEq)]
pub struct OptimizationOutcome {
  pub strategy: Strategy,
  pub weights: Vec<f64>,
  /// Objective value at `weights` (minimized form).
  pub objective: f64,
  pub iterations: u64,
  pub status: ConvergenceStatus,
}

impl OptimizationOutcome {
  pub fn is_converged(&self) -> bool {
    self.status == ConvergenceStatus::Converged
  }

  /// Turn a best-effort result into an error unless the solver converged.
  pub fn require_converged(self) -> Result<Self> {
    if self.is_converged() {
      Ok(self)
    } else {
      Err(VarToolsError::OptimizationNonConvergence {
        strategy: self.strategy,
        reason: self.status.to_string(),
      })
    }
  }

  /// Check the sum-to-one and box constraints within `tol`.
  pub fn check_feasible(&self, tol: f64) -> Result<()> {
    let (lo, hi) = self.strategy.bounds();
    let total: f64 = self.weights.iter().sum();
    if !((total - 1.0).abs() < tol) {
      return Err(VarToolsError::NumericalDegeneracy(format!(
        "{} weights sum to {total}",
        self.strategy
      )));
    }
    if let Some((i, w)) = self
      .weights
      .iter()
      .enumerate()
      .find(|(_, w)| !(**w >= lo - tol && **w <= hi + tol))
    {
      return Err(VarToolsError::NumericalDegeneracy(format!(
        "{} weight {i} = {w} outside [{lo}, {hi}]",
        self.strategy
      )));
    }
    Ok(())
  }
}

/// One row per asset, one column per strategy.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightTable {
  tickers: Vec<String>,
  strategies: Vec<Strategy>,
  values: Array2<f64>,
}

impl WeightTable {
  pub fn new(tickers: Vec<String>, columns: Vec<(Strategy, Vec<f64>)>) -> Result<Self> {
    let mut values = Array2::<f64>::zeros((tickers.len(), columns.len()));
    let mut strategies = Vec::with_capacity(columns.len());

    for (j, (strategy, weights)) in columns.into_iter().enumerate() {
      validate_same_length(tickers.len(), weights.len(), &format!("{strategy} weights"))?;
      for (i, w) in weights.into_iter().enumerate() {
        values[[i, j]] = w;
      }
      strategies.push(strategy);
    }

    Ok(Self {
      tickers,
      strategies,
      values,
    })
  }

  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  pub fn strategies(&self) -> &[Strategy] {
    &self.strategies
  }

  pub fn values(&self) -> &Array2<f64> {
    &self.values
  }

  pub fn weights(&self, strategy: Strategy) -> Option<ArrayView1<'_, f64>> {
    self
      .strategies
      .iter()
      .position(|&s| s == strategy)
      .map(|j| self.values.column(j))
  }
}

impl Display for WeightTable {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{:<10}", "")?;
    for strategy in &self.strategies {
      write!(f, " {:>13}", strategy.name())?;
    }
    writeln!(f)?;
    for (ticker, row) in self.tickers.iter().zip(self.values.outer_iter()) {
      write!(f, "{ticker:<10}")?;
      for w in row.iter() {
        write!(f, " {w:>13.6}")?;
      }
      writeln!(f)?;
    }
    Ok(())
  }
}
