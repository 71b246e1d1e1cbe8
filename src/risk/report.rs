//! # Risk Report
//!
//! $$
//! \mathrm{cash}_m = \mathrm{pct}_m \cdot V,\qquad V = \textstyle\sum_i s_i P_i
//! $$
//!
//! Row-labelled table of VaR and CVaR magnitudes, each given as a fraction of the
//! book's value and in cash, with optional liquidity-adjusted rows.

use std::fmt::Display;

use impl_new_derive::ImplNew;

/// Row label of a [`RiskReport`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RiskMeasure {
  Var,
  /// VaR net of the average bid/ask spread cost.
  VarAverageLiquidity,
  /// VaR net of the 99th-percentile (stressed) spread cost.
  VarStressedLiquidity,
  Cvar,
  CvarAverageLiquidity,
  CvarStressedLiquidity,
}

impl Display for RiskMeasure {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let label = match self {
      RiskMeasure::Var => "VaR",
      RiskMeasure::VarAverageLiquidity => "VaR avg-liquidity adjusted",
      RiskMeasure::VarStressedLiquidity => "VaR stressed-liquidity adjusted",
      RiskMeasure::Cvar => "CVaR",
      RiskMeasure::CvarAverageLiquidity => "CVaR avg-liquidity adjusted",
      RiskMeasure::CvarStressedLiquidity => "CVaR stressed-liquidity adjusted",
    };
    f.write_str(label)
  }
}

/// One measure as a fraction of portfolio value and in cash.
#[derive(ImplNew, Clone, Copy, Debug, PartialEq)]
pub struct RiskRow {
  pub measure: RiskMeasure,
  pub pct: f64,
  pub cash: f64,
}

/// Small table of tail-risk magnitudes, all non-negative.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RiskReport {
  pub rows: Vec<RiskRow>,
}

impl RiskReport {
  pub fn get(&self, measure: RiskMeasure) -> Option<&RiskRow> {
    self.rows.iter().find(|row| row.measure == measure)
  }

  pub fn pct(&self, measure: RiskMeasure) -> Option<f64> {
    self.get(measure).map(|row| row.pct)
  }

  pub fn cash(&self, measure: RiskMeasure) -> Option<f64> {
    self.get(measure).map(|row| row.cash)
  }
}

impl Display for RiskReport {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    writeln!(f, "{:<34} {:>12} {:>16}", "measure", "pct", "cash")?;
    for row in &self.rows {
      writeln!(
        f,
        "{:<34} {:>12.6} {:>16.2}",
        row.measure.to_string(),
        row.pct,
        row.cash
      )?;
    }
    Ok(())
  }
}
