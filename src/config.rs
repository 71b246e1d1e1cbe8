//! # Configuration
//!
//! Solver and backtest settings, loadable from TOML for reproducible runs.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use tracing::info;

use crate::error::validate_confidence;
use crate::error::Result;
use crate::error::VarToolsError;

/// Trading days per year used to annualize and size rebalancing windows.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Stopping rules of the constrained optimizers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
  /// Iteration budget per solver run.
  pub max_iters: u64,
  /// Projected-gradient residual, in weight units, below which a smooth
  /// objective counts as converged.
  pub tol_residual: f64,
  /// An accepted step shorter than this, with the residual still above
  /// `tol_residual`, stalls the gradient solver.
  pub tol_step: f64,
  /// Nelder-Mead stops once the spread of simplex costs falls below this.
  pub tol_spread: f64,
  /// Most lattice points scanned to seed the tail-objective search.
  pub lattice_budget: usize,
  pub trading_days: f64,
}

impl Default for OptimizerConfig {
  fn default() -> Self {
    Self {
      max_iters: 1000,
      tol_residual: 1e-8,
      tol_step: 1e-13,
      tol_spread: 1e-12,
      lattice_budget: 2000,
      trading_days: TRADING_DAYS_PER_YEAR,
    }
  }
}

impl OptimizerConfig {
  pub fn validate(&self) -> Result<()> {
    if self.max_iters == 0 {
      return Err(VarToolsError::InvalidParameter(
        "max_iters must be at least 1".to_string(),
      ));
    }
    if self.lattice_budget == 0 {
      return Err(VarToolsError::InvalidParameter(
        "lattice_budget must be at least 1".to_string(),
      ));
    }
    for (name, value) in [
      ("tol_residual", self.tol_residual),
      ("tol_step", self.tol_step),
      ("tol_spread", self.tol_spread),
      ("trading_days", self.trading_days),
    ] {
      if !(value.is_finite() && value > 0.0) {
        return Err(VarToolsError::InvalidParameter(format!(
          "{name} must be positive, got {value}"
        )));
      }
    }
    Ok(())
  }
}

/// Settings of a rolling backtest run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
  /// Starting value of every strategy series.
  pub initial_capital: f64,
  /// Annualized risk-free rate as a decimal.
  pub risk_free_rate: f64,
  /// Whole months between re-optimizations.
  pub rebalance_months: u32,
  /// CVaR confidence in percent, strictly inside (0, 100).
  pub confidence: f64,
  /// Run the six per-window optimizations on the rayon pool.
  pub parallel: bool,
  /// Draw a progress bar over rebalancing windows.
  pub show_progress: bool,
  pub optimizer: OptimizerConfig,
}

impl Default for BacktestConfig {
  fn default() -> Self {
    Self {
      initial_capital: 1_000_000.0,
      risk_free_rate: 0.0,
      rebalance_months: 6,
      confidence: 95.0,
      parallel: false,
      show_progress: false,
      optimizer: OptimizerConfig::default(),
    }
  }
}

impl BacktestConfig {
  pub fn from_toml_str(content: &str) -> Result<Self> {
    let config: BacktestConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  /// Load and validate a TOML configuration file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    info!("Loading backtest configuration from {}", path.display());

    let content = fs::read_to_string(path)?;
    Self::from_toml_str(&content)
  }

  pub fn validate(&self) -> Result<()> {
    if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
      return Err(VarToolsError::InvalidParameter(format!(
        "initial capital must be positive, got {}",
        self.initial_capital
      )));
    }
    if !self.risk_free_rate.is_finite() {
      return Err(VarToolsError::InvalidParameter(
        "risk-free rate must be finite".to_string(),
      ));
    }
    if self.rebalance_months == 0 {
      return Err(VarToolsError::InvalidParameter(
        "rebalancing interval must be at least one month".to_string(),
      ));
    }
    validate_confidence(self.confidence, "confidence")?;
    self.optimizer.validate()
  }

  /// Annotated sample configuration.
  pub fn example() -> String {
    r#"# vartools backtest configuration
initial_capital = 1000000.0
risk_free_rate = 0.04
rebalance_months = 6
confidence = 95.0
parallel = true
show_progress = false

[optimizer]
max_iters = 1000
tol_residual = 1e-8
tol_step = 1e-13
tol_spread = 1e-12
lattice_budget = 2000
trading_days = 252.0
"#
    .to_string()
  }
}
