//! # Portfolio Optimizer
//!
//! $$
//! \min_{\mathbf w}\ f_s(\mathbf w)
//! \quad \text{s.t.} \quad \mathbf 1^\top \mathbf w = 1,\ l_s \le w_i \le u_s
//! $$
//!
//! One optimization context per return window. Every strategy starts from
//! equal weights and returns the best iterate found together with its
//! convergence status. Smooth objectives run projected gradient; the two
//! CVaR objectives run a lattice-seeded simplex search.

use argmin::core::CostFunction;
use argmin::core::Gradient;
use ndarray::Array1;
use rayon::prelude::*;
use tracing::debug;
use tracing::warn;

use super::objectives::MaxTailContribution;
use super::objectives::NegativeOmega;
use super::objectives::NegativeSharpe;
use super::objectives::QuadraticRisk;
use super::objectives::TailLoss;
use super::search::SimplexSearch;
use super::solver::ProjectedGradient;
use super::solver::SolverReport;
use super::types::OptimizationOutcome;
use super::types::Strategy;
use super::types::WeightTable;
use crate::config::OptimizerConfig;
use crate::data::CovarianceMatrix;
use crate::data::ReturnMatrix;
use crate::error::validate_confidence;
use crate::error::Result;
use crate::error::VarToolsError;

/// Six constrained allocation strategies over a single return window.
#[derive(Clone, Debug)]
pub struct PortfolioOptimizer {
  returns: ReturnMatrix,
  covariance: CovarianceMatrix,
  risk_free_rate: f64,
  benchmark: Option<Array1<f64>>,
  config: OptimizerConfig,
}

impl PortfolioOptimizer {
  /// `risk_free_rate` is annualized, as a decimal.
  pub fn new(returns: ReturnMatrix, risk_free_rate: f64, config: OptimizerConfig) -> Result<Self> {
    config.validate()?;
    if !risk_free_rate.is_finite() {
      return Err(VarToolsError::InvalidParameter(format!(
        "risk-free rate must be finite, got {risk_free_rate}"
      )));
    }

    let covariance = returns.covariance();
    if covariance.is_near_singular(1e-12) {
      debug!(
        assets = returns.n_assets(),
        "covariance is near singular, optimum may not be unique"
      );
    }

    Ok(Self {
      returns,
      covariance,
      risk_free_rate,
      benchmark: None,
      config,
    })
  }

  /// Attach benchmark returns aligned row-by-row with the window.
  pub fn with_benchmark(mut self, benchmark: Array1<f64>) -> Result<Self> {
    if benchmark.len() != self.returns.n_periods() {
      return Err(VarToolsError::InvalidParameter(format!(
        "benchmark has length {}, expected {}",
        benchmark.len(),
        self.returns.n_periods()
      )));
    }
    if benchmark.iter().any(|b| !b.is_finite()) {
      return Err(VarToolsError::InsufficientData(
        "benchmark returns contain missing values".to_string(),
      ));
    }
    self.benchmark = Some(benchmark);
    Ok(self)
  }

  pub fn returns(&self) -> &ReturnMatrix {
    &self.returns
  }

  pub fn covariance(&self) -> &CovarianceMatrix {
    &self.covariance
  }

  pub fn n_assets(&self) -> usize {
    self.returns.n_assets()
  }

  fn benchmark(&self, strategy: Strategy) -> Result<&Array1<f64>> {
    self.benchmark.as_ref().ok_or_else(|| {
      VarToolsError::InsufficientData(format!("{strategy} needs benchmark returns"))
    })
  }

  fn equal_weights(&self) -> Vec<f64> {
    let n = self.n_assets();
    vec![1.0 / n as f64; n]
  }

  /// Projected gradient for the objectives with analytic gradients.
  fn solve<O>(&self, strategy: Strategy, problem: O) -> Result<OptimizationOutcome>
  where
    O: CostFunction<Param = Vec<f64>, Output = f64> + Gradient<Param = Vec<f64>, Gradient = Vec<f64>>,
  {
    let report = ProjectedGradient::new(strategy.bounds(), &self.config)
      .minimize(problem, &self.equal_weights())?;
    Ok(self.finish(strategy, report))
  }

  /// Lattice-seeded Nelder-Mead for the piecewise-linear tail objectives.
  fn search<O>(&self, strategy: Strategy, problem: O) -> Result<OptimizationOutcome>
  where
    O: CostFunction<Param = Vec<f64>, Output = f64>,
  {
    let report = SimplexSearch::new(strategy.bounds(), &self.config)
      .minimize(&problem, &self.equal_weights())?;
    Ok(self.finish(strategy, report))
  }

  fn finish(&self, strategy: Strategy, report: SolverReport) -> OptimizationOutcome {
    let outcome = OptimizationOutcome {
      strategy,
      weights: report.param,
      objective: report.cost,
      iterations: report.iterations,
      status: report.status,
    };

    if outcome.is_converged() {
      debug!(
        strategy = %strategy,
        iterations = outcome.iterations,
        objective = outcome.objective,
        "strategy converged"
      );
    } else {
      warn!(
        strategy = %strategy,
        iterations = outcome.iterations,
        status = %outcome.status,
        "strategy did not converge, keeping best iterate"
      );
    }

    outcome
  }

  /// Minimize `wᵀCw` on `[0, 1]`.
  pub fn min_variance(&self) -> Result<OptimizationOutcome> {
    self.solve(
      Strategy::MinVariance,
      QuadraticRisk::new(self.covariance.clone()),
    )
  }

  /// Maximize the annualized Sharpe ratio, long only.
  pub fn max_sharpe(&self) -> Result<OptimizationOutcome> {
    let problem = NegativeSharpe::new(
      self.returns.mean().to_vec(),
      self.covariance.clone(),
      self.risk_free_rate,
      self.config.trading_days,
    );
    self.solve(Strategy::MaxSharpe, problem)
  }

  /// Minimize benchmark-relative target semivariance on `[0, 3]`.
  pub fn min_semivariance(&self) -> Result<OptimizationOutcome> {
    let strategy = Strategy::MinSemivariance;
    let problem = QuadraticRisk::target_semivariance(
      self.returns.values(),
      self.benchmark(strategy)?,
      &self.covariance.correlation(),
    )?;
    self.solve(strategy, problem)
  }

  /// Maximize the benchmark-relative Omega score on `[0, 3]`.
  pub fn max_omega(&self) -> Result<OptimizationOutcome> {
    let strategy = Strategy::MaxOmega;
    let problem = NegativeOmega::new(self.returns.values(), self.benchmark(strategy)?)?;
    self.solve(strategy, problem)
  }

  /// Minimize historical CVaR at confidence `alpha` (percent).
  pub fn min_cvar(&self, alpha: f64) -> Result<OptimizationOutcome> {
    validate_confidence(alpha, "alpha")?;
    let problem = TailLoss::new(self.returns.values().clone(), alpha);
    self.search(Strategy::MinCvar, problem)
  }

  /// Minimize the largest single-asset CVaR contribution at confidence `alpha`.
  pub fn min_cvar_contribution(&self, alpha: f64) -> Result<OptimizationOutcome> {
    validate_confidence(alpha, "alpha")?;
    let problem = MaxTailContribution::new(self.returns.values().clone(), alpha);
    self.search(Strategy::MinCvarContribution, problem)
  }

  /// Dispatch on `strategy`; `alpha` is only read by the CVaR strategies.
  pub fn optimize(&self, strategy: Strategy, alpha: f64) -> Result<OptimizationOutcome> {
    match strategy {
      Strategy::MinVariance => self.min_variance(),
      Strategy::MaxSharpe => self.max_sharpe(),
      Strategy::MinSemivariance => self.min_semivariance(),
      Strategy::MaxOmega => self.max_omega(),
      Strategy::MinCvar => self.min_cvar(alpha),
      Strategy::MinCvarContribution => self.min_cvar_contribution(alpha),
    }
  }

  /// Run every strategy; results come back in [`Strategy::ALL`] order.
  pub fn optimize_all(&self, alpha: f64, parallel: bool) -> Vec<Result<OptimizationOutcome>> {
    if parallel {
      Strategy::ALL[..]
        .par_iter()
        .map(|&strategy| self.optimize(strategy, alpha))
        .collect()
    } else {
      Strategy::ALL
        .iter()
        .map(|&strategy| self.optimize(strategy, alpha))
        .collect()
    }
  }

  /// Weights of every strategy as an asset-by-strategy table.
  pub fn weight_table(&self, alpha: f64, parallel: bool) -> Result<WeightTable> {
    let columns = self
      .optimize_all(alpha, parallel)
      .into_iter()
      .map(|outcome| outcome.map(|o| (o.strategy, o.weights)))
      .collect::<Result<Vec<_>>>()?;
    WeightTable::new(self.returns.tickers().to_vec(), columns)
  }
}
