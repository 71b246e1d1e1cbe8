//! # Dynamic Backtest
//!
//! $$
//! V^{s}_{t+1} = V^{s}_{t}\left(1 + \sum_i r_{t+1,i}\, w^{s}_i\right)
//! $$
//!
//! Rolling out-of-sample simulation. The first window of the price history
//! seeds the weights; afterwards every `L` simulated days the next `L`-row
//! slice of the out-of-sample region is re-optimized, so weights only ever
//! see prices strictly before the day they are applied to.

use chrono::NaiveDate;
use indicatif::ProgressBar;
use indicatif::ProgressStyle;
use rayon::prelude::*;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::schedule::RebalanceSchedule;
use crate::config::BacktestConfig;
use crate::data::PriceTable;
use crate::error::Result;
use crate::error::VarToolsError;
use crate::optimization::ConvergenceStatus;
use crate::optimization::OptimizationOutcome;
use crate::optimization::PortfolioOptimizer;
use crate::optimization::Strategy;
use crate::optimization::WeightTable;

const FEASIBILITY_TOL: f64 = 1e-6;

/// What happened to one strategy when a window was re-optimized.
#[derive(Clone, Debug, PartialEq)]
pub enum WindowStatus {
  /// New weights adopted.
  Solved(ConvergenceStatus),
  /// Optimization failed; the previous weights stay in force.
  KeptPrevious(String),
}

impl WindowStatus {
  pub fn is_converged(&self) -> bool {
    matches!(self, WindowStatus::Solved(ConvergenceStatus::Converged))
  }
}

/// Weights chosen at one rebalancing boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct RebalanceRecord {
  /// 0 for the initial optimization window.
  pub period: usize,
  /// First and last price date of the optimization window.
  pub window_start: NaiveDate,
  pub window_end: NaiveDate,
  pub weights: WeightTable,
  /// One entry per strategy, in [`Strategy::ALL`] order.
  pub statuses: Vec<WindowStatus>,
}

impl RebalanceRecord {
  pub fn status(&self, strategy: Strategy) -> Option<&WindowStatus> {
    self.statuses.get(strategy.index())
  }
}

/// Value path of one strategy.
#[derive(Clone, Debug, PartialEq)]
pub struct StrategySeries {
  pub strategy: Strategy,
  pub values: Vec<f64>,
}

/// Per-strategy value series on the out-of-sample date index.
#[derive(Clone, Debug, PartialEq)]
pub struct BacktestResult {
  pub dates: Vec<NaiveDate>,
  pub initial_capital: f64,
  pub series: Vec<StrategySeries>,
  pub windows: Vec<RebalanceRecord>,
}

impl BacktestResult {
  pub fn series(&self, strategy: Strategy) -> Option<&StrategySeries> {
    self.series.iter().find(|s| s.strategy == strategy)
  }

  pub fn series_iter(&self) -> impl Iterator<Item = &StrategySeries> {
    self.series.iter()
  }

  pub fn final_values(&self) -> Vec<(Strategy, f64)> {
    self
      .series
      .iter()
      .map(|s| (s.strategy, s.values.last().copied().unwrap_or(self.initial_capital)))
      .collect()
  }

  /// Simple return over the whole run per strategy.
  pub fn total_returns(&self) -> Vec<(Strategy, f64)> {
    self
      .final_values()
      .into_iter()
      .map(|(strategy, value)| (strategy, value / self.initial_capital - 1.0))
      .collect()
  }

  /// Number of optimizations performed, the initial one included.
  pub fn n_optimizations(&self) -> usize {
    self.windows.len()
  }
}

/// Optimizers for one window: plain returns, and returns aligned with the benchmark.
struct WindowContext {
  base: std::result::Result<PortfolioOptimizer, String>,
  benchmarked: std::result::Result<PortfolioOptimizer, String>,
}

impl WindowContext {
  fn new(window: &PriceTable, benchmark: &PriceTable, config: &BacktestConfig) -> Self {
    let base = window
      .returns()
      .and_then(|r| PortfolioOptimizer::new(r, config.risk_free_rate, config.optimizer.clone()));

    let benchmarked = match &base {
      Ok(optimizer) => optimizer
        .returns()
        .align_with(benchmark)
        .and_then(|(aligned, bench)| {
          PortfolioOptimizer::new(aligned, config.risk_free_rate, config.optimizer.clone())?
            .with_benchmark(bench)
        })
        .map_err(|e| e.to_string()),
      Err(e) => Err(e.to_string()),
    };

    Self {
      base: base.map_err(|e| e.to_string()),
      benchmarked,
    }
  }

  fn optimize(
    &self,
    strategy: Strategy,
    alpha: f64,
  ) -> std::result::Result<OptimizationOutcome, String> {
    let optimizer = if strategy.needs_benchmark() {
      &self.benchmarked
    } else {
      &self.base
    };
    let outcome = optimizer
      .as_ref()
      .map_err(Clone::clone)?
      .optimize(strategy, alpha)
      .map_err(|e| e.to_string())?;
    outcome
      .check_feasible(FEASIBILITY_TOL)
      .map_err(|e| e.to_string())?;
    Ok(outcome)
  }
}

/// Rolling re-optimization of all six strategies over a price history.
#[derive(Clone, Debug)]
pub struct DynamicBacktest {
  prices: PriceTable,
  benchmark: PriceTable,
  config: BacktestConfig,
  schedule: RebalanceSchedule,
}

impl DynamicBacktest {
  /// `benchmark` must hold exactly one price column.
  pub fn new(prices: PriceTable, benchmark: PriceTable, config: BacktestConfig) -> Result<Self> {
    config.validate()?;
    if benchmark.n_assets() != 1 {
      return Err(VarToolsError::InvalidParameter(format!(
        "benchmark table must have exactly one column, got {}",
        benchmark.n_assets()
      )));
    }
    let schedule = RebalanceSchedule::new(prices.len(), config.rebalance_months)?;

    Ok(Self {
      prices,
      benchmark,
      config,
      schedule,
    })
  }

  pub fn schedule(&self) -> &RebalanceSchedule {
    &self.schedule
  }

  pub fn config(&self) -> &BacktestConfig {
    &self.config
  }

  fn rebalance(
    &self,
    window: &PriceTable,
    period: usize,
    current: &mut [Vec<f64>],
  ) -> Result<RebalanceRecord> {
    let (window_start, window_end) = match (window.dates().first(), window.dates().last()) {
      (Some(&start), Some(&end)) => (start, end),
      _ => {
        return Err(VarToolsError::InsufficientData(format!(
          "rebalancing window {period} has no rows"
        )))
      }
    };
    info!(period, start = %window_start, end = %window_end, "optimizing window");

    let context = WindowContext::new(window, &self.benchmark, &self.config);
    let alpha = self.config.confidence;
    let results: Vec<_> = if self.config.parallel {
      Strategy::ALL[..]
        .par_iter()
        .map(|&strategy| context.optimize(strategy, alpha))
        .collect()
    } else {
      Strategy::ALL
        .iter()
        .map(|&strategy| context.optimize(strategy, alpha))
        .collect()
    };

    let mut statuses = Vec::with_capacity(Strategy::ALL.len());
    for (strategy, result) in Strategy::ALL.into_iter().zip(results) {
      match result {
        Ok(outcome) => {
          debug!(period, strategy = %strategy, status = %outcome.status, "weights updated");
          statuses.push(WindowStatus::Solved(outcome.status));
          current[strategy.index()] = outcome.weights;
        }
        Err(note) => {
          warn!(period, strategy = %strategy, %note, "optimization failed, keeping previous weights");
          statuses.push(WindowStatus::KeptPrevious(note));
        }
      }
    }

    let weights = WeightTable::new(
      window.tickers().to_vec(),
      Strategy::ALL.into_iter().zip(current.iter().cloned()).collect(),
    )?;

    Ok(RebalanceRecord {
      period,
      window_start,
      window_end,
      weights,
      statuses,
    })
  }

  fn progress_bar(&self, days: usize) -> ProgressBar {
    if !self.config.show_progress {
      return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(days as u64);
    if let Ok(style) = ProgressStyle::default_bar()
      .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} days ({eta})")
    {
      bar.set_style(style.progress_chars("#>-"));
    }
    bar
  }

  /// Simulate every out-of-sample day and return the six value series.
  pub fn run(&self) -> Result<BacktestResult> {
    let window = self.schedule.window();
    let initial = self.prices.slice_rows(0..window);
    let backtest = self.prices.slice_rows(window..self.prices.len());
    if backtest.len() < 2 {
      return Err(VarToolsError::InsufficientData(format!(
        "window of {window} days leaves {} out-of-sample rows",
        backtest.len()
      )));
    }

    let daily = daily_returns(&backtest);
    let n = self.prices.n_assets();
    let capital = self.config.initial_capital;

    let mut current = vec![vec![1.0 / n as f64; n]; Strategy::ALL.len()];
    let mut windows = vec![self.rebalance(&initial, 0, &mut current)?];
    let mut values: Vec<Vec<f64>> = (0..Strategy::ALL.len())
      .map(|_| {
        let mut v = Vec::with_capacity(backtest.len());
        v.push(capital);
        v
      })
      .collect();
    let mut running = vec![capital; Strategy::ALL.len()];

    let progress = self.progress_bar(daily.len());
    let mut day_counter = 0;
    let mut period = 0;

    for returns in &daily {
      if day_counter >= window {
        let slice = backtest.slice_rows(period * window..(period + 1) * window);
        period += 1;
        windows.push(self.rebalance(&slice, period, &mut current)?);
        day_counter = 0;
      }

      for (s, weights) in current.iter().enumerate() {
        let growth: f64 = returns.iter().zip(weights).map(|(r, w)| r * w).sum();
        running[s] *= 1.0 + growth;
        values[s].push(running[s]);
      }

      day_counter += 1;
      progress.inc(1);
    }
    progress.finish_and_clear();

    info!(
      days = daily.len(),
      optimizations = windows.len(),
      "backtest finished"
    );

    Ok(BacktestResult {
      dates: backtest.dates().to_vec(),
      initial_capital: capital,
      series: Strategy::ALL
        .into_iter()
        .zip(values)
        .map(|(strategy, values)| StrategySeries { strategy, values })
        .collect(),
      windows,
    })
  }
}

/// Day-over-day simple returns; a missing price contributes a zero return.
fn daily_returns(prices: &PriceTable) -> Vec<Vec<f64>> {
  let p = prices.values();
  (1..prices.len())
    .map(|t| {
      (0..prices.n_assets())
        .map(|j| {
          let r = p[[t, j]] / p[[t - 1, j]] - 1.0;
          if r.is_finite() {
            r
          } else {
            0.0
          }
        })
        .collect()
    })
    .collect()
}
