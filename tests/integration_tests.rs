//! End-to-end runs over synthetic price histories: configuration loading,
//! risk reporting on optimized weights, a full backtest and the trade list
//! that follows from it.

use std::io::Write;

use approx::assert_abs_diff_eq;
use approx::assert_relative_eq;
use chrono::Days;
use chrono::NaiveDate;
use tempfile::NamedTempFile;

use vartools::data::percentile;
use vartools::portfolio::rebalance_trades;
use vartools::portfolio::simulate_portfolio;
use vartools::risk::historical_cvar;
use vartools::risk::historical_var;
use vartools::risk::var_stocks;
use vartools::risk::RiskMeasure;
use vartools::BacktestConfig;
use vartools::DynamicBacktest;
use vartools::OptimizerConfig;
use vartools::PortfolioOptimizer;
use vartools::Position;
use vartools::PriceTable;
use vartools::Strategy;

fn dates(n: usize) -> Vec<NaiveDate> {
  let start = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
  (0..n).map(|i| start + Days::new(i as u64)).collect()
}

fn path(n: usize, base: f64, amp: f64, freq: f64, drift: f64) -> Vec<f64> {
  (0..n)
    .map(|i| base * (1.0 + drift * i as f64 + amp * (freq * i as f64).sin()))
    .collect()
}

fn universe(n: usize) -> (PriceTable, PriceTable) {
  let prices = PriceTable::from_columns(
    dates(n),
    vec![
      ("ALPHA", path(n, 120.0, 0.04, 0.29, 0.0003)),
      ("BETA", path(n, 35.0, 0.06, 0.11, 0.0005)),
      ("GAMMA", path(n, 80.0, 0.02, 0.47, 0.0001)),
      ("DELTA", path(n, 12.0, 0.09, 0.19, 0.0002)),
    ],
  )
  .unwrap();
  let benchmark = PriceTable::from_columns(dates(n), vec![("INDEX", path(n, 4000.0, 0.015, 0.21, 0.0002))]).unwrap();
  (prices, benchmark)
}

#[test]
fn test_backtest_from_toml_file() {
  let mut file = NamedTempFile::new().unwrap();
  write!(
    file,
    r#"
initial_capital = 250000.0
risk_free_rate = 0.01
rebalance_months = 6
confidence = 95.0
parallel = true
"#
  )
  .unwrap();
  let config = BacktestConfig::load(file.path()).unwrap();
  assert_eq!(config.optimizer, OptimizerConfig::default());

  let (prices, benchmark) = universe(504);
  let backtest = DynamicBacktest::new(prices, benchmark, config).unwrap();
  assert_eq!(backtest.schedule().window(), 126);

  let result = backtest.run().unwrap();
  assert_eq!(result.dates.len(), 504 - 126);
  assert_eq!(result.series.len(), Strategy::ALL.len());
  // 377 simulated days cross two window boundaries
  assert_eq!(result.n_optimizations(), 3);

  for series in result.series_iter() {
    assert_eq!(series.values.len(), result.dates.len());
    assert_eq!(series.values[0], 250_000.0);
    assert!(series.values.iter().all(|v| v.is_finite() && *v > 0.0));
  }
  for record in &result.windows {
    for strategy in Strategy::ALL {
      let w = record.weights.weights(strategy).unwrap();
      assert_abs_diff_eq!(w.sum(), 1.0, epsilon = 1e-6);
    }
  }
}

#[test]
fn test_optimized_weights_feed_risk_and_trades() {
  let (prices, _) = universe(300);
  let returns = prices.returns().unwrap();
  let optimizer = PortfolioOptimizer::new(returns.clone(), 0.0, OptimizerConfig::default()).unwrap();

  let min_var = optimizer.min_variance().unwrap();
  let min_cvar = optimizer.min_cvar(95.0).unwrap();
  let equal = vec![0.25; 4];

  let var_eq = historical_var(&returns, &equal, 95.0, Position::Long).unwrap();
  let cvar_eq = historical_cvar(&returns, &equal, 95.0, Position::Long).unwrap();
  let cvar_opt = historical_cvar(&returns, &min_cvar.weights, 95.0, Position::Long).unwrap();
  assert!(cvar_eq >= var_eq);
  // the strict-tail report tracks the inclusive-tail objective closely
  assert!(cvar_opt <= cvar_eq + 1e-3);

  let var_min = historical_var(&returns, &min_var.weights, 95.0, Position::Long).unwrap();
  let direct = percentile(&returns.portfolio_returns(&min_var.weights).unwrap().to_vec(), 5.0);
  assert_relative_eq!(var_min, direct.abs(), max_relative = 1e-12);

  let tickers = prices.tickers().to_vec();
  let plan = rebalance_trades(&equal, &min_var.weights, &prices, &tickers, 1_000_000.0).unwrap();
  assert_eq!(plan.rows.len(), 4);
  let last = prices.last_row().unwrap().to_vec();
  assert_abs_diff_eq!(plan.net_cash(&last), 0.0, epsilon = 1e-6);
}

#[test]
fn test_stock_report_matches_weighted_history() {
  let (prices, _) = universe(200);
  let shares = [100.0, 400.0, 50.0, 1000.0];
  let tickers = ["ALPHA", "BETA", "GAMMA", "DELTA"];
  let report = var_stocks(&prices, &shares, 99.0, Position::Long, &tickers).unwrap();

  let last = prices.last_row().unwrap();
  let values: Vec<f64> = last.iter().zip(&shares).map(|(p, s)| p * s).collect();
  let total: f64 = values.iter().sum();
  let weights: Vec<f64> = values.iter().map(|v| v / total).collect();
  let expected = historical_var(&prices.returns().unwrap(), &weights, 99.0, Position::Long).unwrap();

  assert_relative_eq!(report.pct(RiskMeasure::Var).unwrap(), expected, max_relative = 1e-10);
  assert_relative_eq!(report.cash(RiskMeasure::Var).unwrap(), expected * total, max_relative = 1e-9);
  assert!(report.pct(RiskMeasure::Cvar).unwrap() >= expected);
}

#[test]
fn test_simulated_paths_start_near_one() {
  let (prices, _) = universe(250);
  let paths = simulate_portfolio(&prices, &[0.25; 4], 30, 200, 2024).unwrap();
  assert_eq!(paths.dim(), (30, 200));

  let first_day_mean = paths.row(0).mean().unwrap();
  assert_abs_diff_eq!(first_day_mean, 1.0, epsilon = 0.01);
}
