//! # Cash VaR
//!
//! $$
//! \mathrm{VaR}^{\$} = V\,\left|q\right|, \qquad
//! \mathrm{VaR}^{\mathrm{liq}} = \left|q \mp \mathbf w^\top \bar s\right|
//! $$
//!
//! Percentage and cash tail measures for share, currency and bid/ask quoted
//! books. The liquidity-adjusted variant charges the average and the
//! 99th-percentile relative spread against the tail return.

use ndarray::Array1;
use ndarray::Axis;
use tracing::debug;

use super::historical::Position;
use super::historical::Tail;
use super::report::RiskMeasure;
use super::report::RiskReport;
use super::report::RiskRow;
use crate::data::stats::percentile;
use crate::data::BidAskTable;
use crate::data::PriceTable;
use crate::error::validate_confidence;
use crate::error::validate_same_length;
use crate::error::Result;
use crate::error::VarToolsError;

const STRESSED_SPREAD_PERCENTILE: f64 = 99.0;

fn checked_total(value: f64) -> Result<f64> {
  if !value.is_finite() || value.abs() < f64::EPSILON {
    return Err(VarToolsError::NumericalDegeneracy(format!(
      "portfolio value is {value}, cannot derive weights"
    )));
  }
  Ok(value)
}

fn base_rows(tail: &Tail, portfolio_value: f64) -> [RiskRow; 2] {
  [
    RiskRow::new(RiskMeasure::Var, tail.var(), (portfolio_value * tail.threshold).abs()),
    RiskRow::new(RiskMeasure::Cvar, tail.cvar(), (portfolio_value * tail.mean).abs()),
  ]
}

/// VaR/CVaR of a stock book holding `shares` of each of `tickers`.
///
/// Weights are market-value weights at the last available price.
pub fn var_stocks<S: AsRef<str>>(
  prices: &PriceTable,
  shares: &[f64],
  confidence: f64,
  position: Position,
  tickers: &[S],
) -> Result<RiskReport> {
  validate_confidence(confidence, "confidence")?;
  validate_same_length(tickers.len(), shares.len(), "shares")?;

  let table = prices.select(tickers)?;
  let returns = table.returns()?;
  let holdings = table.last_row()? * &Array1::from(shares.to_vec());
  let portfolio_value = checked_total(holdings.sum())?;
  let weights = (&holdings / portfolio_value).to_vec();

  let portfolio = returns.portfolio_returns(&weights)?.to_vec();
  let tail = Tail::estimate(&portfolio, confidence, position);
  debug!(
    portfolio_value,
    threshold = tail.threshold,
    "stock book tail estimated"
  );

  Ok(RiskReport {
    rows: base_rows(&tail, portfolio_value).to_vec(),
  })
}

/// VaR/CVaR of a currency book from the returns of its total marked value.
pub fn var_forex<S: AsRef<str>>(
  prices: &PriceTable,
  positions: &[f64],
  confidence: f64,
  position: Position,
  currencies: &[S],
) -> Result<RiskReport> {
  validate_confidence(confidence, "confidence")?;
  validate_same_length(currencies.len(), positions.len(), "positions")?;

  let table = prices.select(currencies)?;
  let totals = table.position_values(positions)?.to_vec();
  let portfolio: Vec<f64> = totals
    .windows(2)
    .map(|pair| pair[1] / pair[0] - 1.0)
    .filter(|r| r.is_finite())
    .collect();

  if portfolio.len() < 2 {
    return Err(VarToolsError::InsufficientData(format!(
      "need at least two portfolio returns, got {}",
      portfolio.len()
    )));
  }

  let last_value = totals
    .last()
    .copied()
    .ok_or_else(|| VarToolsError::InsufficientData("price table has no rows".to_string()))?;
  let portfolio_value = checked_total(last_value)?;
  let tail = Tail::estimate(&portfolio, confidence, position);

  Ok(RiskReport {
    rows: base_rows(&tail, portfolio_value).to_vec(),
  })
}

/// Liquidity-adjusted VaR/CVaR of a book quoted with bid and ask prices.
///
/// Returns are taken on mid quotes. Long books subtract the weighted spread
/// cost from the signed tail return, short books add it.
pub fn var_liquidity_adjusted(
  quotes: &BidAskTable,
  positions: &[f64],
  confidence: f64,
  position: Position,
) -> Result<RiskReport> {
  validate_confidence(confidence, "confidence")?;
  validate_same_length(quotes.n_assets(), positions.len(), "positions")?;

  let mids = quotes.mids()?;
  let returns = mids.returns()?;
  let holdings = mids.last_row()? * &Array1::from(positions.to_vec());
  let portfolio_value = checked_total(holdings.sum())?;
  let weights = &holdings / portfolio_value;

  let spreads = quotes.relative_spreads();
  let mut average = Vec::with_capacity(quotes.n_assets());
  let mut stressed = Vec::with_capacity(quotes.n_assets());
  for column in spreads.axis_iter(Axis(1)) {
    let observed: Vec<f64> = column.iter().copied().filter(|s| s.is_finite()).collect();
    if observed.is_empty() {
      return Err(VarToolsError::InsufficientData(
        "no valid bid/ask spread observations".to_string(),
      ));
    }
    average.push(observed.iter().sum::<f64>() / observed.len() as f64);
    stressed.push(percentile(&observed, STRESSED_SPREAD_PERCENTILE));
  }

  let average_cost = weights.dot(&Array1::from(average));
  let stressed_cost = weights.dot(&Array1::from(stressed));
  let portfolio = returns.portfolio_returns(&weights.to_vec())?.to_vec();
  let tail = Tail::estimate(&portfolio, confidence, position);

  let adjust = |signed: f64, cost: f64| match position {
    Position::Long => signed - cost,
    Position::Short => signed + cost,
  };
  let row = |measure, signed: f64, cost: f64| {
    let pct = adjust(signed, cost);
    RiskRow::new(measure, pct.abs(), (portfolio_value * pct).abs())
  };

  debug!(
    portfolio_value,
    average_cost, stressed_cost, "liquidity costs estimated"
  );

  Ok(RiskReport {
    rows: vec![
      row(RiskMeasure::Var, tail.threshold, 0.0),
      row(RiskMeasure::VarAverageLiquidity, tail.threshold, average_cost),
      row(RiskMeasure::VarStressedLiquidity, tail.threshold, stressed_cost),
      row(RiskMeasure::Cvar, tail.mean, 0.0),
      row(RiskMeasure::CvarAverageLiquidity, tail.mean, average_cost),
      row(RiskMeasure::CvarStressedLiquidity, tail.mean, stressed_cost),
    ],
  })
}

/// Short name for [`var_liquidity_adjusted`].
pub fn var_apl(
  quotes: &BidAskTable,
  positions: &[f64],
  confidence: f64,
  position: Position,
) -> Result<RiskReport> {
  var_liquidity_adjusted(quotes, positions, confidence, position)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use chrono::NaiveDate;
  use ndarray::Array2;

  use super::*;

  fn dates(n: usize) -> Vec<NaiveDate> {
    let start = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
    (0..n).map(|i| start + chrono::Days::new(i as u64)).collect()
  }

  fn prices() -> PriceTable {
    PriceTable::from_columns(
      dates(7),
      vec![
        ("AAA", vec![100.0, 101.0, 99.0, 102.0, 97.0, 97.0, 99.0]),
        ("BBB", vec![50.0, 50.5, 49.0, 50.0, 48.0, 48.5, 49.0]),
        ("CCC", vec![10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0]),
      ],
    )
    .unwrap()
  }

  #[test]
  fn stock_cash_is_value_times_pct() {
    let report = var_stocks(&prices(), &[10.0, 20.0], 95.0, Position::Long, &["AAA", "BBB"]).unwrap();
    let value = 10.0 * 99.0 + 20.0 * 49.0;

    let var = report.get(RiskMeasure::Var).unwrap();
    let cvar = report.get(RiskMeasure::Cvar).unwrap();
    assert_abs_diff_eq!(var.cash, var.pct * value, epsilon = 1e-9);
    assert_abs_diff_eq!(cvar.cash, cvar.pct * value, epsilon = 1e-9);
    assert!(cvar.pct >= var.pct);
    assert!(report.get(RiskMeasure::VarStressedLiquidity).is_none());
  }

  #[test]
  fn stock_pct_is_invariant_to_scaling_shares() {
    let a = var_stocks(&prices(), &[10.0, 20.0], 90.0, Position::Long, &["AAA", "BBB"]).unwrap();
    let b = var_stocks(&prices(), &[30.0, 60.0], 90.0, Position::Long, &["AAA", "BBB"]).unwrap();
    assert_abs_diff_eq!(
      a.pct(RiskMeasure::Var).unwrap(),
      b.pct(RiskMeasure::Var).unwrap(),
      epsilon = 1e-12
    );
    assert_abs_diff_eq!(
      3.0 * a.cash(RiskMeasure::Var).unwrap(),
      b.cash(RiskMeasure::Var).unwrap(),
      epsilon = 1e-9
    );
  }

  #[test]
  fn stock_validation() {
    assert!(matches!(
      var_stocks(&prices(), &[1.0], 95.0, Position::Long, &["AAA", "BBB"]),
      Err(VarToolsError::InvalidParameter(_))
    ));
    assert!(matches!(
      var_stocks(&prices(), &[0.0, 0.0], 95.0, Position::Long, &["AAA", "BBB"]),
      Err(VarToolsError::NumericalDegeneracy(_))
    ));
    assert!(var_stocks(&prices(), &[1.0], 95.0, Position::Long, &["ZZZ"]).is_err());
  }

  #[test]
  fn forex_uses_total_value_series() {
    let report = var_forex(&prices(), &[1.0, 2.0], 95.0, Position::Short, &["AAA", "BBB"]).unwrap();
    let totals = [200.0, 202.0, 197.0, 202.0, 193.0, 194.0, 197.0];
    let rets: Vec<f64> = totals.windows(2).map(|p| p[1] / p[0] - 1.0).collect();
    let q = percentile(&rets, 95.0);

    assert_abs_diff_eq!(report.pct(RiskMeasure::Var).unwrap(), q.abs(), epsilon = 1e-12);
    assert_abs_diff_eq!(report.cash(RiskMeasure::Var).unwrap(), (197.0 * q).abs(), epsilon = 1e-9);
  }

  #[test]
  fn constant_book_has_zero_risk() {
    let report = var_forex(&prices(), &[5.0], 99.0, Position::Long, &["CCC"]).unwrap();
    assert_eq!(report.pct(RiskMeasure::Var), Some(0.0));
    assert_eq!(report.pct(RiskMeasure::Cvar), Some(0.0));
  }

  fn quotes() -> BidAskTable {
    let mids = [1.00, 1.01, 0.99, 1.02, 0.98, 1.00];
    let half_spread = [0.005, 0.005, 0.01, 0.005, 0.02, 0.005];
    BidAskTable::new(
      dates(6),
      vec!["EURUSD".to_string()],
      Array2::from_shape_fn((6, 1), |(t, _)| mids[t] - half_spread[t]),
      Array2::from_shape_fn((6, 1), |(t, _)| mids[t] + half_spread[t]),
    )
    .unwrap()
  }

  #[test]
  fn liquidity_adjustment_widens_long_losses() {
    let report = var_apl(&quotes(), &[1_000.0], 95.0, Position::Long).unwrap();
    assert_eq!(report.rows.len(), 6);

    let var = report.pct(RiskMeasure::Var).unwrap();
    let avg = report.pct(RiskMeasure::VarAverageLiquidity).unwrap();
    let stressed = report.pct(RiskMeasure::VarStressedLiquidity).unwrap();
    assert!(var > 0.0);
    assert!(avg > var);
    assert!(stressed > avg);

    let cvar = report.pct(RiskMeasure::Cvar).unwrap();
    let cvar_stressed = report.pct(RiskMeasure::CvarStressedLiquidity).unwrap();
    assert!(cvar >= var);
    assert!(cvar_stressed > cvar);
    assert_abs_diff_eq!(
      report.cash(RiskMeasure::VarAverageLiquidity).unwrap(),
      avg * 1_000.0,
      epsilon = 1e-9
    );
  }

  #[test]
  fn liquidity_validation() {
    assert!(var_liquidity_adjusted(&quotes(), &[1.0, 2.0], 95.0, Position::Long).is_err());
    assert!(var_liquidity_adjusted(&quotes(), &[1.0], 100.0, Position::Short).is_err());
  }
}
