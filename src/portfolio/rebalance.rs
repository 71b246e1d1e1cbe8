//! # Rebalancing Trades
//!
//! $$
//! \Delta n_i = \frac{(w^{\text{target}}_i - w^{\text{current}}_i)\,V}{p_i}
//! $$
//!
//! Share counts that move a book from its current to its target weights at
//! the last available prices.

use std::fmt::Display;

use impl_new_derive::ImplNew;

use crate::data::PriceTable;
use crate::error::validate_same_length;
use crate::error::Result;
use crate::error::VarToolsError;

#[derive(ImplNew, Clone, Debug, PartialEq)]
pub struct RebalanceRow {
  pub ticker: String,
  pub current_weight: f64,
  pub target_weight: f64,
  /// Positive to buy, negative to sell.
  pub shares: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RebalancePlan {
  pub rows: Vec<RebalanceRow>,
}

impl RebalancePlan {
  pub fn row(&self, ticker: &str) -> Option<&RebalanceRow> {
    self.rows.iter().find(|row| row.ticker == ticker)
  }

  /// Cash spent (positive) or raised (negative) at `prices`.
  pub fn net_cash(&self, prices: &[f64]) -> f64 {
    self.rows.iter().zip(prices).map(|(row, p)| row.shares * p).sum()
  }
}

impl Display for RebalancePlan {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    writeln!(f, "{:<10} {:>10} {:>10} {:>14}", "ticker", "current", "target", "shares")?;
    for row in &self.rows {
      writeln!(
        f,
        "{:<10} {:>10.4} {:>10.4} {:>14.4}",
        row.ticker, row.current_weight, row.target_weight, row.shares
      )?;
    }
    Ok(())
  }
}

/// Trades that take a book worth `portfolio_value` from `current` to `target` weights.
pub fn rebalance_trades<S: AsRef<str>>(
  current: &[f64],
  target: &[f64],
  prices: &PriceTable,
  tickers: &[S],
  portfolio_value: f64,
) -> Result<RebalancePlan> {
  validate_same_length(tickers.len(), current.len(), "current weights")?;
  validate_same_length(tickers.len(), target.len(), "target weights")?;
  if !(portfolio_value.is_finite() && portfolio_value > 0.0) {
    return Err(VarToolsError::InvalidParameter(format!(
      "portfolio value must be positive, got {portfolio_value}"
    )));
  }

  let last = prices.select(tickers)?.last_row()?;
  let rows = tickers
    .iter()
    .zip(current.iter().zip(target))
    .zip(last.iter())
    .map(|((ticker, (&cur, &tgt)), &price)| {
      if !(price.is_finite() && price > 0.0) {
        return Err(VarToolsError::NumericalDegeneracy(format!(
          "last price of {} is {price}",
          ticker.as_ref()
        )));
      }
      Ok(RebalanceRow::new(
        ticker.as_ref().to_string(),
        cur,
        tgt,
        (tgt - cur) * portfolio_value / price,
      ))
    })
    .collect::<Result<Vec<_>>>()?;

  Ok(RebalancePlan { rows })
}
