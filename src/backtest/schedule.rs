//! # Rebalance Schedule
//!
//! $$
//! P = \operatorname{round}\!\left(\frac{T}{252}\cdot\frac{12}{m}\right),\qquad
//! L = \operatorname{round}\!\left(\frac{T}{P}\right)
//! $$
//!
//! Nominal window length in trading days for an `m`-month rebalancing interval
//! over `T` rows. Both roundings go half to even.

use crate::config::TRADING_DAYS_PER_YEAR;
use crate::error::Result;
use crate::error::VarToolsError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RebalanceSchedule {
  total_days: usize,
  months: u32,
  periods: usize,
  window: usize,
}

impl RebalanceSchedule {
  pub fn new(total_days: usize, months: u32) -> Result<Self> {
    if months == 0 {
      return Err(VarToolsError::InvalidParameter(
        "rebalancing interval must be at least one month".to_string(),
      ));
    }

    let years = total_days as f64 / TRADING_DAYS_PER_YEAR;
    let periods = (years / (months as f64 / 12.0)).round_ties_even();
    if periods < 1.0 {
      return Err(VarToolsError::InvalidParameter(format!(
        "{total_days} trading days hold no {months}-month rebalancing period"
      )));
    }

    let window = (total_days as f64 / periods).round_ties_even() as usize;
    Ok(Self {
      total_days,
      months,
      periods: periods as usize,
      window,
    })
  }

  /// Trading days between re-optimizations.
  pub fn window(&self) -> usize {
    self.window
  }

  /// Number of nominal periods spanned by the whole history.
  pub fn periods(&self) -> usize {
    self.periods
  }

  pub fn months(&self) -> u32 {
    self.months
  }

  pub fn total_days(&self) -> usize {
    self.total_days
  }
}
