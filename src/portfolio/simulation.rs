//! # Monte Carlo Paths
//!
//! $$
//! r_t = \mu + L z_t,\quad z_t \sim \mathcal N(0, I),\quad LL^\top = \Sigma,
//! \qquad V_t = \prod_{s \le t} \left(1 + \mathbf w^\top r_s\right)
//! $$
//!
//! Correlated Gaussian simulation of cumulative portfolio value, starting at 1.

use nalgebra::DVector;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use rand_distr::StandardNormal;
use tracing::debug;

use crate::data::PriceTable;
use crate::error::validate_same_length;
use crate::error::Result;
use crate::error::VarToolsError;

/// Smallest singular-value ratio of the covariance accepted for sampling.
const CONDITION_FLOOR: f64 = 1e-12;

/// Simulate `paths` cumulative value paths of `days` steps; output is `days x paths`.
pub fn simulate_portfolio(
  prices: &PriceTable,
  weights: &[f64],
  days: usize,
  paths: usize,
  seed: u64,
) -> Result<Array2<f64>> {
  validate_same_length(prices.n_assets(), weights.len(), "weights")?;
  if days == 0 || paths == 0 {
    return Err(VarToolsError::InvalidParameter(format!(
      "need at least one day and one path, got {days} x {paths}"
    )));
  }

  let returns = prices.returns()?;
  let mean = returns.mean();
  let covariance = returns.covariance();
  // a PSD-but-singular matrix can still pass Cholesky on rounding noise
  if covariance.is_near_singular(CONDITION_FLOOR) {
    return Err(VarToolsError::NumericalDegeneracy(
      "return covariance is singular, assets are linearly dependent".to_string(),
    ));
  }
  let chol = covariance
    .to_dmatrix()
    .cholesky()
    .ok_or_else(|| {
      VarToolsError::NumericalDegeneracy(
        "return covariance is not positive definite".to_string(),
      )
    })?;

  // wᵀ L z == (Lᵀ w) · z
  let w = DVector::from_column_slice(weights);
  let loadings = chol.l().transpose() * &w;
  let drift: f64 = mean.iter().zip(weights).map(|(m, w)| m * w).sum();
  debug!(drift, days, paths, "simulating portfolio paths");

  let n = weights.len();
  let mut rng = StdRng::seed_from_u64(seed);
  let mut out = Array2::<f64>::zeros((days, paths));
  let mut z = vec![0.0; n];

  for path in 0..paths {
    let mut value = 1.0;
    for day in 0..days {
      for zi in z.iter_mut() {
        *zi = StandardNormal.sample(&mut rng);
      }
      let shock: f64 = loadings.iter().zip(&z).map(|(l, zi)| l * zi).sum();
      value *= 1.0 + drift + shock;
      out[[day, path]] = value;
    }
  }

  Ok(out)
}

#[cfg(test)]
mod tests {
  use chrono::Days;
  use chrono::NaiveDate;

  use super::*;

  fn prices() -> PriceTable {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let dates = (0..40).map(|i| start + Days::new(i)).collect();
    let a = (0..40).map(|i| 100.0 * (1.0 + 0.02 * (0.7 * i as f64).sin())).collect();
    let b = (0..40).map(|i| 50.0 * (1.0 + 0.03 * (0.4 * i as f64).cos())).collect();
    PriceTable::from_columns(dates, vec![("A", a), ("B", b)]).unwrap()
  }

  #[test]
  fn shape_and_reproducibility() {
    let a = simulate_portfolio(&prices(), &[0.5, 0.5], 20, 50, 42).unwrap();
    let b = simulate_portfolio(&prices(), &[0.5, 0.5], 20, 50, 42).unwrap();
    let c = simulate_portfolio(&prices(), &[0.5, 0.5], 20, 50, 7).unwrap();

    assert_eq!(a.dim(), (20, 50));
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(a.iter().all(|v| v.is_finite() && *v > 0.0));
  }

  #[test]
  fn perfectly_correlated_assets_are_degenerate() {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let dates: Vec<_> = (0..10).map(|i| start + Days::new(i)).collect();
    let a: Vec<f64> = (0..10).map(|i| 10.0 + (i % 3) as f64).collect();
    let table = PriceTable::from_columns(dates, vec![("A", a.clone()), ("B", a)]).unwrap();

    assert!(matches!(
      simulate_portfolio(&table, &[0.5, 0.5], 5, 5, 1),
      Err(VarToolsError::NumericalDegeneracy(_))
    ));
  }

  #[test]
  fn scaled_copy_and_flat_price_are_degenerate() {
    let base = prices();
    let a = base.column("A").unwrap().to_vec();
    let b = base.column("B").unwrap().to_vec();
    let doubled: Vec<f64> = a.iter().map(|p| 2.0 * p).collect();
    let flat = vec![25.0; a.len()];
    let dates = base.dates().to_vec();

    let scaled = PriceTable::from_columns(
      dates.clone(),
      vec![("A", a), ("B", b.clone()), ("C", doubled)],
    )
    .unwrap();
    assert!(matches!(
      simulate_portfolio(&scaled, &[0.4, 0.3, 0.3], 5, 5, 1),
      Err(VarToolsError::NumericalDegeneracy(_))
    ));

    let constant = PriceTable::from_columns(dates, vec![("B", b), ("F", flat)]).unwrap();
    assert!(matches!(
      simulate_portfolio(&constant, &[0.5, 0.5], 5, 5, 1),
      Err(VarToolsError::NumericalDegeneracy(_))
    ));
  }

  #[test]
  fn rejects_empty_runs() {
    assert!(simulate_portfolio(&prices(), &[0.5, 0.5], 0, 10, 1).is_err());
    assert!(simulate_portfolio(&prices(), &[1.0], 10, 10, 1).is_err());
  }
}
