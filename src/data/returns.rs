//! # Return Matrices
//!
//! $$
//! \Sigma_{ij} = \frac{1}{T-1}\sum_{t=1}^{T}(r_{t,i}-\bar r_i)(r_{t,j}-\bar r_j)
//! $$
//!
//! Aligned simple-return matrices and the covariance/correlation kernels derived from them.

use std::collections::HashMap;

use chrono::NaiveDate;
use nalgebra::DMatrix;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;
use statrs::statistics::Statistics;

use super::prices::PriceTable;
use crate::error::validate_same_length;
use crate::error::Result;
use crate::error::VarToolsError;

/// `T x N` matrix of periodic simple returns on a shared ascending date index.
///
/// Rows containing a missing value are dropped on construction; at least two
/// complete observations must remain.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnMatrix {
  dates: Vec<NaiveDate>,
  tickers: Vec<String>,
  values: Array2<f64>,
}

impl ReturnMatrix {
  pub fn new(dates: Vec<NaiveDate>, tickers: Vec<String>, values: Array2<f64>) -> Result<Self> {
    if tickers.is_empty() {
      return Err(VarToolsError::InsufficientData(
        "empty asset universe".to_string(),
      ));
    }
    if values.dim() != (dates.len(), tickers.len()) {
      return Err(VarToolsError::InvalidParameter(format!(
        "return values have shape {:?}, expected ({}, {})",
        values.dim(),
        dates.len(),
        tickers.len()
      )));
    }

    let keep: Vec<usize> = values
      .outer_iter()
      .enumerate()
      .filter(|(_, row)| row.iter().all(|v| v.is_finite()))
      .map(|(i, _)| i)
      .collect();

    if keep.len() < 2 {
      return Err(VarToolsError::InsufficientData(format!(
        "need at least two complete return observations, got {}",
        keep.len()
      )));
    }

    let dates = keep.iter().map(|&i| dates[i]).collect();
    let values = if keep.len() == values.nrows() {
      values
    } else {
      values.select(Axis(0), &keep)
    };

    Ok(Self {
      dates,
      tickers,
      values,
    })
  }

  /// Simple returns of consecutive price rows, dated at the later row.
  pub fn from_prices(prices: &PriceTable) -> Result<Self> {
    if prices.len() < 2 {
      return Err(VarToolsError::InsufficientData(format!(
        "need at least two price rows, got {}",
        prices.len()
      )));
    }

    let p = prices.values();
    let mut values = Array2::<f64>::zeros((prices.len() - 1, prices.n_assets()));
    for t in 1..prices.len() {
      for j in 0..prices.n_assets() {
        values[[t - 1, j]] = p[[t, j]] / p[[t - 1, j]] - 1.0;
      }
    }

    Self::new(
      prices.dates()[1..].to_vec(),
      prices.tickers().to_vec(),
      values,
    )
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  pub fn values(&self) -> &Array2<f64> {
    &self.values
  }

  pub fn n_periods(&self) -> usize {
    self.values.nrows()
  }

  pub fn n_assets(&self) -> usize {
    self.values.ncols()
  }

  /// Per-asset mean return.
  pub fn mean(&self) -> Array1<f64> {
    self
      .values
      .axis_iter(Axis(1))
      .map(|col| col.iter().mean())
      .collect()
  }

  pub fn covariance(&self) -> CovarianceMatrix {
    CovarianceMatrix::from_returns(&self.values)
  }

  /// Pearson correlation matrix.
  pub fn correlation(&self) -> Array2<f64> {
    self.covariance().correlation()
  }

  /// Weighted sum of asset returns for every period.
  pub fn portfolio_returns(&self, weights: &[f64]) -> Result<Array1<f64>> {
    validate_same_length(self.n_assets(), weights.len(), "weights")?;
    Ok(self.values.dot(&Array1::from(weights.to_vec())))
  }

  /// Inner-join with the simple returns of a single-column benchmark table.
  ///
  /// Dates where either side is missing are dropped.
  pub fn align_with(&self, benchmark: &PriceTable) -> Result<(ReturnMatrix, Array1<f64>)> {
    let series = benchmark.single_series()?;
    let bench_returns: HashMap<NaiveDate, f64> = series
      .windows(2)
      .map(|pair| (pair[1].0, pair[1].1 / pair[0].1 - 1.0))
      .filter(|(_, r)| r.is_finite())
      .collect();

    if bench_returns.is_empty() {
      return Err(VarToolsError::InsufficientData(
        "benchmark has no valid returns (all NaN after alignment)".to_string(),
      ));
    }

    let keep: Vec<usize> = self
      .dates
      .iter()
      .enumerate()
      .filter(|(_, d)| bench_returns.contains_key(d))
      .map(|(i, _)| i)
      .collect();

    if keep.len() < 2 {
      return Err(VarToolsError::InsufficientData(format!(
        "only {} return observations align with the benchmark",
        keep.len()
      )));
    }

    let dates: Vec<NaiveDate> = keep.iter().map(|&i| self.dates[i]).collect();
    let bench = dates.iter().map(|d| bench_returns[d]).collect();
    let aligned = ReturnMatrix::new(
      dates,
      self.tickers.clone(),
      self.values.select(Axis(0), &keep),
    )?;

    Ok((aligned, bench))
  }
}

/// Symmetric positive semi-definite sample covariance matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct CovarianceMatrix(Array2<f64>);

impl CovarianceMatrix {
  /// Sample covariance of the columns of `values` (`n - 1` denominator).
  pub fn from_returns(values: &Array2<f64>) -> Self {
    let n = values.ncols();
    let mut cov = Array2::<f64>::zeros((n, n));

    for i in 0..n {
      for j in i..n {
        let c = values.column(i).iter().covariance(values.column(j).iter());
        cov[[i, j]] = c;
        cov[[j, i]] = c;
      }
    }

    Self(cov)
  }

  pub fn from_array(values: Array2<f64>) -> Result<Self> {
    if values.nrows() != values.ncols() {
      return Err(VarToolsError::InvalidParameter(format!(
        "covariance must be square, got {:?}",
        values.dim()
      )));
    }
    Ok(Self(values))
  }

  pub fn as_array(&self) -> &Array2<f64> {
    &self.0
  }

  pub fn dim(&self) -> usize {
    self.0.nrows()
  }

  /// `Σ w`
  pub fn times(&self, weights: &[f64]) -> Vec<f64> {
    self
      .0
      .outer_iter()
      .map(|row| row.iter().zip(weights).map(|(a, b)| a * b).sum())
      .collect()
  }

  /// `wᵀ Σ w`
  pub fn quadratic_form(&self, weights: &[f64]) -> f64 {
    self
      .times(weights)
      .iter()
      .zip(weights)
      .map(|(a, b)| a * b)
      .sum()
  }

  pub fn volatilities(&self) -> Vec<f64> {
    self.0.diag().iter().map(|v| v.max(0.0).sqrt()).collect()
  }

  /// Correlation matrix; assets without variance correlate 0 with everything else.
  pub fn correlation(&self) -> Array2<f64> {
    let n = self.dim();
    let sigmas = self.volatilities();

    Array2::from_shape_fn((n, n), |(i, j)| {
      let denom = sigmas[i] * sigmas[j];
      if i == j {
        1.0
      } else if denom > 1e-15 {
        (self.0[[i, j]] / denom).clamp(-1.0, 1.0)
      } else {
        0.0
      }
    })
  }

  /// Ratio of smallest to largest singular value falls below `tol`.
  pub fn is_near_singular(&self, tol: f64) -> bool {
    let n = self.dim();
    if n == 0 {
      return true;
    }

    let m = DMatrix::from_fn(n, n, |i, j| self.0[[i, j]]);
    let sv = m.singular_values();
    let max = sv.max();
    max <= 0.0 || sv.min() / max < tol
  }

  pub(crate) fn to_dmatrix(&self) -> DMatrix<f64> {
    let n = self.dim();
    DMatrix::from_fn(n, n, |i, j| self.0[[i, j]])
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  fn dates(n: usize) -> Vec<NaiveDate> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    (0..n).map(|i| start + chrono::Days::new(i as u64)).collect()
  }

  #[test]
  fn returns_drop_missing_rows() {
    let prices = PriceTable::from_columns(
      dates(5),
      vec![
        ("A", vec![100.0, 110.0, f64::NAN, 121.0, 133.1]),
        ("B", vec![50.0, 50.0, 55.0, 55.0, 60.5]),
      ],
    )
    .unwrap();

    let rets = prices.returns().unwrap();
    // rows dated day 2 and day 3 touch the missing price
    assert_eq!(rets.n_periods(), 2);
    assert_eq!(rets.dates(), &[dates(5)[1], dates(5)[4]]);
    assert_abs_diff_eq!(rets.values()[[0, 0]], 0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(rets.values()[[1, 1]], 0.1, epsilon = 1e-12);
  }

  #[test]
  fn single_row_is_insufficient() {
    let prices = PriceTable::from_columns(dates(2), vec![("A", vec![1.0, 1.1])]).unwrap();
    assert!(matches!(
      prices.returns(),
      Err(VarToolsError::InsufficientData(_))
    ));
  }

  #[test]
  fn covariance_matches_sample_definition() {
    let values = Array2::from_shape_vec(
      (4, 2),
      vec![0.01, 0.02, -0.01, -0.03, 0.02, 0.01, 0.0, 0.02],
    )
    .unwrap();
    let cov = CovarianceMatrix::from_returns(&values);

    let a = [0.01, -0.01, 0.02, 0.0];
    let b = [0.02, -0.03, 0.01, 0.02];
    let ma = a.iter().sum::<f64>() / 4.0;
    let mb = b.iter().sum::<f64>() / 4.0;
    let expected: f64 = a
      .iter()
      .zip(b.iter())
      .map(|(x, y)| (x - ma) * (y - mb))
      .sum::<f64>()
      / 3.0;

    assert_abs_diff_eq!(cov.as_array()[[0, 1]], expected, epsilon = 1e-15);
    assert_abs_diff_eq!(cov.as_array()[[1, 0]], expected, epsilon = 1e-15);
    assert_abs_diff_eq!(
      cov.quadratic_form(&[1.0, 0.0]),
      cov.as_array()[[0, 0]],
      epsilon = 1e-15
    );
  }

  #[test]
  fn perfectly_correlated_assets_are_near_singular() {
    let values = Array2::from_shape_vec(
      (4, 2),
      vec![0.01, 0.02, -0.01, -0.02, 0.02, 0.04, 0.0, 0.0],
    )
    .unwrap();
    let cov = CovarianceMatrix::from_returns(&values);
    assert!(cov.is_near_singular(1e-10));
    assert_abs_diff_eq!(cov.correlation()[[0, 1]], 1.0, epsilon = 1e-12);
  }

  #[test]
  fn benchmark_alignment_inner_joins_dates() {
    let d = dates(4);
    let prices = PriceTable::from_columns(
      d.clone(),
      vec![("A", vec![1.0, 1.1, 1.21, 1.331])],
    )
    .unwrap();
    let bench = PriceTable::from_columns(
      d.clone(),
      vec![("SPX", vec![10.0, f64::NAN, 10.0, 11.0])],
    )
    .unwrap();

    let rets = prices.returns().unwrap();
    let res = rets.align_with(&bench);
    // only the last date has a valid benchmark return
    assert!(matches!(res, Err(VarToolsError::InsufficientData(_))));

    let bench = PriceTable::from_columns(d, vec![("SPX", vec![10.0, 10.5, 10.0, 11.0])]).unwrap();
    let (aligned, b) = rets.align_with(&bench).unwrap();
    assert_eq!(aligned.n_periods(), 3);
    assert_abs_diff_eq!(b[2], 0.1, epsilon = 1e-12);
  }

  #[test]
  fn all_nan_benchmark_is_insufficient() {
    let d = dates(3);
    let prices = PriceTable::from_columns(d.clone(), vec![("A", vec![1.0, 1.1, 1.2])]).unwrap();
    let bench = PriceTable::from_columns(d, vec![("SPX", vec![f64::NAN; 3])]).unwrap();
    let err = prices.returns().unwrap().align_with(&bench).unwrap_err();
    assert!(matches!(err, VarToolsError::InsufficientData(_)));
  }
}
