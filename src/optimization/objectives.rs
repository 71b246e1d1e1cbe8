//! # Objectives
//!
//! $$
//! f_{\mathrm{var}} = \mathbf w^\top C \mathbf w,\quad
//! f_{\mathrm{SR}} = -\frac{252\,\mu^\top\mathbf w - r_f}{\sqrt{252\,\mathbf w^\top C \mathbf w}},\quad
//! f_{\Omega} = -\sum_i \frac{\sigma^+_i}{\sigma^-_i} w_i
//! $$
//!
//! Minimized forms of the six allocation objectives as argmin problems. The
//! smooth ones carry analytic gradients; the two tail objectives are cost-only.

use argmin::core::CostFunction;
use argmin::core::Error;
use argmin::core::Gradient;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;

use crate::data::stats::masked_mean;
use crate::data::stats::sample_std;
use crate::data::CovarianceMatrix;
use crate::error::Result;
use crate::error::VarToolsError;
use crate::risk::contributions::contributions_on;
use crate::risk::contributions::tail_days;

/// Smallest portfolio variance the Sharpe ratio divides by.
const VARIANCE_FLOOR: f64 = 1e-16;

/// Quadratic form `wᵀ K w` with kernel `K`; covers variance and target semivariance.
#[derive(Clone, Debug)]
pub struct QuadraticRisk {
  kernel: CovarianceMatrix,
}

impl QuadraticRisk {
  pub fn new(kernel: CovarianceMatrix) -> Self {
    Self { kernel }
  }

  /// `S = (σ⁻ σ⁻ᵀ) ∘ ρ` built from benchmark-relative downside deviations.
  pub fn target_semivariance(
    returns: &Array2<f64>,
    benchmark: &Array1<f64>,
    correlation: &Array2<f64>,
  ) -> Result<Self> {
    let (downside, _) = target_deviations(returns, benchmark)?;
    let n = downside.len();
    let kernel = Array2::from_shape_fn((n, n), |(i, j)| {
      downside[i] * downside[j] * correlation[[i, j]]
    });
    CovarianceMatrix::from_array(kernel).map(Self::new)
  }

  pub fn kernel(&self) -> &CovarianceMatrix {
    &self.kernel
  }
}

impl CostFunction for QuadraticRisk {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, w: &Self::Param) -> std::result::Result<Self::Output, Error> {
    Ok(self.kernel.quadratic_form(w))
  }
}

impl Gradient for QuadraticRisk {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, w: &Self::Param) -> std::result::Result<Self::Gradient, Error> {
    Ok(self.kernel.times(w).into_iter().map(|v| 2.0 * v).collect())
  }
}

/// Negative annualized Sharpe ratio.
#[derive(Clone, Debug)]
pub struct NegativeSharpe {
  mean: Vec<f64>,
  covariance: CovarianceMatrix,
  risk_free_rate: f64,
  trading_days: f64,
}

impl NegativeSharpe {
  pub fn new(
    mean: Vec<f64>,
    covariance: CovarianceMatrix,
    risk_free_rate: f64,
    trading_days: f64,
  ) -> Self {
    Self {
      mean,
      covariance,
      risk_free_rate,
      trading_days,
    }
  }

  fn excess_and_vol(&self, w: &[f64]) -> (f64, f64, bool) {
    let excess = self.trading_days * self.mean.iter().zip(w).map(|(m, x)| m * x).sum::<f64>()
      - self.risk_free_rate;
    let variance = self.covariance.quadratic_form(w);
    let floored = variance < VARIANCE_FLOOR;
    let vol = (self.trading_days * variance.max(VARIANCE_FLOOR)).sqrt();
    (excess, vol, floored)
  }
}

impl CostFunction for NegativeSharpe {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, w: &Self::Param) -> std::result::Result<Self::Output, Error> {
    let (excess, vol, _) = self.excess_and_vol(w);
    Ok(-excess / vol)
  }
}

impl Gradient for NegativeSharpe {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, w: &Self::Param) -> std::result::Result<Self::Gradient, Error> {
    let (excess, vol, floored) = self.excess_and_vol(w);
    let cw = self.covariance.times(w);
    let vol3 = vol * vol * vol;

    Ok(
      self
        .mean
        .iter()
        .zip(cw)
        .map(|(m, c)| {
          let risk_term = if floored {
            0.0
          } else {
            excess * self.trading_days * c / vol3
          };
          -self.trading_days * m / vol + risk_term
        })
        .collect(),
    )
  }
}

/// Negative benchmark-relative Omega score `-Σ (σ⁺ᵢ/σ⁻ᵢ) wᵢ`.
#[derive(Clone, Debug)]
pub struct NegativeOmega {
  ratios: Vec<f64>,
}

impl NegativeOmega {
  pub fn new(returns: &Array2<f64>, benchmark: &Array1<f64>) -> Result<Self> {
    let (downside, upside) = target_deviations(returns, benchmark)?;
    let ratios = downside
      .iter()
      .zip(&upside)
      .enumerate()
      .map(|(i, (&down, &up))| {
        if down > 0.0 && down.is_finite() {
          Ok(up / down)
        } else {
          Err(VarToolsError::NumericalDegeneracy(format!(
            "asset {i} has no downside deviation against the benchmark, Omega ratio undefined"
          )))
        }
      })
      .collect::<Result<Vec<_>>>()?;
    Ok(Self { ratios })
  }

  pub fn ratios(&self) -> &[f64] {
    &self.ratios
  }
}

impl CostFunction for NegativeOmega {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, w: &Self::Param) -> std::result::Result<Self::Output, Error> {
    Ok(-self.ratios.iter().zip(w).map(|(o, x)| o * x).sum::<f64>())
  }
}

impl Gradient for NegativeOmega {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, _w: &Self::Param) -> std::result::Result<Self::Gradient, Error> {
    Ok(self.ratios.iter().map(|o| -o).collect())
  }
}

/// Negative mean of portfolio returns at or below the `(100 - α)` percentile.
#[derive(Clone, Debug)]
pub struct TailLoss {
  returns: Array2<f64>,
  alpha: f64,
}

impl TailLoss {
  pub fn new(returns: Array2<f64>, alpha: f64) -> Self {
    Self { returns, alpha }
  }

  fn value(&self, w: &[f64]) -> f64 {
    let portfolio = self.returns.dot(&Array1::from(w.to_vec())).to_vec();
    let days = tail_days(&portfolio, self.alpha, true);
    masked_mean(&portfolio, &days).map_or(f64::NAN, |m| -m)
  }
}

impl CostFunction for TailLoss {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, w: &Self::Param) -> std::result::Result<Self::Output, Error> {
    Ok(self.value(w))
  }
}

/// Largest single-asset CVaR contribution on the portfolio's inclusive tail days.
#[derive(Clone, Debug)]
pub struct MaxTailContribution {
  returns: Array2<f64>,
  alpha: f64,
}

impl MaxTailContribution {
  pub fn new(returns: Array2<f64>, alpha: f64) -> Self {
    Self { returns, alpha }
  }

  fn value(&self, w: &[f64]) -> f64 {
    let portfolio = self.returns.dot(&Array1::from(w.to_vec())).to_vec();
    let days = tail_days(&portfolio, self.alpha, true);
    contributions_on(&self.returns, w, &days)
      .into_iter()
      .fold(f64::NEG_INFINITY, f64::max)
  }
}

impl CostFunction for MaxTailContribution {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, w: &Self::Param) -> std::result::Result<Self::Output, Error> {
    Ok(self.value(w))
  }
}

/// Per-asset sample deviations of the benchmark-relative shortfalls and excesses.
///
/// Periods on the other side of the target count as zero.
pub(crate) fn target_deviations(
  returns: &Array2<f64>,
  benchmark: &Array1<f64>,
) -> Result<(Vec<f64>, Vec<f64>)> {
  if returns.nrows() != benchmark.len() {
    return Err(VarToolsError::InvalidParameter(format!(
      "benchmark has length {}, expected {}",
      benchmark.len(),
      returns.nrows()
    )));
  }

  let mut downside = Vec::with_capacity(returns.ncols());
  let mut upside = Vec::with_capacity(returns.ncols());
  for column in returns.axis_iter(Axis(1)) {
    let diffs: Vec<f64> = column.iter().zip(benchmark).map(|(r, b)| r - b).collect();
    let below: Vec<f64> = diffs.iter().map(|&d| d.min(0.0)).collect();
    let above: Vec<f64> = diffs.iter().map(|&d| d.max(0.0)).collect();
    downside.push(sample_std(&below));
    upside.push(sample_std(&above));
  }

  Ok((downside, upside))
}
