//! # CVaR Contributions
//!
//! $$
//! c_i = -w_i\,\overline{r_{t,i}}\Big|_{t \in \mathcal T}, \qquad
//! \mathcal T = \{t : R_{p,t} < Q_{100-\alpha}(R_p)\}
//! $$
//!
//! The tail days $\mathcal T$ are fixed once from the portfolio stream and
//! reused for every asset, so the contributions need not add up to the
//! portfolio CVaR exactly.

use ndarray::Array2;
use ndarray::Axis;

use crate::data::stats::masked_mean;
use crate::data::stats::percentile;
use crate::data::ReturnMatrix;
use crate::error::validate_confidence;
use crate::error::Result;

/// Portfolio tail days on the long side; `inclusive` also keeps the boundary day.
pub(crate) fn tail_days(portfolio: &[f64], alpha: f64, inclusive: bool) -> Vec<bool> {
  let threshold = percentile(portfolio, 100.0 - alpha);
  portfolio
    .iter()
    .map(|&r| if inclusive { r <= threshold } else { r < threshold })
    .collect()
}

/// `-w_i` times asset `i`'s mean return over the masked days; 0 for an empty mask.
pub(crate) fn contributions_on(values: &Array2<f64>, weights: &[f64], days: &[bool]) -> Vec<f64> {
  values
    .axis_iter(Axis(1))
    .zip(weights)
    .map(|(col, &w)| masked_mean(col.iter(), days).map_or(0.0, |m| -m * w))
    .collect()
}

/// Per-asset contribution to the long-side portfolio CVaR at confidence `alpha` (percent).
pub fn cvar_contributions(returns: &ReturnMatrix, weights: &[f64], alpha: f64) -> Result<Vec<f64>> {
  validate_confidence(alpha, "alpha")?;
  let portfolio = returns.portfolio_returns(weights)?.to_vec();
  let days = tail_days(&portfolio, alpha, false);
  Ok(contributions_on(returns.values(), weights, &days))
}
