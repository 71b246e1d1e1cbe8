//! # Sample Statistics
//!
//! $$
//! Q(p) = x_{(\lfloor h \rfloor)} + (h - \lfloor h \rfloor)\,\big(x_{(\lceil h \rceil)} - x_{(\lfloor h \rfloor)}\big),
//! \qquad h = (n-1)\,p
//! $$
//!
//! Rank statistics and tail means shared by the risk and optimization layers.

use statrs::statistics::Statistics;

#[inline]
fn lerp(lower: f64, upper: f64, weight: f64) -> f64 {
  let diff = upper - lower;
  if weight >= 0.5 {
    upper - diff * (1.0 - weight)
  } else {
    lower + diff * weight
  }
}

/// Percentile of `values` with linear interpolation between closest ranks.
///
/// `q` is expressed in percent and clamped to `[0, 100]`. Returns `NaN` for an
/// empty sample.
pub fn percentile(values: &[f64], q: f64) -> f64 {
  if values.is_empty() {
    return f64::NAN;
  }

  let mut sorted = values.to_vec();
  let position = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
  let lower_index = position.floor() as usize;
  let upper_index = position.ceil() as usize;

  if lower_index == upper_index {
    let (_, value, _) = sorted.select_nth_unstable_by(lower_index, f64::total_cmp);
    return *value;
  }

  let (lower_partition, upper_value, _) =
    sorted.select_nth_unstable_by(upper_index, f64::total_cmp);
  let upper_value = *upper_value;
  let (_, lower_value, _) = lower_partition.select_nth_unstable_by(lower_index, f64::total_cmp);

  lerp(*lower_value, upper_value, position - lower_index as f64)
}

/// Mean of the values selected by `mask`, `None` when nothing is selected.
pub fn masked_mean<'a>(
  values: impl IntoIterator<Item = &'a f64>,
  mask: &[bool],
) -> Option<f64> {
  let selected: Vec<f64> = values
    .into_iter()
    .zip(mask.iter())
    .filter(|(_, keep)| **keep)
    .map(|(&v, _)| v)
    .collect();

  if selected.is_empty() {
    None
  } else {
    Some(selected.mean())
  }
}

/// Sample standard deviation (`n - 1` denominator).
pub fn sample_std<'a>(values: impl IntoIterator<Item = &'a f64>) -> f64 {
  values.into_iter().std_dev()
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn percentile_interpolates_between_ranks() {
    let xs = [0.01, -0.02, 0.03, -0.05, 0.0, 0.02];
    assert_abs_diff_eq!(percentile(&xs, 5.0), -0.0425, epsilon = 1e-15);
    assert_abs_diff_eq!(percentile(&xs, 50.0), 0.005, epsilon = 1e-15);
    assert_abs_diff_eq!(percentile(&xs, 95.0), 0.0275, epsilon = 1e-15);
  }

  #[test]
  fn percentile_endpoints_hit_extremes() {
    let xs = [3.0, 1.0, 2.0];
    assert_eq!(percentile(&xs, 0.0), 1.0);
    assert_eq!(percentile(&xs, 100.0), 3.0);
    assert_eq!(percentile(&xs, 50.0), 2.0);
    assert!(percentile(&[], 50.0).is_nan());
  }

  #[test]
  fn masked_mean_ignores_unselected() {
    let xs = [1.0, 2.0, 3.0, 4.0];
    assert_eq!(masked_mean(&xs, &[true, false, true, false]), Some(2.0));
    assert_eq!(masked_mean(&xs, &[false; 4]), None);
  }

  #[test]
  fn sample_std_uses_unbiased_estimator() {
    let xs = [1.0, 2.0, 3.0, 4.0];
    assert_abs_diff_eq!(sample_std(&xs), (5.0f64 / 3.0).sqrt(), epsilon = 1e-12);
  }
}
