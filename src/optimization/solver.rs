//! # Projected Gradient on the Capped Simplex
//!
//! $$
//! \mathbf w_{k+1} = \Pi_{\Delta}\!\left(\mathbf w_k - t_k \nabla f(\mathbf w_k)\right),
//! \qquad
//! \Delta = \{\, l \le w_i \le u,\ \textstyle\sum_i w_i = 1 \,\}
//! $$
//!
//! Barzilai-Borwein step lengths with Armijo backtracking along the projection arc,
//! driven by argmin's [`Executor`]. A run converges once the fixed-step residual
//! $\lVert \mathbf w - \Pi_{\Delta}(\mathbf w - s_0 \nabla f(\mathbf w)) \rVert_\infty$
//! falls below tolerance, with $s_0$ the (capped) reciprocal of the largest starting
//! gradient entry.
//! The projection solves $\sum_i \operatorname{clip}(v_i - \tau, l, u) = 1$ for
//! the shift $\tau$ by bisection.

use argmin::core::CostFunction;
use argmin::core::Error;
use argmin::core::Executor;
use argmin::core::Gradient;
use argmin::core::IterState;
use argmin::core::Problem;
use argmin::core::Solver;
use argmin::core::TerminationReason;
use argmin::core::TerminationStatus;
use argmin::core::KV;

use super::types::ConvergenceStatus;
use crate::config::OptimizerConfig;
use crate::error::Result;
use crate::error::VarToolsError;

const ARMIJO_C: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 60;
const MIN_STEP: f64 = 1e-12;
const MAX_STEP: f64 = 1e12;
/// Keeps rounding-level starting gradients from inflating the residual.
const MAX_RESIDUAL_STEP: f64 = 1e6;
const BISECTION_ITERS: usize = 200;

/// Iteration state of [`ProjectedGradient`]: weights, gradient and cost.
pub type GradientState = IterState<Vec<f64>, Vec<f64>, (), (), (), f64>;

fn dot(a: &[f64], b: &[f64]) -> f64 {
  a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
  a.iter()
    .zip(b.iter())
    .map(|(x, y)| (x - y).abs())
    .fold(0.0, f64::max)
}

/// Euclidean projection of `v` onto `{lo ≤ w ≤ hi, Σw = 1}`.
pub fn project_capped_simplex(v: &[f64], lo: f64, hi: f64) -> Result<Vec<f64>> {
  let n = v.len() as f64;
  if v.is_empty() || n * lo > 1.0 || n * hi < 1.0 || lo > hi {
    return Err(VarToolsError::InvalidParameter(format!(
      "no weights of length {} sum to one within [{lo}, {hi}]",
      v.len()
    )));
  }
  if v.iter().any(|x| !x.is_finite()) {
    return Err(VarToolsError::NumericalDegeneracy(
      "non-finite point passed to the simplex projection".to_string(),
    ));
  }

  let clipped_sum = |tau: f64| v.iter().map(|&x| (x - tau).clamp(lo, hi)).sum::<f64>();
  let v_min = v.iter().copied().fold(f64::INFINITY, f64::min);
  let v_max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);

  // clipped_sum(low) >= 1 >= clipped_sum(high)
  let mut low = v_min - 1.0;
  let mut high = v_max - lo;
  for _ in 0..BISECTION_ITERS {
    let mid = 0.5 * (low + high);
    if mid <= low || mid >= high {
      break;
    }
    if clipped_sum(mid) > 1.0 {
      low = mid;
    } else {
      high = mid;
    }
  }

  let tau = 0.5 * (low + high);
  Ok(v.iter().map(|&x| (x - tau).clamp(lo, hi)).collect())
}

/// Result of a constrained solver run.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverReport {
  /// Best feasible iterate seen.
  pub param: Vec<f64>,
  pub cost: f64,
  pub iterations: u64,
  pub status: ConvergenceStatus,
}

impl SolverReport {
  /// Read the best iterate and termination reason off a finished argmin state.
  pub(crate) fn from_state<G>(mut state: IterState<Vec<f64>, G, (), (), (), f64>) -> Result<Self> {
    let status = match &state.termination_status {
      TerminationStatus::Terminated(TerminationReason::SolverConverged) => ConvergenceStatus::Converged,
      TerminationStatus::Terminated(TerminationReason::MaxItersReached) => {
        ConvergenceStatus::MaxIterations
      }
      TerminationStatus::Terminated(TerminationReason::SolverExit(reason)) => {
        ConvergenceStatus::Stalled(reason.clone())
      }
      TerminationStatus::Terminated(reason) => ConvergenceStatus::Stalled(reason.text().to_string()),
      TerminationStatus::NotTerminated => {
        ConvergenceStatus::Stalled("solver stopped without a termination reason".to_string())
      }
    };
    let param = state.take_best_param().ok_or_else(|| {
      VarToolsError::NumericalDegeneracy("solver finished without a finite iterate".to_string())
    })?;

    Ok(Self {
      param,
      cost: state.best_cost,
      iterations: state.iter,
      status,
    })
  }
}

/// Unwrap crate errors raised inside argmin callbacks.
pub(crate) fn solver_error(err: Error) -> VarToolsError {
  err.downcast::<VarToolsError>().unwrap_or_else(VarToolsError::Solver)
}

/// First-order solver for smooth objectives over the capped simplex.
#[derive(Clone, Debug)]
pub struct ProjectedGradient {
  lower: f64,
  upper: f64,
  max_iters: u64,
  tol_residual: f64,
  tol_step: f64,
  step: f64,
  residual_step: f64,
  residual: f64,
  stall: Option<String>,
}

impl ProjectedGradient {
  pub fn new(bounds: (f64, f64), config: &OptimizerConfig) -> Self {
    Self {
      lower: bounds.0,
      upper: bounds.1,
      max_iters: config.max_iters,
      tol_residual: config.tol_residual,
      tol_step: config.tol_step,
      step: 1.0,
      residual_step: 1.0,
      residual: f64::INFINITY,
      stall: None,
    }
  }

  pub fn project(&self, v: &[f64]) -> Result<Vec<f64>> {
    project_capped_simplex(v, self.lower, self.upper)
  }

  /// `max|x - Π(x - s₀g)|`, zero exactly at a KKT point.
  fn residual_at(&self, x: &[f64], g: &[f64]) -> Result<f64> {
    let shifted: Vec<f64> = x.iter().zip(g).map(|(xi, gi)| xi - self.residual_step * gi).collect();
    Ok(max_abs_diff(x, &self.project(&shifted)?))
  }

  /// Minimize `problem` from `x0`; the starting point is projected first.
  pub fn minimize<O>(self, problem: O, x0: &[f64]) -> Result<SolverReport>
  where
    O: CostFunction<Param = Vec<f64>, Output = f64> + Gradient<Param = Vec<f64>, Gradient = Vec<f64>>,
  {
    let max_iters = self.max_iters;
    let result = Executor::new(problem, self)
      .configure(|state| state.param(x0.to_vec()).max_iters(max_iters))
      .run()
      .map_err(solver_error)?;
    SolverReport::from_state(result.state)
  }
}

impl<O> Solver<O, GradientState> for ProjectedGradient
where
  O: CostFunction<Param = Vec<f64>, Output = f64> + Gradient<Param = Vec<f64>, Gradient = Vec<f64>>,
{
  const NAME: &'static str = "Projected gradient";

  fn init(
    &mut self,
    problem: &mut Problem<O>,
    mut state: GradientState,
  ) -> std::result::Result<(GradientState, Option<KV>), Error> {
    let x0 = state.take_param().ok_or_else(|| {
      VarToolsError::InvalidParameter("projected gradient needs a starting point".to_string())
    })?;
    let x = self.project(&x0)?;
    let f = problem.cost(&x)?;
    if !f.is_finite() {
      return Err(
        VarToolsError::NumericalDegeneracy(format!("objective is {f} at the starting point")).into(),
      );
    }
    let g = problem.gradient(&x)?;

    let g_max = g.iter().map(|v| v.abs()).fold(0.0, f64::max);
    self.step = if g_max > 0.0 {
      (1.0 / g_max).clamp(MIN_STEP, MAX_STEP)
    } else {
      1.0
    };
    self.residual_step = self.step.min(MAX_RESIDUAL_STEP);
    self.residual = self.residual_at(&x, &g)?;
    self.stall = None;

    Ok((state.param(x).cost(f).gradient(g), None))
  }

  fn next_iter(
    &mut self,
    problem: &mut Problem<O>,
    mut state: GradientState,
  ) -> std::result::Result<(GradientState, Option<KV>), Error> {
    let missing = || VarToolsError::NumericalDegeneracy("iterate missing from solver state".to_string());
    let x = state.take_param().ok_or_else(missing)?;
    let g = state.take_gradient().ok_or_else(missing)?;
    let f = state.get_cost();
    // rounding noise in f must not block acceptance next to the optimum
    let slack = 4.0 * f64::EPSILON * f.abs();

    let mut t = self.step;
    let mut accepted = None;
    for _ in 0..MAX_BACKTRACKS {
      let shifted: Vec<f64> = x.iter().zip(&g).map(|(xi, gi)| xi - t * gi).collect();
      let trial = self.project(&shifted)?;
      let direction: Vec<f64> = trial.iter().zip(&x).map(|(a, b)| a - b).collect();
      let f_trial = problem.cost(&trial)?;

      if f_trial.is_finite() && f_trial <= f + ARMIJO_C * dot(&g, &direction) + slack {
        accepted = Some((trial, f_trial));
        break;
      }
      t *= 0.5;
    }

    let Some((x_new, f_new)) = accepted else {
      self.stall = Some("line search found no descent".to_string());
      return Ok((state.param(x).cost(f).gradient(g), None));
    };

    let g_new = problem.gradient(&x_new)?;
    let s: Vec<f64> = x_new.iter().zip(&x).map(|(a, b)| a - b).collect();
    let y: Vec<f64> = g_new.iter().zip(&g).map(|(a, b)| a - b).collect();
    let sy = dot(&s, &y);
    self.step = if sy > 0.0 {
      (dot(&s, &s) / sy).clamp(MIN_STEP, MAX_STEP)
    } else {
      (2.0 * t).min(MAX_STEP)
    };

    self.residual = self.residual_at(&x_new, &g_new)?;
    if max_abs_diff(&x_new, &x) < self.tol_step && self.residual >= self.tol_residual {
      self.stall = Some(format!(
        "step length collapsed with projected gradient residual {:.3e}",
        self.residual
      ));
    }

    Ok((state.param(x_new).cost(f_new).gradient(g_new), None))
  }

  fn terminate(&mut self, _state: &GradientState) -> TerminationStatus {
    if self.residual < self.tol_residual {
      return TerminationStatus::Terminated(TerminationReason::SolverConverged);
    }
    match &self.stall {
      Some(reason) => TerminationStatus::Terminated(TerminationReason::SolverExit(reason.clone())),
      None => TerminationStatus::NotTerminated,
    }
  }
}

/// Forward differences of `f` at `x`.
#[cfg(test)]
pub(crate) fn forward_difference<F>(x: &[f64], step: f64, f: F) -> Vec<f64>
where
  F: Fn(&[f64]) -> f64,
{
  let f0 = f(x);
  let mut shifted = x.to_vec();
  (0..x.len())
    .map(|i| {
      shifted[i] += step;
      let f_plus = f(&shifted);
      shifted[i] = x[i];
      (f_plus - f0) / step
    })
    .collect()
}
