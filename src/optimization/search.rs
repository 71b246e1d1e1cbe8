//! # Lattice-Seeded Simplex Search
//!
//! $$
//! \tilde f(\mathbf x) = f\big(\Pi_{\Delta}(\mathbf x)\big) + \lVert \mathbf x - \Pi_{\Delta}(\mathbf x) \rVert_2^2
//! $$
//!
//! Derivative-free minimization for the piecewise-linear tail objectives, whose
//! gradients jump whenever a day enters or leaves the tail. A scan of the
//! lattice $\{\mathbf c / k : c_i \in \mathbb N, \sum_i c_i = k\}$ picks the seed,
//! then Nelder-Mead polishes it on the projected parameterisation above and
//! restarts with a smaller simplex while that still pays off.

use argmin::core::CostFunction;
use argmin::core::Error;
use argmin::core::Executor;
use argmin::solver::neldermead::NelderMead;
use tracing::trace;

use super::solver::project_capped_simplex;
use super::solver::solver_error;
use super::solver::SolverReport;
use crate::config::OptimizerConfig;
use crate::error::Result;
use crate::error::VarToolsError;

/// Finest lattice resolution scanned.
const MAX_LATTICE_STEPS: usize = 60;
/// Extra Nelder-Mead runs after the first, each with a quarter of the previous edge.
const RESTARTS: usize = 3;
/// Cost handed to Nelder-Mead where the objective is undefined.
const PENALTY_CEILING: f64 = 1e12;

/// Objective composed with the simplex projection plus the squared projection distance.
struct Projected<'a, O> {
  inner: &'a O,
  lower: f64,
  upper: f64,
}

impl<O> CostFunction for Projected<'_, O>
where
  O: CostFunction<Param = Vec<f64>, Output = f64>,
{
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, Error> {
    let Ok(w) = project_capped_simplex(x, self.lower, self.upper) else {
      return Ok(PENALTY_CEILING);
    };
    let distance: f64 = x.iter().zip(&w).map(|(a, b)| (a - b).powi(2)).sum();
    match self.inner.cost(&w) {
      Ok(f) if f.is_finite() => Ok(f + distance),
      _ => Ok(PENALTY_CEILING),
    }
  }
}

/// `C(n - 1 + k, n - 1)`, the number of ways to split `k` units over `n` assets.
fn lattice_size(n: usize, k: usize) -> f64 {
  let r = (n - 1).min(k);
  (1..=r).fold(1.0, |acc, i| acc * (n - 1 + k - r + i) as f64 / i as f64)
}

/// Finest resolution whose lattice fits in `budget` points; never below one.
fn lattice_resolution(n: usize, budget: usize) -> usize {
  let mut k = 1;
  while k < MAX_LATTICE_STEPS && lattice_size(n, k + 1) <= budget as f64 {
    k += 1;
  }
  k
}

/// Visit every split of `k` units over `parts.len()` slots.
fn for_each_composition<F>(parts: &mut [usize], slot: usize, remaining: usize, visit: &mut F)
where
  F: FnMut(&[usize]),
{
  if slot + 1 == parts.len() {
    parts[slot] = remaining;
    visit(parts);
    return;
  }
  for units in 0..=remaining {
    parts[slot] = units;
    for_each_composition(parts, slot + 1, remaining - units, visit);
  }
}

/// Nelder-Mead over the capped simplex, seeded from a weight lattice.
#[derive(Clone, Debug)]
pub struct SimplexSearch {
  lower: f64,
  upper: f64,
  max_iters: u64,
  tol_spread: f64,
  lattice_budget: usize,
}

impl SimplexSearch {
  pub fn new(bounds: (f64, f64), config: &OptimizerConfig) -> Self {
    Self {
      lower: bounds.0,
      upper: bounds.1,
      max_iters: config.max_iters,
      tol_spread: config.tol_spread,
      lattice_budget: config.lattice_budget,
    }
  }

  fn evaluate<O>(problem: &O, w: &Vec<f64>) -> Result<f64>
  where
    O: CostFunction<Param = Vec<f64>, Output = f64>,
  {
    problem.cost(w).map_err(solver_error)
  }

  /// Best lattice point inside the bounds, with `x0` as an extra candidate.
  fn seed<O>(&self, problem: &O, x0: Vec<f64>) -> Result<(Vec<f64>, f64, usize)>
  where
    O: CostFunction<Param = Vec<f64>, Output = f64>,
  {
    let n = x0.len();
    let k = lattice_resolution(n, self.lattice_budget);
    let mut best = (x0.clone(), Self::evaluate(problem, &x0)?);
    let mut failure = None;

    let mut parts = vec![0; n];
    for_each_composition(&mut parts, 0, k, &mut |units: &[usize]| {
      if failure.is_some() {
        return;
      }
      let w: Vec<f64> = units.iter().map(|&c| c as f64 / k as f64).collect();
      if w.iter().any(|&x| x < self.lower || x > self.upper) {
        return;
      }
      match Self::evaluate(problem, &w) {
        Ok(f) if f.is_finite() && (f < best.1 || !best.1.is_finite()) => best = (w, f),
        Ok(_) => {}
        Err(err) => failure = Some(err),
      }
    });
    if let Some(err) = failure {
      return Err(err);
    }

    if !best.1.is_finite() {
      return Err(VarToolsError::NumericalDegeneracy(
        "objective is undefined on every lattice point".to_string(),
      ));
    }
    Ok((best.0, best.1, k))
  }

  /// Minimize `problem`; `x0` joins the lattice as a seed candidate after projection.
  pub fn minimize<O>(&self, problem: &O, x0: &[f64]) -> Result<SolverReport>
  where
    O: CostFunction<Param = Vec<f64>, Output = f64>,
  {
    let x0 = project_capped_simplex(x0, self.lower, self.upper)?;
    let (mut best_w, mut best_f, k) = self.seed(problem, x0)?;
    trace!(resolution = k, cost = best_f, "lattice seed");

    let mut edge = 1.0 / k as f64;
    let mut iterations = 0;
    let mut report = None;
    for _ in 0..=RESTARTS {
      let mut simplex = vec![best_w.clone()];
      for i in 0..best_w.len() {
        let mut vertex = best_w.clone();
        vertex[i] += edge;
        simplex.push(vertex);
      }
      let solver = NelderMead::new(simplex)
        .with_sd_tolerance(self.tol_spread)
        .map_err(solver_error)?;
      let projected = Projected {
        inner: problem,
        lower: self.lower,
        upper: self.upper,
      };
      let result = Executor::new(projected, solver)
        .configure(|state| state.max_iters(self.max_iters))
        .run()
        .map_err(solver_error)?;

      let run = SolverReport::from_state(result.state)?;
      iterations += run.iterations;
      let w = project_capped_simplex(&run.param, self.lower, self.upper)?;
      let f = Self::evaluate(problem, &w)?;
      let improved = f < best_f - self.tol_spread;
      if f < best_f {
        best_w = w;
        best_f = f;
      }
      report = Some(run.status);
      if !improved {
        break;
      }
      edge *= 0.25;
    }

    let status = report.ok_or_else(|| {
      VarToolsError::NumericalDegeneracy("simplex search ran no rounds".to_string())
    })?;
    Ok(SolverReport {
      param: best_w,
      cost: best_f,
      iterations,
      status,
    })
  }
}
