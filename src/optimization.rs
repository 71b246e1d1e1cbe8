//! # Optimization
//!
//! $$
//! \mathbf w^\*_s = \arg\min_{\mathbf w \in \Delta_s} f_s(\mathbf w)
//! $$
//!
//! Constrained allocation over a single return window: min variance, max
//! Sharpe, min semivariance, max Omega, min CVaR and min CVaR contribution.

pub mod objectives;
pub mod optimizer;
pub mod search;
pub mod solver;
pub mod types;

pub use optimizer::PortfolioOptimizer;
pub use search::SimplexSearch;
pub use solver::project_capped_simplex;
pub use solver::ProjectedGradient;
pub use solver::SolverReport;
pub use types::ConvergenceStatus;
pub use types::OptimizationOutcome;
pub use types::Strategy;
pub use types::WeightTable;
