//! # Portfolio
//!
//! $$
//! V_T = V_0 \prod_{t=1}^{T} \left(1 + \mathbf w^\top r_t\right)
//! $$
//!
//! Trade lists for moving between allocations, and simulated value paths.

pub mod rebalance;
pub mod simulation;

pub use rebalance::rebalance_trades;
pub use rebalance::RebalancePlan;
pub use rebalance::RebalanceRow;
pub use simulation::simulate_portfolio;
