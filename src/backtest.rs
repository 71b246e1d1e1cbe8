//! # Backtest
//!
//! $$
//! \text{Initialize} \to \text{Optimize}(0) \to \text{Simulate}^{L} \to \text{Optimize}(1) \to \cdots \to \text{Terminal}
//! $$
//!
//! Rolling out-of-sample evaluation of the six allocation strategies.

pub mod engine;
pub mod schedule;

pub use engine::BacktestResult;
pub use engine::DynamicBacktest;
pub use engine::RebalanceRecord;
pub use engine::StrategySeries;
pub use engine::WindowStatus;
pub use schedule::RebalanceSchedule;
