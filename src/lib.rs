//! # vartools
//!
//! $$
//! \mathrm{VaR}_\alpha = -Q_{1-\alpha}(R_p), \qquad
//! \mathrm{CVaR}_\alpha = -\mathbb E\left[R_p \mid R_p < Q_{1-\alpha}(R_p)\right]
//! $$
//!
//! Historical tail-risk metrics, six constrained portfolio optimizers and a
//! rolling out-of-sample backtest that re-optimizes at fixed calendar intervals.
//!
//! ```ignore
//! use vartools::backtest::DynamicBacktest;
//! use vartools::config::BacktestConfig;
//!
//! let result = DynamicBacktest::new(prices, benchmark, BacktestConfig::default())?.run()?;
//! for series in result.series_iter() {
//!   println!("{}: {:.2}", series.strategy, series.values.last().unwrap());
//! }
//! ```

pub mod backtest;
pub mod config;
pub mod data;
pub mod error;
pub mod optimization;
pub mod portfolio;
pub mod risk;

pub use backtest::BacktestResult;
pub use backtest::DynamicBacktest;
pub use config::BacktestConfig;
pub use config::OptimizerConfig;
pub use data::PriceTable;
pub use data::ReturnMatrix;
pub use error::Result;
pub use error::VarToolsError;
pub use optimization::PortfolioOptimizer;
pub use optimization::Strategy;
pub use risk::Position;
