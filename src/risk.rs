//! # Risk
//!
//! $$
//! \mathrm{VaR}_c = \left|Q_{100-c}(R_p)\right|, \qquad
//! \mathrm{CVaR}_c = \left|\,\overline{R_p \mid R_p < Q_{100-c}(R_p)}\,\right|
//! $$
//!
//! Historical tail-risk measures on weighted return streams, their cash
//! equivalents for stock, currency and bid/ask quoted books, and per-asset
//! CVaR contributions.

pub mod contributions;
pub mod historical;
pub mod liquidity;
pub mod report;

pub use contributions::cvar_contributions;
pub use historical::historical_cvar;
pub use historical::historical_var;
pub use historical::Position;
pub use liquidity::var_apl;
pub use liquidity::var_forex;
pub use liquidity::var_liquidity_adjusted;
pub use liquidity::var_stocks;
pub use report::RiskMeasure;
pub use report::RiskReport;
pub use report::RiskRow;
