//! # Data
//!
//! $$
//! r_{t,i} = \frac{p_{t,i}}{p_{t-1,i}} - 1
//! $$
//!
//! Date-indexed price tables, return matrices and the sample statistics built on them.

pub mod prices;
pub mod returns;
pub mod stats;

pub use prices::BidAskTable;
pub use prices::PriceTable;
pub use returns::CovarianceMatrix;
pub use returns::ReturnMatrix;
pub use stats::percentile;
