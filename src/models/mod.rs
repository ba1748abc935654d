//! Value types shared by the scanner, the aggregator and the reporter.
//!
//! - [`trade`] - trade log header layout, price parsing and running price ranges
//! - [`volatility`] - per-ticker results and the final ranking report

pub mod trade;
pub mod volatility;

pub use trade::{PriceRange, TickerStats, TradeHeader};
pub use volatility::{Report, TickerVolatility, Volatility, VolatilityResult};
