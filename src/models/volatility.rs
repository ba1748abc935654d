//! Per-ticker volatility results and the final ranking.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::trade::PriceRange;

/// Volatility of one ticker: a percentage, or the zero marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "percent", rename_all = "snake_case")]
pub enum Volatility {
    Percent(Decimal),
    Zero,
}

impl Volatility {
    pub fn is_zero(&self) -> bool {
        matches!(self, Volatility::Zero)
    }
}

/// The single value a scanner emits for its trade log.
///
/// The price range travels with the volatility so that two logs declaring
/// the same ticker can be merged by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolatilityResult {
    pub ticker: String,
    pub range: PriceRange,
    pub volatility: Volatility,
}

impl VolatilityResult {
    /// Builds the result for a finished price range.
    pub fn from_range(ticker: impl Into<String>, range: PriceRange) -> Self {
        Self {
            ticker: ticker.into(),
            range,
            volatility: range.volatility(),
        }
    }
}

/// One ranked entry of a [`Report`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerVolatility {
    pub ticker: String,
    pub percent: Decimal,
}

impl TickerVolatility {
    pub fn new(ticker: impl Into<String>, percent: Decimal) -> Self {
        Self {
            ticker: ticker.into(),
            percent,
        }
    }
}

/// Final ranking handed to the reporter.
///
/// Built once by the aggregator and read-only afterwards:
/// - `maximum` is ordered by descending volatility
/// - `minimum` is ordered by ascending volatility (lowest first)
/// - `zero` is ordered by ticker name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    maximum: Vec<TickerVolatility>,
    minimum: Vec<TickerVolatility>,
    zero: Vec<String>,
    scanned: usize,
    skipped: usize,
}

impl Report {
    pub(crate) fn new(
        maximum: Vec<TickerVolatility>,
        minimum: Vec<TickerVolatility>,
        zero: Vec<String>,
        scanned: usize,
        skipped: usize,
    ) -> Self {
        Self {
            maximum,
            minimum,
            zero,
            scanned,
            skipped,
        }
    }

    /// Highest-volatility tickers, highest first.
    pub fn maximum(&self) -> &[TickerVolatility] {
        &self.maximum
    }

    /// Lowest non-zero volatility tickers, lowest first.
    pub fn minimum(&self) -> &[TickerVolatility] {
        &self.minimum
    }

    /// Tickers whose trades never moved, sorted by name.
    pub fn zero(&self) -> &[String] {
        &self.zero
    }

    /// Number of results merged into the ranking.
    pub fn scanned(&self) -> usize {
        self.scanned
    }

    /// Number of trade logs dropped by a per-file failure.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
