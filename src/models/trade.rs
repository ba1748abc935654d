//! Trade log layout and running price statistics.
//!
//! A trade log is delimited text whose first line names the columns, e.g.
//! `SECID,TRADETIME,PRICE,QUANTITY`. Only the ticker and price columns are
//! consumed; their positions are resolved from the header.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::volatility::Volatility;

/// Header name of the ticker column.
pub const TICKER_COLUMN: &str = "SECID";

/// Header name of the trade price column.
pub const PRICE_COLUMN: &str = "PRICE";

/// Column positions resolved from a trade log header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeHeader {
    pub ticker: usize,
    pub price: usize,
    /// Number of fields every record must carry.
    pub width: usize,
}

impl TradeHeader {
    /// Resolves the ticker and price columns from header field names.
    ///
    /// Names are matched after trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason if either column is absent.
    pub fn from_fields<'a, I>(fields: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut ticker = None;
        let mut price = None;
        let mut width = 0;

        for (index, name) in fields.into_iter().enumerate() {
            match name.trim() {
                TICKER_COLUMN if ticker.is_none() => ticker = Some(index),
                PRICE_COLUMN if price.is_none() => price = Some(index),
                _ => {}
            }
            width = index + 1;
        }

        match (ticker, price) {
            (Some(ticker), Some(price)) => Ok(Self {
                ticker,
                price,
                width,
            }),
            (None, _) => Err(format!("header has no {TICKER_COLUMN} column")),
            (_, None) => Err(format!("header has no {PRICE_COLUMN} column")),
        }
    }
}

/// Parses one trade price.
///
/// Accepts plain decimals (`12.5`) and scientific notation (`1.25e1`).
/// Digit separators (`1_000`) and negative prices are rejected.
///
/// # Errors
///
/// Returns a human-readable reason if the value is not a usable price.
pub fn parse_price(raw: &str) -> Result<Decimal, String> {
    let raw = raw.trim();
    if raw.contains('_') {
        return Err(format!("unparsable price {raw:?}"));
    }
    let price = Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| format!("unparsable price {raw:?}"))?;

    if price.is_sign_negative() && !price.is_zero() {
        return Err(format!("negative price {raw}"));
    }
    Ok(price)
}

/// Lowest and highest trade price observed for one ticker.
///
/// `min <= max` holds for every value built through [`PriceRange::new`],
/// [`PriceRange::observe`] and [`PriceRange::merge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: Decimal,
    pub max: Decimal,
}

impl PriceRange {
    /// Starts a range from the first observed price.
    pub fn new(price: Decimal) -> Self {
        Self {
            min: price,
            max: price,
        }
    }

    /// Folds one more price into the range.
    pub fn observe(&mut self, price: Decimal) {
        if price < self.min {
            self.min = price;
        }
        if price > self.max {
            self.max = price;
        }
    }

    /// Returns the smallest range covering both `self` and `other`.
    #[must_use]
    pub fn merge(self, other: PriceRange) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Arithmetic mean of the extreme prices.
    pub fn half_sum(&self) -> Decimal {
        // Halving each side first keeps the sum inside Decimal's range.
        self.max / Decimal::TWO + self.min / Decimal::TWO
    }

    /// Percentage deviation of the extremes from their half-sum.
    ///
    /// Only a range whose extremes are equal is [`Volatility::Zero`]. The
    /// spread is scaled before dividing by the sum of the extremes, so tiny
    /// prices keep their exact ratio; the halved form is used only when that
    /// would overflow.
    pub fn volatility(&self) -> Volatility {
        if self.min == self.max {
            return Volatility::Zero;
        }

        let spread = self.max - self.min;
        let percent = spread
            .checked_mul(Decimal::ONE_HUNDRED * Decimal::TWO)
            .zip(self.max.checked_add(self.min))
            .and_then(|(scaled, sum)| scaled.checked_div(sum))
            .unwrap_or_else(|| spread / self.half_sum() * Decimal::ONE_HUNDRED);

        Volatility::Percent(percent.normalize())
    }
}

/// Running statistics for the single ticker a scanner is reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerStats {
    pub ticker: String,
    pub range: PriceRange,
}

impl TickerStats {
    /// Starts the statistics from the first trade.
    pub fn new(ticker: impl Into<String>, price: Decimal) -> Self {
        Self {
            ticker: ticker.into(),
            range: PriceRange::new(price),
        }
    }

    /// Folds one more trade price in.
    pub fn observe(&mut self, price: Decimal) {
        self.range.observe(price);
    }
}
