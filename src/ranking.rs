//! Top-K ranking of accumulated volatilities.
//!
//! Equal volatilities are ordered by ticker name ascending in both lists, so
//! the ranking never depends on the order results arrived in.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::models::TickerVolatility;

/// Size of each ranked list.
pub const TOP_K: usize = 3;

/// Highest and lowest volatilities, each at most `k` long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranking {
    /// Descending by volatility.
    pub maximum: Vec<TickerVolatility>,
    /// Ascending by volatility.
    pub minimum: Vec<TickerVolatility>,
}

/// Ranks the non-zero volatilities without touching the input.
pub fn rank_top_k(volatilities: &BTreeMap<String, Decimal>, k: usize) -> Ranking {
    let entries: Vec<(&String, &Decimal)> = volatilities.iter().collect();

    Ranking {
        maximum: top_by(&entries, k, |a, b| b.cmp(a)),
        minimum: top_by(&entries, k, |a, b| a.cmp(b)),
    }
}

fn top_by<F>(entries: &[(&String, &Decimal)], k: usize, by_value: F) -> Vec<TickerVolatility>
where
    F: Fn(&Decimal, &Decimal) -> Ordering,
{
    let mut sorted = entries.to_vec();
    sorted.sort_by(|(ticker_a, a), (ticker_b, b)| {
        by_value(*a, *b).then_with(|| ticker_a.cmp(ticker_b))
    });
    sorted
        .into_iter()
        .take(k)
        .map(|(ticker, percent)| TickerVolatility::new(ticker.clone(), *percent))
        .collect()
}
