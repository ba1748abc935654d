//! Concurrent price-volatility scanner for per-ticker trade logs.
//!
//! Each trade log is reduced by a [`scanner::Scanner`] to a single
//! volatility value. Results fan in through a [`sink::ResultSink`] to one
//! [`aggregator::Aggregator`], which waits on a [`gate::CompletionGate`]
//! before ranking the three most and least volatile tickers.

pub mod aggregator;
pub mod config;
pub mod discovery;
pub mod error;
pub mod gate;
pub mod models;
pub mod pipeline;
pub mod ranking;
pub mod report;
pub mod scanner;
pub mod sink;

pub use error::{Result, VolscanError};
