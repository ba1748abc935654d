//! Single-pass reduction of one trade log into one volatility result.
//!
//! The scanning algorithm is the same for every execution topology; only the
//! injected [`ResultSink`] differs.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::debug;

use crate::Result;
use crate::error::VolscanError;
use crate::models::trade::parse_price;
use crate::models::{TickerStats, TradeHeader, VolatilityResult};
use crate::sink::ResultSink;

/// Reads one trade log and emits its result into the injected sink.
#[derive(Debug)]
pub struct Scanner<S> {
    sink: S,
}

impl<S: ResultSink> Scanner<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Scans the trade log at `path` and emits exactly one result.
    ///
    /// # Errors
    ///
    /// Returns [`VolscanError::FileRead`], [`VolscanError::MalformedRecord`]
    /// or [`VolscanError::EmptyTradeLog`] if the log cannot be reduced, in
    /// which case nothing is emitted. Returns [`VolscanError::Channel`] if
    /// the sink rejects the result.
    pub fn scan_file(&self, path: &Path) -> Result<()> {
        let file = File::open(path).map_err(|source| VolscanError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        self.scan_reader(path, BufReader::new(file))
    }

    /// Like [`Scanner::scan_file`] for an already opened stream. `path` is
    /// only used to label errors.
    pub fn scan_reader<R: Read>(&self, path: &Path, reader: R) -> Result<()> {
        let result = reduce_trades(path, reader)?;
        debug!(
            ticker = %result.ticker,
            volatility = ?result.volatility,
            path = %path.display(),
            "Scanned trade log"
        );
        self.sink.emit(result)
    }
}

/// Folds every trade price of one log into a [`VolatilityResult`].
///
/// # Errors
///
/// See [`Scanner::scan_file`].
pub fn reduce_trades<R: Read>(path: &Path, reader: R) -> Result<VolatilityResult> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let header = reader.headers().map_err(|e| csv_failure(path, e))?;
    let layout =
        TradeHeader::from_fields(header.iter()).map_err(|reason| malformed(path, 1, reason))?;

    let mut stats: Option<TickerStats> = None;
    for record in reader.records() {
        let record = record.map_err(|e| csv_failure(path, e))?;
        let line = record.position().map_or(0, |p| p.line());

        if record.len() != layout.width {
            return Err(malformed(
                path,
                line,
                format!("expected {} fields, found {}", layout.width, record.len()),
            ));
        }

        let ticker = record.get(layout.ticker).unwrap_or_default();
        if ticker.is_empty() {
            return Err(malformed(path, line, "empty ticker".to_string()));
        }
        let price = parse_price(record.get(layout.price).unwrap_or_default())
            .map_err(|reason| malformed(path, line, reason))?;

        if let Some(current) = stats.as_mut() {
            if current.ticker != ticker {
                return Err(malformed(
                    path,
                    line,
                    format!("ticker {ticker} in a log of {}", current.ticker),
                ));
            }
            current.observe(price);
        } else {
            stats = Some(TickerStats::new(ticker, price));
        }
    }

    let stats = stats.ok_or_else(|| VolscanError::EmptyTradeLog(path.to_path_buf()))?;
    Ok(VolatilityResult::from_range(stats.ticker, stats.range))
}

fn malformed(path: &Path, line: u64, reason: String) -> VolscanError {
    VolscanError::MalformedRecord {
        path: path.to_path_buf(),
        line,
        reason,
    }
}

/// Maps a delimited-text reader error onto the crate's per-file errors.
fn csv_failure(path: &Path, err: csv::Error) -> VolscanError {
    let line = err.position().map_or(0, |p| p.line());
    let message = err.to_string();

    match err.into_kind() {
        csv::ErrorKind::Io(source) => VolscanError::FileRead {
            path: path.to_path_buf(),
            source,
        },
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => malformed(
            path,
            line,
            format!("expected {expected_len} fields, found {len}"),
        ),
        _ => malformed(path, line, message),
    }
}
