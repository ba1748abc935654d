//! Shared trade-log fixtures.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Header line of every fixture log.
pub const HEADER: &str = "SECID,TRADETIME,PRICE,QUANTITY";

/// Writes a trade log for `ticker` with one trade per price.
pub fn write_log(dir: &Path, ticker: &str, prices: &[&str]) -> PathBuf {
    let mut text = format!("{HEADER}\n");
    for (i, price) in prices.iter().enumerate() {
        text.push_str(&format!("{ticker},10:{:02}:{:02},{price},10\n", i / 60, i % 60));
    }
    let path = dir.join(format!("TICKER_{ticker}.csv"));
    fs::write(&path, text).expect("failed to write fixture log");
    path
}

/// Four moving tickers and two flat ones:
///
/// | ticker | min | max | volatility |
/// |--------|-----|-----|------------|
/// | AAA    | 11  | 12  | 8.70 %     |
/// | BBB    | 3   | 100 | 188.35 %   |
/// | DDD    | 10  | 11  | 9.52 %     |
/// | EEE    | 100 | 150 | 40.00 %    |
/// | CCC    | 5   | 5   | zero       |
/// | FFF    | 7   | 7   | zero       |
pub fn market_fixture() -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    let root = dir.path();
    write_log(root, "AAA", &["11", "11", "12", "11", "12", "11", "11", "11"]);
    write_log(root, "BBB", &["20", "15", "23", "56", "100", "50", "3", "10"]);
    write_log(root, "CCC", &["5", "5", "5"]);
    write_log(root, "DDD", &["10.5", "10", "11"]);
    write_log(root, "EEE", &["120", "150", "100", "130"]);
    write_log(root, "FFF", &["7", "7.00"]);
    dir
}

/// The text report expected for [`market_fixture`].
pub const MARKET_REPORT: &str = "\
Maximum volatility:
    BBB 188.35 %
    EEE 40.00 %
    DDD 9.52 %
Minimum volatility:
    EEE 40.00 %
    DDD 9.52 %
    AAA 8.70 %
Zero volatility:
    CCC, FFF
";
