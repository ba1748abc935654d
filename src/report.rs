//! Console rendering of the final [`Report`].

use std::fmt::Write;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::Result;
use crate::error::VolscanError;
use crate::models::{Report, TickerVolatility};

const INDENT: &str = "    ";

/// Output format of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = VolscanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(VolscanError::Config(format!(
                "unknown output format {other:?} (expected text or json)"
            ))),
        }
    }
}

/// Renders `report` in the requested format, ending with a newline.
///
/// # Errors
///
/// Returns [`VolscanError::Json`] if JSON serialization fails.
pub fn render(report: &Report, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(report)),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(report)?;
            json.push('\n');
            Ok(json)
        }
    }
}

/// Renders the three ranking sections.
///
/// Both volatility lists read in decreasing order, so the minimum section
/// ends with the lowest volatility.
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();

    out.push_str("Maximum volatility:\n");
    for entry in report.maximum() {
        push_entry(&mut out, entry);
    }

    out.push_str("Minimum volatility:\n");
    for entry in report.minimum().iter().rev() {
        push_entry(&mut out, entry);
    }

    out.push_str("Zero volatility:\n");
    if !report.zero().is_empty() {
        out.push_str(INDENT);
        out.push_str(&report.zero().join(", "));
        out.push('\n');
    }

    out
}

fn push_entry(out: &mut String, entry: &TickerVolatility) {
    // Writing into a String cannot fail.
    let _ = writeln!(
        out,
        "{INDENT}{} {} %",
        entry.ticker,
        format_percent(entry.percent)
    );
}

/// Rounds to two decimals, midpoint away from zero, always printing both.
pub fn format_percent(value: Decimal) -> String {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}
