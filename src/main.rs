use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::ExitCode;

use tracing::error;
use volscan::config::fetch_config;
use volscan::discovery::discover_trade_files;
use volscan::pipeline::{PipelineOptions, WORKER_FLAG, run_pipeline, run_worker};
use volscan::report::render;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries only the report or a worker's result.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let mut args = std::env::args_os().skip(1);
    let first = args.next();

    if first.as_deref() == Some(OsStr::new(WORKER_FLAG)) {
        let Some(path) = args.next() else {
            eprintln!("error: {WORKER_FLAG} requires a trade log path");
            return ExitCode::from(2);
        };
        return match run_worker(&PathBuf::from(path)) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = %e, "Scan worker failed");
                ExitCode::FAILURE
            }
        };
    }

    match run(first.map(PathBuf::from)).await {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Scans the trades directory and renders the report.
async fn run(trades_dir: Option<PathBuf>) -> volscan::Result<String> {
    let mut config = fetch_config()?;
    if let Some(dir) = trades_dir {
        config.trades_dir = dir;
    }

    let files = discover_trade_files(&config.trades_dir)?;
    let options = PipelineOptions::from_config(&config)?;
    let report = run_pipeline(files, &options).await?;

    render(&report, config.output)
}
