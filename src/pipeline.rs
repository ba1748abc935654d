//! Execution topologies for the scan/aggregate pipeline.
//!
//! All topologies share the same [`Scanner`], [`CompletionGate`] and
//! [`Aggregator`]; they differ only in how scanners are scheduled:
//!
//! - [`Topology::Sequential`] - one blocking task scans the logs in order
//! - [`Topology::SharedMemory`] - one blocking task per log, bounded by a
//!   semaphore, each merging into the aggregator's accumulation under its lock
//! - [`Topology::Isolated`] - one child process per log, each printing its
//!   result as a JSON line that a reader task forwards into the sink

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::Result;
use crate::aggregator::Aggregator;
use crate::config::AppConfig;
use crate::error::VolscanError;
use crate::gate::{CompletionGate, GateGuard};
use crate::models::{Report, VolatilityResult};
use crate::scanner::Scanner;
use crate::sink::{ChannelSink, LineSink, LockedSink, ResultSink, result_channel};

/// Command-line flag that switches the binary into scan-worker mode.
pub const WORKER_FLAG: &str = "--scan-worker";

/// How scanners are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Sequential,
    SharedMemory,
    Isolated,
}

impl Topology {
    /// Returns the name accepted by [`Topology::from_str`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Topology::Sequential => "sequential",
            Topology::SharedMemory => "shared",
            Topology::Isolated => "isolated",
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topology {
    type Err = VolscanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Topology::Sequential),
            "shared" => Ok(Topology::SharedMemory),
            "isolated" => Ok(Topology::Isolated),
            other => Err(VolscanError::Config(format!(
                "unknown topology {other:?} (expected sequential, shared or isolated)"
            ))),
        }
    }
}

/// Scheduling knobs for [`run_pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub topology: Topology,
    /// Upper bound on concurrently running scanners.
    pub max_workers: usize,
    /// Bounded wait of each aggregator receive.
    pub poll_interval: Duration,
    /// Executable started in worker mode by [`Topology::Isolated`].
    pub worker_program: PathBuf,
}

impl PipelineOptions {
    /// Builds options from the application config, using the running
    /// executable as the worker program.
    ///
    /// # Errors
    ///
    /// Returns [`VolscanError::Config`] if the isolated topology is selected
    /// and the current executable cannot be located.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let worker_program = match config.topology {
            Topology::Isolated => std::env::current_exe().map_err(|e| {
                VolscanError::Config(format!("cannot locate worker executable: {e}"))
            })?,
            _ => PathBuf::new(),
        };

        Ok(Self {
            topology: config.topology,
            max_workers: config.max_workers,
            poll_interval: config.poll_interval,
            worker_program,
        })
    }
}

/// Scans every log in `files` and returns the ranking.
///
/// Per-file failures are logged and counted in [`Report::skipped`]; they
/// never abort the run.
///
/// # Errors
///
/// Returns [`VolscanError::Channel`] if the aggregator task dies.
pub async fn run_pipeline(files: Vec<PathBuf>, options: &PipelineOptions) -> Result<Report> {
    let started = Instant::now();
    info!(
        files = files.len(),
        topology = %options.topology,
        max_workers = options.max_workers,
        "Starting volatility scan"
    );

    let (sink, stream) = result_channel();
    let gate = CompletionGate::new();
    // Register every scanner before any runs so the gate cannot close early.
    let jobs: Vec<(PathBuf, GateGuard)> = files.into_iter().map(|f| (f, gate.enter())).collect();

    let aggregator = Aggregator::new(stream, Arc::clone(&gate), options.poll_interval);
    let shared = LockedSink::new(aggregator.shared_state());
    let collector = tokio::spawn(aggregator.run());

    let max_workers = options.max_workers.max(1);
    match options.topology {
        Topology::Sequential => spawn_sequential(jobs, sink),
        Topology::SharedMemory => {
            drop(sink);
            spawn_shared(jobs, shared, max_workers);
        }
        Topology::Isolated => {
            spawn_isolated(jobs, sink, max_workers, options.worker_program.clone())
        }
    }

    let report = collector
        .await
        .map_err(|e| VolscanError::Channel(format!("collector task failed: {e}")))?;

    info!(
        topology = %options.topology,
        scanned = report.scanned(),
        skipped = report.skipped(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Volatility scan finished"
    );
    Ok(report)
}

/// Entry point of a scan-worker process: scans `path` and prints the result
/// as one JSON line on stdout.
///
/// # Errors
///
/// Returns the scan error; the worker process reports it through its exit
/// status.
pub fn run_worker(path: &Path) -> Result<()> {
    Scanner::new(LineSink::stdout()).scan_file(path)
}

fn spawn_sequential(jobs: Vec<(PathBuf, GateGuard)>, sink: ChannelSink) {
    tokio::task::spawn_blocking(move || {
        let scanner = Scanner::new(sink);
        for (path, guard) in jobs {
            scan_one(&scanner, &path, guard);
        }
    });
}

fn spawn_shared(jobs: Vec<(PathBuf, GateGuard)>, sink: LockedSink, max_workers: usize) {
    let permits = Arc::new(Semaphore::new(max_workers));

    for (path, guard) in jobs {
        let scanner = Scanner::new(sink.clone());
        let permits = Arc::clone(&permits);

        tokio::spawn(async move {
            let Ok(permit) = permits.acquire_owned().await else {
                guard.fail();
                return;
            };
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                scan_one(&scanner, &path, guard);
            });
        });
    }
}

fn spawn_isolated(
    jobs: Vec<(PathBuf, GateGuard)>,
    sink: ChannelSink,
    max_workers: usize,
    program: PathBuf,
) {
    let permits = Arc::new(Semaphore::new(max_workers));
    let program = Arc::new(program);

    for (path, guard) in jobs {
        let sink = sink.clone();
        let permits = Arc::clone(&permits);
        let program = Arc::clone(&program);

        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire().await else {
                guard.fail();
                return;
            };
            match run_child(&program, &path).await.and_then(|r| sink.emit(r)) {
                Ok(()) => drop(guard),
                Err(e) => {
                    report_failure(&path, &e);
                    guard.fail();
                }
            }
        });
    }
}

/// Runs one scanner and releases its gate registration.
fn scan_one<S: ResultSink>(scanner: &Scanner<S>, path: &Path, guard: GateGuard) {
    match scanner.scan_file(path) {
        Ok(()) => drop(guard),
        Err(e) => {
            report_failure(path, &e);
            guard.fail();
        }
    }
}

fn report_failure(path: &Path, err: &VolscanError) {
    if err.is_scoped() {
        warn!(path = %path.display(), error = %err, "Skipping trade log");
    } else {
        error!(path = %path.display(), error = %err, "Scanner could not deliver result");
    }
}

/// Spawns a worker process for `path` and reads back its single result.
///
/// The result is only returned once the worker has exited successfully with
/// exactly one result line, so a failing worker never contributes.
async fn run_child(program: &Path, path: &Path) -> Result<VolatilityResult> {
    let mut child = Command::new(program)
        .arg(WORKER_FLAG)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            VolscanError::Worker(format!(
                "failed to spawn worker for {}: {e}",
                path.display()
            ))
        })?;

    let stdout = child.stdout.take().ok_or_else(|| {
        VolscanError::Worker(format!("worker for {} has no stdout", path.display()))
    })?;

    let mut results = Vec::with_capacity(1);
    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines.next_line().await.map_err(|e| {
        VolscanError::Worker(format!("failed to read worker for {}: {e}", path.display()))
    })? {
        if line.trim().is_empty() {
            continue;
        }
        let result: VolatilityResult = serde_json::from_str(&line).map_err(|e| {
            VolscanError::Worker(format!(
                "unreadable result from worker for {}: {e}",
                path.display()
            ))
        })?;
        results.push(result);
    }

    let status = child.wait().await.map_err(|e| {
        VolscanError::Worker(format!("lost worker for {}: {e}", path.display()))
    })?;
    if !status.success() {
        return Err(VolscanError::Worker(format!(
            "worker for {} exited with {status}",
            path.display()
        )));
    }

    match (results.pop(), results.is_empty()) {
        (Some(result), true) => Ok(result),
        _ => Err(VolscanError::Worker(format!(
            "worker for {} did not report exactly one result",
            path.display()
        ))),
    }
}
