//! Result fan-in from scanners to the aggregator.
//!
//! Scanners only see the [`ResultSink`] trait. In-process topologies inject a
//! [`ChannelSink`], whose two unbounded lanes (numeric results and zero
//! markers) are drained by a single [`ResultStream`]. Worker processes inject
//! a [`LineSink`] that writes each result as one JSON line for the parent to
//! forward into a [`ChannelSink`]. Shared-memory scanners inject a
//! [`LockedSink`] that merges straight into the aggregator's accumulation.

use std::io::Write;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::Result;
use crate::aggregator::{SharedAccumulation, lock_state};
use crate::error::VolscanError;
use crate::models::VolatilityResult;

/// Destination for the single result a scanner produces.
pub trait ResultSink: Send + Sync {
    /// Hands one result over without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`VolscanError::Channel`] if the consumer side is gone.
    fn emit(&self, result: VolatilityResult) -> Result<()>;
}

/// Creates a connected sink/stream pair.
pub fn result_channel() -> (ChannelSink, ResultStream) {
    let (numeric_tx, numeric_rx) = mpsc::unbounded_channel();
    let (zero_tx, zero_rx) = mpsc::unbounded_channel();

    (
        ChannelSink {
            numeric: numeric_tx,
            zero: zero_tx,
        },
        ResultStream {
            numeric: numeric_rx,
            zero: zero_rx,
        },
    )
}

/// Producer half of the result channel. Cheap to clone, one per scanner.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    numeric: mpsc::UnboundedSender<VolatilityResult>,
    zero: mpsc::UnboundedSender<VolatilityResult>,
}

impl ResultSink for ChannelSink {
    fn emit(&self, result: VolatilityResult) -> Result<()> {
        let lane = if result.volatility.is_zero() {
            &self.zero
        } else {
            &self.numeric
        };

        lane.send(result).map_err(|e| {
            VolscanError::Channel(format!(
                "collector closed before result for {} arrived",
                e.0.ticker
            ))
        })
    }
}

/// Consumer half of the result channel, owned by the aggregator.
#[derive(Debug)]
pub struct ResultStream {
    numeric: mpsc::UnboundedReceiver<VolatilityResult>,
    zero: mpsc::UnboundedReceiver<VolatilityResult>,
}

impl ResultStream {
    /// Waits for the next result from either lane.
    ///
    /// Returns `None` once both lanes are closed and empty.
    pub async fn recv(&mut self) -> Option<VolatilityResult> {
        tokio::select! {
            biased;
            Some(result) = self.numeric.recv() => Some(result),
            Some(result) = self.zero.recv() => Some(result),
            else => None,
        }
    }

    /// Takes a queued result without waiting.
    ///
    /// Reports [`TryRecvError::Disconnected`] only when both lanes are
    /// closed and empty.
    pub fn try_recv(&mut self) -> std::result::Result<VolatilityResult, TryRecvError> {
        let numeric = match self.numeric.try_recv() {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };
        match self.zero.try_recv() {
            Ok(result) => Ok(result),
            Err(TryRecvError::Disconnected) if numeric == TryRecvError::Disconnected => {
                Err(TryRecvError::Disconnected)
            }
            Err(_) => Err(TryRecvError::Empty),
        }
    }
}

/// Merges each result into a shared accumulation under its lock.
///
/// The lock is held for one merge only, never across a file read.
#[derive(Debug, Clone)]
pub struct LockedSink {
    state: SharedAccumulation,
}

impl LockedSink {
    pub fn new(state: SharedAccumulation) -> Self {
        Self { state }
    }
}

impl ResultSink for LockedSink {
    fn emit(&self, result: VolatilityResult) -> Result<()> {
        lock_state(&self.state).merge(result);
        Ok(())
    }
}

/// Writes each result as one JSON line.
///
/// Worker processes use this over stdout; the parent reads the lines back.
pub struct LineSink<W> {
    writer: Mutex<W>,
}

impl LineSink<std::io::Stdout> {
    /// Sink over the process's standard output.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> LineSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> ResultSink for LineSink<W> {
    fn emit(&self, result: VolatilityResult) -> Result<()> {
        let mut json = serde_json::to_string(&result)?;
        json.push('\n');

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| VolscanError::Channel("result writer poisoned".to_string()))?;
        writer
            .write_all(json.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(|e| VolscanError::Channel(format!("failed to write result: {e}")))
    }
}
