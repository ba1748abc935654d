//! Single consumer that drains scanner results and builds the [`Report`].
//!
//! The aggregator moves through three states:
//!
//! 1. [`AggregatorState::Draining`] - receive with a bounded wait, merging
//!    every result into the [`AccumulationState`]. When the wait ends quietly
//!    and the [`CompletionGate`] reports no live scanner, one final
//!    non-blocking drain picks up anything sent just before the last scanner
//!    exited.
//! 2. [`AggregatorState::Finalizing`] - rank the accumulated volatilities.
//! 3. [`AggregatorState::Done`] - the report is frozen and handed out.
//!
//! The [`AccumulationState`] sits behind one lock, taken only for a single
//! merge. Channel results are merged by the aggregator itself; in the
//! shared-memory topology scanners merge through a
//! [`LockedSink`](crate::sink::LockedSink) over [`Aggregator::shared_state`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::gate::CompletionGate;
use crate::models::{PriceRange, Report, Volatility, VolatilityResult};
use crate::ranking::{TOP_K, rank_top_k};
use crate::sink::ResultStream;

/// Per-ticker results collected while draining.
///
/// A ticker appears in exactly one of the volatility map and the zero list.
/// Two results for the same ticker are merged by widening the price range,
/// so the outcome does not depend on which arrived first.
#[derive(Debug, Default)]
pub struct AccumulationState {
    volatilities: BTreeMap<String, Decimal>,
    zero: Vec<String>,
    ranges: HashMap<String, PriceRange>,
    merged: usize,
}

impl AccumulationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one scanner result in.
    pub fn merge(&mut self, result: VolatilityResult) {
        let VolatilityResult {
            ticker,
            range,
            volatility,
        } = result;
        self.merged += 1;

        let volatility = match self.ranges.get(&ticker).copied() {
            Some(existing) => {
                let widened = existing.merge(range);
                debug!(
                    %ticker,
                    min = %widened.min,
                    max = %widened.max,
                    "Merged duplicate ticker"
                );
                self.volatilities.remove(&ticker);
                self.zero.retain(|t| *t != ticker);
                self.ranges.insert(ticker.clone(), widened);
                widened.volatility()
            }
            None => {
                self.ranges.insert(ticker.clone(), range);
                volatility
            }
        };

        match volatility {
            Volatility::Percent(percent) => {
                self.volatilities.insert(ticker, percent);
            }
            Volatility::Zero => self.zero.push(ticker),
        }
    }

    /// Non-zero volatilities by ticker.
    pub fn volatilities(&self) -> &BTreeMap<String, Decimal> {
        &self.volatilities
    }

    /// Zero-volatility tickers in arrival order.
    pub fn zero(&self) -> &[String] {
        &self.zero
    }

    /// Number of results merged so far.
    pub fn merged(&self) -> usize {
        self.merged
    }

    /// Freezes the state into the final report.
    pub fn into_report(self, skipped: usize) -> Report {
        let ranking = rank_top_k(&self.volatilities, TOP_K);
        let mut zero = self.zero;
        zero.sort();

        Report::new(ranking.maximum, ranking.minimum, zero, self.merged, skipped)
    }
}

/// Lifecycle of an [`Aggregator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    Draining,
    Finalizing,
    Done,
}

/// What ended one bounded receive.
enum Wake {
    Received(VolatilityResult),
    LanesClosed,
    Quiet,
}

/// Accumulation shared between the aggregator and in-process scanners.
pub type SharedAccumulation = Arc<Mutex<AccumulationState>>;

/// Locks the accumulation. A poisoned lock still holds every merge that
/// completed, so the guard is recovered.
pub(crate) fn lock_state(state: &Mutex<AccumulationState>) -> MutexGuard<'_, AccumulationState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drains the result channel until every scanner has finished.
pub struct Aggregator {
    stream: ResultStream,
    gate: Arc<CompletionGate>,
    poll_interval: Duration,
    state: AggregatorState,
    lanes_closed: bool,
    accumulation: SharedAccumulation,
}

impl Aggregator {
    /// Creates an aggregator over `stream`.
    ///
    /// Every scanner feeding `stream` must already be registered with `gate`.
    pub fn new(stream: ResultStream, gate: Arc<CompletionGate>, poll_interval: Duration) -> Self {
        Self {
            stream,
            gate,
            poll_interval,
            state: AggregatorState::Draining,
            lanes_closed: false,
            accumulation: Arc::new(Mutex::new(AccumulationState::new())),
        }
    }

    pub fn state(&self) -> AggregatorState {
        self.state
    }

    /// Handle to the accumulation for scanners that merge directly.
    ///
    /// Such scanners must be registered with the gate and merge before
    /// releasing their guard.
    pub fn shared_state(&self) -> SharedAccumulation {
        Arc::clone(&self.accumulation)
    }

    /// Runs the state machine to completion and returns the report.
    pub async fn run(mut self) -> Report {
        while self.state == AggregatorState::Draining {
            self.drain_once().await;
        }

        let accumulation = std::mem::take(&mut *lock_state(&self.accumulation));
        let report = accumulation.into_report(self.gate.failed());
        self.state = AggregatorState::Done;

        info!(
            scanned = report.scanned(),
            skipped = report.skipped(),
            zero = report.zero().len(),
            "Aggregation finished"
        );
        report
    }

    /// One bounded receive, followed by the completion check if it was quiet.
    async fn drain_once(&mut self) {
        match self.wait_next().await {
            Wake::Received(result) => {
                lock_state(&self.accumulation).merge(result);
                return;
            }
            Wake::LanesClosed => self.lanes_closed = true,
            Wake::Quiet => {}
        }

        if !self.gate.is_complete() {
            debug!(
                live = self.gate.live(),
                merged = lock_state(&self.accumulation).merged(),
                "Waiting for scanners"
            );
            return;
        }

        // The last scanner may have sent right before releasing the gate.
        while let Ok(result) = self.stream.try_recv() {
            lock_state(&self.accumulation).merge(result);
        }
        self.state = AggregatorState::Finalizing;
    }

    /// Waits up to `poll_interval` for a result or for the gate to complete.
    async fn wait_next(&mut self) -> Wake {
        let stream = &mut self.stream;
        let gate = &self.gate;
        let lanes_open = !self.lanes_closed;

        let next = async move {
            tokio::select! {
                biased;
                received = stream.recv(), if lanes_open => match received {
                    Some(result) => Wake::Received(result),
                    None => Wake::LanesClosed,
                },
                () = gate.wait_complete() => Wake::Quiet,
            }
        };

        tokio::time::timeout(self.poll_interval, next)
            .await
            .unwrap_or(Wake::Quiet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{LockedSink, ResultSink, result_channel};
    use rust_decimal_macros::dec;

    fn result(ticker: &str, min: Decimal, max: Decimal) -> VolatilityResult {
        VolatilityResult::from_range(ticker, PriceRange { min, max })
    }

    #[test]
    fn merge_routes_numeric_and_zero() {
        let mut state = AccumulationState::new();
        state.merge(result("AAA", dec!(11), dec!(12)));
        state.merge(result("CCC", dec!(5), dec!(5)));

        assert_eq!(state.volatilities().len(), 1);
        assert!(state.volatilities().contains_key("AAA"));
        assert_eq!(state.zero(), ["CCC".to_string()]);
        assert_eq!(state.merged(), 2);
    }

    #[test]
    fn duplicate_ticker_widens_range_in_any_order() {
        let first = result("DUP", dec!(10), dec!(10));
        let second = result("DUP", dec!(8), dec!(12));

        let mut forward = AccumulationState::new();
        forward.merge(first.clone());
        forward.merge(second.clone());

        let mut backward = AccumulationState::new();
        backward.merge(second);
        backward.merge(first);

        for state in [&forward, &backward] {
            assert!(state.zero().is_empty());
            // (12 - 8) / 10 * 100
            assert_eq!(state.volatilities()["DUP"], dec!(40));
        }
    }

    #[test]
    fn duplicate_zero_ticker_listed_once() {
        let mut state = AccumulationState::new();
        state.merge(result("CCC", dec!(5), dec!(5)));
        state.merge(result("CCC", dec!(5), dec!(5)));
        assert_eq!(state.zero(), ["CCC".to_string()]);

        let report = state.into_report(0);
        assert_eq!(report.zero(), ["CCC".to_string()]);
        assert_eq!(report.scanned(), 2);
    }

    #[test]
    fn report_sorts_zero_list() {
        let mut state = AccumulationState::new();
        for ticker in ["ZZZ", "AAA", "MMM"] {
            state.merge(result(ticker, dec!(1), dec!(1)));
        }
        let report = state.into_report(1);
        assert_eq!(report.zero(), ["AAA", "MMM", "ZZZ"].map(String::from));
        assert_eq!(report.skipped(), 1);
    }

    #[tokio::test]
    async fn finishes_immediately_without_scanners() {
        let (sink, stream) = result_channel();
        let gate = CompletionGate::new();
        let aggregator = Aggregator::new(stream, gate, Duration::from_secs(30));
        assert_eq!(aggregator.state(), AggregatorState::Draining);

        let report = tokio::time::timeout(Duration::from_secs(5), aggregator.run())
            .await
            .expect("aggregator did not terminate");
        assert_eq!(report.scanned(), 0);
        drop(sink);
    }

    #[tokio::test]
    async fn picks_up_result_sent_just_before_release() {
        let (sink, stream) = result_channel();
        let gate = CompletionGate::new();
        let guard = gate.enter();
        let aggregator = Aggregator::new(stream, Arc::clone(&gate), Duration::from_millis(10));

        let producer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            sink.emit(result("LATE", dec!(1), dec!(2))).unwrap();
            drop(guard);
            // Keep the sender alive so only the gate signals completion.
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(sink);
        });

        let report = aggregator.run().await;
        assert_eq!(report.scanned(), 1);
        assert_eq!(report.maximum()[0].ticker, "LATE");
        producer.await.unwrap();
    }

    #[tokio::test]
    async fn does_not_finish_while_scanner_alive() {
        let (sink, stream) = result_channel();
        let gate = CompletionGate::new();
        let guard = gate.enter();
        let aggregator = Aggregator::new(stream, Arc::clone(&gate), Duration::from_millis(5));

        // Closing the lanes alone must not end the drain.
        drop(sink);
        let pending = tokio::time::timeout(Duration::from_millis(100), aggregator.run()).await;
        assert!(pending.is_err());
        drop(guard);
    }

    #[tokio::test]
    async fn merges_results_written_through_shared_state() {
        let (sink, stream) = result_channel();
        let gate = CompletionGate::new();
        let guards: Vec<_> = (0..3).map(|_| gate.enter()).collect();
        let aggregator = Aggregator::new(stream, Arc::clone(&gate), Duration::from_millis(10));
        let shared = LockedSink::new(aggregator.shared_state());
        drop(sink);

        for (guard, (ticker, max)) in guards
            .into_iter()
            .zip([("AAA", dec!(12)), ("BBB", dec!(100)), ("CCC", dec!(5))])
        {
            let shared = shared.clone();
            tokio::task::spawn_blocking(move || {
                let min = if ticker == "BBB" { dec!(3) } else { dec!(5) };
                shared.emit(result(ticker, min, max)).unwrap();
                drop(guard);
            });
        }

        let report = aggregator.run().await;
        assert_eq!(report.scanned(), 3);
        assert_eq!(report.maximum()[0].ticker, "BBB");
        assert_eq!(report.zero(), ["CCC".to_string()]);
    }

    #[tokio::test]
    async fn counts_failed_scanners_as_skipped() {
        let (sink, stream) = result_channel();
        let gate = CompletionGate::new();
        let ok = gate.enter();
        let bad = gate.enter();
        let aggregator = Aggregator::new(stream, Arc::clone(&gate), Duration::from_millis(10));

        sink.emit(result("AAA", dec!(11), dec!(12))).unwrap();
        drop(ok);
        bad.fail();

        let report = aggregator.run().await;
        assert_eq!(report.scanned(), 1);
        assert_eq!(report.skipped(), 1);
        drop(sink);
    }
}
