//! Completion gate counting live scanners.
//!
//! Every scanner is registered with [`CompletionGate::enter`] before any of
//! them starts, and holds the returned [`GateGuard`] until it has emitted (or
//! failed). Dropping the last guard wakes the aggregator, which then does one
//! final drain of the result channel.

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Shared counter of scanners that have not finished yet.
#[derive(Debug, Default)]
pub struct CompletionGate {
    live: AtomicUsize,
    failed: AtomicUsize,
    notify: Notify,
}

impl CompletionGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers one scanner. The gate stays open until the guard drops.
    pub fn enter(self: &Arc<Self>) -> GateGuard {
        self.live.fetch_add(1, Ordering::AcqRel);
        GateGuard {
            gate: Arc::clone(self),
            failed: false,
        }
    }

    /// Number of registered scanners still running.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Number of scanners that finished without producing a result.
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Acquire)
    }

    /// Returns `true` once every registered scanner has exited.
    pub fn is_complete(&self) -> bool {
        self.live() == 0
    }

    /// Resolves once every registered scanner has exited.
    pub async fn wait_complete(&self) {
        loop {
            let mut notified = pin!(self.notify.notified());
            // Register before checking so a release in between is not missed.
            notified.as_mut().enable();
            if self.is_complete() {
                return;
            }
            notified.await;
        }
    }
}

/// Registration of one scanner; releases the gate on drop.
#[derive(Debug)]
pub struct GateGuard {
    gate: Arc<CompletionGate>,
    failed: bool,
}

impl GateGuard {
    /// Releases the gate, recording that this scanner produced no result.
    pub fn fail(mut self) {
        self.failed = true;
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        if self.failed || std::thread::panicking() {
            self.gate.failed.fetch_add(1, Ordering::AcqRel);
        }
        if self.gate.live.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.gate.notify.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn empty_gate_is_complete() {
        let gate = CompletionGate::new();
        assert!(gate.is_complete());
        tokio_test::block_on(gate.wait_complete());
    }

    #[test]
    fn counts_guards_and_failures() {
        let gate = CompletionGate::new();
        let a = gate.enter();
        let b = gate.enter();
        assert_eq!(gate.live(), 2);

        drop(a);
        assert_eq!(gate.live(), 1);
        assert!(!gate.is_complete());

        b.fail();
        assert!(gate.is_complete());
        assert_eq!(gate.failed(), 1);
    }

    #[test]
    fn panicking_scanner_counts_as_failed() {
        let gate = CompletionGate::new();
        let guard = gate.enter();
        let handle = std::thread::spawn(move || {
            let _guard = guard;
            panic!("scanner blew up");
        });
        assert!(handle.join().is_err());
        assert!(gate.is_complete());
        assert_eq!(gate.failed(), 1);
    }

    #[tokio::test]
    async fn wakes_waiter_when_last_guard_drops() {
        let gate = CompletionGate::new();
        let guards: Vec<_> = (0..4).map(|_| gate.enter()).collect();

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.wait_complete().await })
        };

        for guard in guards {
            tokio::task::spawn_blocking(move || drop(guard));
        }

        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("gate never completed")
            .unwrap();
        assert_eq!(gate.failed(), 0);
    }
}
