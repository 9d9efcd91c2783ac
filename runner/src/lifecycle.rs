//! Termination detection shared by the run harness and the load scheduler
//!
//! Both coordinators expose a single "is everything done" predicate. The host
//! process polls that predicate on a fixed interval and stops once it holds.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, error};

/// Something whose completion the host process waits for
pub trait Completion {
    /// Whether all work owned by this coordinator has finished
    fn is_finished(&self) -> bool;
}

/// Non-negative counter of live scenario instances
///
/// Increments once per launched instance and decrements once per terminated
/// instance. A decrement at zero is refused and logged rather than wrapping.
#[derive(Debug, Default)]
pub struct LiveCounter {
    live: AtomicUsize,
}

impl LiveCounter {
    pub fn new() -> Self {
        Self {
            live: AtomicUsize::new(0),
        }
    }

    /// Record one more live instance and return the new count
    pub fn increment(&self) -> usize {
        self.live.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Record one terminated instance
    ///
    /// Returns `false` (and leaves the counter at zero) on underflow.
    pub fn decrement(&self) -> bool {
        let result = self
            .live
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if result.is_err() {
            error!("Live instance counter decremented below zero; ignoring");
        }
        result.is_ok()
    }

    pub fn get(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Whether no instance is live
    pub fn is_drained(&self) -> bool {
        self.get() == 0
    }
}

/// Wait until `target` reports completion
///
/// The first check happens one `interval` after the call, then every
/// `interval` after that.
pub async fn wait_for_completion<C: Completion + ?Sized>(target: &C, interval: Duration) {
    let start = tokio::time::Instant::now() + interval;
    let mut ticker = tokio::time::interval_at(start, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if target.is_finished() {
            debug!("Completion reached");
            return;
        }
    }
}
