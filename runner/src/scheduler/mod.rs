//! Load scheduler
//!
//! Owns one run harness per test-plan entry and launches each entry's
//! instances in one-second batches, so large populations ramp up without
//! bursting the service under test.

mod plan;
mod schedule;

pub use plan::{MAX_SCHEDULE_SECS, PlanError, TestPlanEntry, parse_testplan};
pub use schedule::{Batch, batch_schedule};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::harness::{RunHarness, Services};
use crate::lifecycle::Completion;
use crate::transport::Endpoint;

pub struct LoadScheduler {
    plan: Vec<TestPlanEntry>,
    services: Services,
    harnesses: Vec<RunHarness>,
    /// Batches scheduled but not yet launched
    pending: Arc<AtomicUsize>,
    started: bool,
    tasks: Vec<JoinHandle<()>>,
}

impl LoadScheduler {
    pub fn new(plan: Vec<TestPlanEntry>, services: Services) -> Self {
        Self {
            plan,
            services,
            harnesses: Vec::new(),
            pending: Arc::new(AtomicUsize::new(0)),
            started: false,
            tasks: Vec::new(),
        }
    }

    /// Create a harness per entry and schedule every launch batch
    ///
    /// Batch offsets are measured from this call. Must be called from
    /// within a tokio runtime.
    pub fn start(&mut self, endpoint: &Endpoint) {
        if self.started {
            warn!("Load scheduler already started; ignoring");
            return;
        }

        let origin = Instant::now();
        for entry in &self.plan {
            let harness = RunHarness::new(
                endpoint.clone(),
                entry.scenario.clone(),
                entry.args.clone(),
                self.services.clone(),
            );

            let batches = batch_schedule(entry.quantity, entry.stagger, entry.delay);
            info!(
                "Scheduling {} x {} instance(s) of {} against {} starting in {:?}",
                batches.len(),
                entry.stagger,
                entry.locator,
                endpoint,
                entry.delay
            );

            for batch in batches {
                let Some(deadline) = origin.checked_add(batch.offset) else {
                    warn!(
                        "Batch of {} for {} at +{:?} cannot be scheduled; skipping",
                        batch.size, entry.locator, batch.offset
                    );
                    continue;
                };
                self.pending.fetch_add(1, Ordering::SeqCst);
                let harness = harness.clone();
                let pending = self.pending.clone();
                self.tasks.push(tokio::spawn(async move {
                    tokio::time::sleep_until(deadline).await;
                    debug!(
                        "Launching batch of {} at +{:?} against {}",
                        batch.size,
                        batch.offset,
                        harness.endpoint()
                    );
                    for _ in 0..batch.size {
                        harness.run();
                    }
                    batch_launched(&pending);
                }));
            }

            self.harnesses.push(harness);
        }
        self.started = true;
    }

    /// Whether every scheduled batch has launched and every instance finished
    pub fn finished(&self) -> bool {
        self.started
            && self.pending() == 0
            && self.harnesses.iter().all(RunHarness::is_drained)
    }

    /// Batches not yet launched
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn harnesses(&self) -> &[RunHarness] {
        &self.harnesses
    }

    pub fn plan(&self) -> &[TestPlanEntry] {
        &self.plan
    }

    /// Cancel unlaunched batches and drop every waiting instance
    ///
    /// Instances that already hold a connection keep running.
    pub fn shutdown(&mut self) {
        let mut aborted = 0;
        for task in self.tasks.drain(..) {
            if !task.is_finished() {
                task.abort();
                aborted += 1;
            }
        }
        self.pending.store(0, Ordering::SeqCst);

        let cancelled: usize = self.harnesses.iter().map(RunHarness::cancel_waiters).sum();
        info!(
            "Shutdown: {} batch(es) cancelled, {} waiting instance(s) dropped",
            aborted, cancelled
        );
    }
}

/// Count one batch as launched
///
/// A batch already running when `shutdown` zeroes the count leaves it at
/// zero.
fn batch_launched(pending: &AtomicUsize) {
    let _ = pending.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
}

impl Completion for LoadScheduler {
    fn is_finished(&self) -> bool {
        self.finished()
    }
}
