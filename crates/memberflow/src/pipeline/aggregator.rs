//! Completion aggregation and drain detection.

use super::flight::Settlement;
use crate::telemetry::{increment_failed, increment_succeeded, record_persist_latency};
use core::{pin::pin, time::Duration};
use memberflow_core::{Error, Member, Result};
use parking_lot::Mutex;
use portable_atomic::{AtomicBool, AtomicU64, Ordering};
use serde::Serialize;
use tokio::sync::Notify;

/// Snapshot of a run's counters, returned by every join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DrainResult {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: bool,
}

impl DrainResult {
    pub const fn settled(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// Converts a timed-out snapshot into [`Error::DeadlineExceeded`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeadlineExceeded`] if `timed_out` is set.
    pub fn into_result(self, timeout: Duration) -> Result<Self> {
        if self.timed_out {
            return Err(Error::DeadlineExceeded {
                timeout,
                settled: self.settled(),
                submitted: self.submitted,
            });
        }
        Ok(self)
    }
}

/// Pipeline-scoped tallies. Every field only grows.
#[derive(Debug, Default)]
pub struct Counters {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::SeqCst)
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn settled(&self) -> u64 {
        self.succeeded() + self.failed()
    }
}

/// Observes every settlement of a run.
///
/// Failures are contained here: they are counted and logged, and the run
/// carries on. Settlements may arrive in any order.
#[derive(Debug)]
pub struct Aggregator {
    counters: Counters,
    exhausted: AtomicBool,
    drained: Notify,
    records: Option<Mutex<Vec<Member>>>,
}

impl Aggregator {
    pub fn new(retain_records: bool) -> Self {
        Self {
            counters: Counters::default(),
            exhausted: AtomicBool::new(false),
            drained: Notify::new(),
            records: retain_records.then(|| Mutex::new(Vec::new())),
        }
    }

    pub const fn counters(&self) -> &Counters {
        &self.counters
    }

    pub(crate) fn on_submitted(&self) {
        self.counters.submitted.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn on_settled(&self, settlement: Settlement) {
        let Settlement {
            record,
            outcome,
            elapsed,
        } = settlement;

        match outcome {
            Ok(member) => {
                let _total = self.counters.succeeded.fetch_add(1, Ordering::SeqCst) + 1;
                increment_succeeded();

                #[cfg(feature = "tracing")]
                tracing::trace!(
                    uid = member.uid(),
                    total = _total,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Processed"
                );

                if let Some(records) = &self.records {
                    records.lock().push(member);
                }
            }
            Err(_error) => {
                self.counters.failed.fetch_add(1, Ordering::SeqCst);
                increment_failed();

                #[cfg(feature = "tracing")]
                tracing::warn!(
                    uid = %record.uid,
                    sequence = record.sequence,
                    error = %_error,
                    per_item = _error.is_per_item(),
                    "Failed to persist member"
                );
            }
        }

        record_persist_latency(elapsed.as_secs_f64() * 1000.0);
        #[cfg(not(feature = "tracing"))]
        let _ = record;

        if self.is_drained() {
            self.drained.notify_waiters();
        }
    }

    /// Records that the dispatcher will admit nothing more.
    pub(crate) fn mark_exhausted(&self) {
        self.exhausted.store(true, Ordering::SeqCst);
        if self.is_drained() {
            self.drained.notify_waiters();
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::SeqCst)
    }

    /// `true` once nothing more will be admitted and every admitted request
    /// has settled.
    pub fn is_drained(&self) -> bool {
        // `submitted` is final once `exhausted` is observed, and the settled
        // sum can only be under-read, never over-read.
        self.is_exhausted() && self.counters.settled() == self.counters.submitted()
    }

    /// Waits until [`is_drained`](Self::is_drained) holds.
    pub async fn wait_drained(&self) {
        loop {
            let mut notified = pin!(self.drained.notified());
            notified.as_mut().enable();
            if self.is_drained() {
                return;
            }
            notified.await;
        }
    }

    pub fn snapshot(&self, timed_out: bool) -> DrainResult {
        // Read settlements before `submitted` so the snapshot never reports
        // more settled than submitted.
        let succeeded = self.counters.succeeded();
        let failed = self.counters.failed();
        DrainResult {
            submitted: self.counters.submitted(),
            succeeded,
            failed,
            timed_out,
        }
    }

    pub fn records(&self) -> Vec<Member> {
        self.records
            .as_ref()
            .map(|records| records.lock().clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::flight::{FlightRecord, FlightState};
    use tokio::time::{Instant, timeout};

    fn settlement(seq: u64, outcome: Result<Member>) -> Settlement {
        let state = if outcome.is_ok() {
            FlightState::Completed
        } else {
            FlightState::Failed
        };
        Settlement {
            record: FlightRecord {
                uid: format!("uid-{seq}"),
                sequence: seq,
                admitted_at: Instant::now(),
                state,
            },
            outcome,
            elapsed: Duration::from_millis(1),
        }
    }

    #[test]
    fn counts_out_of_order_settlements() {
        let aggregator = Aggregator::new(true);
        for _ in 0..3 {
            aggregator.on_submitted();
        }
        aggregator.on_settled(settlement(3, Ok(Member::existing("uid-3"))));
        aggregator.on_settled(settlement(1, Err(Error::persistence("uid-1", "boom"))));
        aggregator.on_settled(settlement(2, Ok(Member::existing("uid-2"))));

        assert!(!aggregator.is_drained());
        aggregator.mark_exhausted();
        assert!(aggregator.is_drained());

        assert_eq!(
            aggregator.snapshot(false),
            DrainResult {
                submitted: 3,
                succeeded: 2,
                failed: 1,
                timed_out: false
            }
        );
        assert_eq!(aggregator.records().len(), 2);
    }

    #[test]
    fn records_are_not_kept_by_default() {
        let aggregator = Aggregator::new(false);
        aggregator.on_submitted();
        aggregator.on_settled(settlement(1, Ok(Member::existing("uid-1"))));
        assert!(aggregator.records().is_empty());
    }

    #[tokio::test]
    async fn wait_drained_wakes_on_last_settlement() {
        let aggregator = std::sync::Arc::new(Aggregator::new(false));
        aggregator.on_submitted();
        aggregator.mark_exhausted();

        let waiter = {
            let aggregator = std::sync::Arc::clone(&aggregator);
            tokio::spawn(async move { aggregator.wait_drained().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        aggregator.on_settled(settlement(1, Ok(Member::existing("uid-1"))));
        timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn timed_out_snapshot_becomes_deadline_error() {
        let result = DrainResult {
            submitted: 10,
            succeeded: 3,
            failed: 1,
            timed_out: true,
        };
        assert_eq!(
            result.into_result(Duration::from_secs(1)),
            Err(Error::DeadlineExceeded {
                timeout: Duration::from_secs(1),
                settled: 4,
                submitted: 10
            })
        );
    }
}
