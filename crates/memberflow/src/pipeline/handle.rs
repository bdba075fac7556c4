use super::{
    aggregator::{Aggregator, DrainResult},
    window::AdmissionWindow,
};
use core::time::Duration;
use memberflow_core::Member;
use std::sync::Arc;
use tokio::{task::JoinHandle, time::timeout};

/// Caller-side view of a running pipeline.
///
/// Dropping the handle does not cancel the run: admitted work keeps settling
/// in the background.
#[derive(Debug)]
pub struct PipelineHandle {
    aggregator: Arc<Aggregator>,
    window: Arc<AdmissionWindow>,
    dispatcher: JoinHandle<()>,
    drain_timeout: Duration,
}

impl PipelineHandle {
    pub(crate) const fn new(
        aggregator: Arc<Aggregator>,
        window: Arc<AdmissionWindow>,
        dispatcher: JoinHandle<()>,
        drain_timeout: Duration,
    ) -> Self {
        Self {
            aggregator,
            window,
            dispatcher,
            drain_timeout,
        }
    }

    /// Waits until the source is exhausted and every admitted request has
    /// settled, or until `timeout` elapses.
    ///
    /// On timeout the returned snapshot has `timed_out` set and in-flight work
    /// is left running; calling `join` again resumes the wait.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn join(&self, timeout_after: Duration) -> DrainResult {
        match timeout(timeout_after, self.aggregator.wait_drained()).await {
            Ok(()) => self.aggregator.snapshot(false),
            Err(_) => {
                let result = self.aggregator.snapshot(true);
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    submitted = result.submitted,
                    settled = result.settled(),
                    in_flight = self.in_flight(),
                    dispatch_finished = self.is_dispatch_finished(),
                    "Drain deadline exceeded"
                );
                result
            }
        }
    }

    /// [`join`](Self::join) with the run's configured drain timeout.
    pub async fn wait(&self) -> DrainResult {
        self.join(self.drain_timeout).await
    }

    pub const fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    /// Current counters, without waiting.
    pub fn snapshot(&self) -> DrainResult {
        self.aggregator.snapshot(false)
    }

    pub fn is_drained(&self) -> bool {
        self.aggregator.is_drained()
    }

    /// `true` once the dispatcher has stopped admitting requests.
    pub fn is_dispatch_finished(&self) -> bool {
        self.dispatcher.is_finished()
    }

    pub fn in_flight(&self) -> usize {
        self.window.in_flight()
    }

    /// Highest number of simultaneously in-flight requests seen so far.
    pub fn peak_in_flight(&self) -> usize {
        self.window.peak()
    }

    /// Members created so far. Empty unless the run retains records.
    pub fn records(&self) -> Vec<Member> {
        self.aggregator.records()
    }
}
