//! Concurrency-limited dispatch loop.
//!
//! The dispatcher pulls requests from the source into a lookahead buffer,
//! admits them through the [`AdmissionWindow`], and hands each admitted
//! request to the persistence collaborator, either on a [`WorkerPool`] or on a
//! fresh runtime task. It never awaits an individual persistence call; the
//! only place it suspends is window admission (and a full pool queue).

use super::{
    aggregator::Aggregator, config::PipelineConfig, flight::Flight, window::AdmissionWindow,
};
use crate::{
    pool::WorkerPool,
    telemetry::{increment_prefetch_batches, increment_submitted},
};
use futures::FutureExt;
use memberflow_core::{CreateRequest, MemberStore};
use std::{collections::VecDeque, sync::Arc};

pub(crate) struct Dispatcher<S, I> {
    store: Arc<S>,
    source: I,
    buffer: VecDeque<CreateRequest>,
    prefetch_window: usize,
    low_water_mark: usize,
    source_exhausted: bool,
    window: Arc<AdmissionWindow>,
    aggregator: Arc<Aggregator>,
    pool: Option<Arc<WorkerPool>>,
}

impl<S, I> Dispatcher<S, I>
where
    S: MemberStore,
    I: Iterator<Item = CreateRequest> + Send + 'static,
{
    pub(crate) fn new(
        store: Arc<S>,
        source: I,
        config: &PipelineConfig,
        window: Arc<AdmissionWindow>,
        aggregator: Arc<Aggregator>,
        pool: Option<Arc<WorkerPool>>,
    ) -> Self {
        Self {
            store,
            source,
            buffer: VecDeque::with_capacity(config.prefetch_window),
            prefetch_window: config.prefetch_window,
            low_water_mark: config.low_water_mark(),
            source_exhausted: false,
            window,
            aggregator,
            pool,
        }
    }

    /// Drives the run until the source is exhausted or the pool refuses work.
    ///
    /// The aggregator is marked exhausted when the dispatcher is dropped, so a
    /// join completes even if the source panics or the task is aborted.
    #[cfg_attr(feature = "tracing", tracing::instrument(name = "dispatch", skip_all))]
    pub(crate) async fn run(mut self) {
        loop {
            self.replenish();

            let Some(request) = self.buffer.pop_front() else {
                break;
            };

            let permit = match self.window.admit().await {
                Ok(permit) => permit,
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Stopping dispatch: {_e}");
                    break;
                }
            };

            self.aggregator.on_submitted();
            increment_submitted();
            let flight = Flight::admit(request, permit, Arc::clone(&self.aggregator));
            let job = persist(Arc::clone(&self.store), flight);

            match &self.pool {
                Some(pool) => {
                    // A refused job is dropped here and its flight settles as
                    // failed.
                    if let Err(_e) = pool.submit(job.boxed()).await {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Stopping dispatch, worker pool refused work: {_e}");
                        break;
                    }
                }
                None => {
                    tokio::spawn(job);
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            submitted = self.aggregator.counters().submitted(),
            unconsumed = self.buffer.len(),
            "Dispatch finished"
        );
    }

    /// Tops the buffer back up to `prefetch_window` once it has fallen to the
    /// low-water mark.
    fn replenish(&mut self) {
        if self.source_exhausted || self.buffer.len() > self.low_water_mark {
            return;
        }

        let wanted = self.prefetch_window - self.buffer.len();
        let before = self.buffer.len();
        self.buffer.extend(self.source.by_ref().take(wanted));
        let pulled = self.buffer.len() - before;

        if pulled < wanted {
            self.source_exhausted = true;
        }
        if pulled > 0 {
            increment_prefetch_batches();
            #[cfg(feature = "tracing")]
            tracing::trace!(pulled, buffered = self.buffer.len(), "Prefetched batch");
        }
    }
}

impl<S, I> Drop for Dispatcher<S, I> {
    fn drop(&mut self) {
        #[cfg(feature = "tracing")]
        {
            if std::thread::panicking() {
                tracing::error!(
                    submitted = self.aggregator.counters().submitted(),
                    "Dispatch aborted by a panic, no further requests will be admitted"
                );
            }
        }
        self.aggregator.mark_exhausted();
    }
}

/// The off-loaded half of a flight: one persistence call, then settlement.
async fn persist<S: MemberStore>(store: Arc<S>, mut flight: Flight) {
    let Some(request) = flight.dispatch() else {
        return;
    };
    let outcome = store.create(request).await;
    flight.settle(outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use memberflow_core::{Member, Result};
    use parking_lot::Mutex;

    /// Records every uid it is asked to create.
    #[derive(Default)]
    struct RecordingStore {
        seen: Mutex<Vec<String>>,
    }

    impl MemberStore for RecordingStore {
        async fn create(&self, request: CreateRequest) -> Result<Member> {
            self.seen.lock().push(request.uid.clone());
            Ok(Member::existing(request.uid))
        }
    }

    /// Counts how many items have been pulled from the wrapped source.
    struct CountingSource<I> {
        inner: I,
        pulled: Arc<portable_atomic::AtomicUsize>,
    }

    impl<I: Iterator> Iterator for CountingSource<I> {
        type Item = I::Item;

        fn next(&mut self) -> Option<Self::Item> {
            let item = self.inner.next();
            if item.is_some() {
                self.pulled.fetch_add(1, portable_atomic::Ordering::AcqRel);
            }
            item
        }
    }

    fn dispatcher<I>(
        source: I,
        config: &PipelineConfig,
    ) -> (Dispatcher<RecordingStore, I>, Arc<RecordingStore>, Arc<Aggregator>)
    where
        I: Iterator<Item = CreateRequest> + Send + 'static,
    {
        let store = Arc::new(RecordingStore::default());
        let aggregator = Arc::new(Aggregator::new(false));
        let dispatcher = Dispatcher::new(
            Arc::clone(&store),
            source,
            config,
            Arc::new(AdmissionWindow::new(config.concurrency_bound)),
            Arc::clone(&aggregator),
            None,
        );
        (dispatcher, store, aggregator)
    }

    #[test]
    fn replenish_respects_prefetch_window() {
        let pulled = Arc::new(portable_atomic::AtomicUsize::new(0));
        let source = CountingSource {
            inner: crate::pipeline::UidSource::new(100),
            pulled: Arc::clone(&pulled),
        };
        let config = PipelineConfig::new(4, 8);
        let (mut dispatcher, _, _) = dispatcher(source, &config);

        dispatcher.replenish();
        assert_eq!(pulled.load(portable_atomic::Ordering::Acquire), 8);

        // Above the low-water mark (8 / 4 = 2): no pull.
        for _ in 0..5 {
            dispatcher.buffer.pop_front();
        }
        dispatcher.replenish();
        assert_eq!(dispatcher.buffer.len(), 3);

        // At the low-water mark: top back up to the window.
        dispatcher.buffer.pop_front();
        dispatcher.replenish();
        assert_eq!(dispatcher.buffer.len(), 8);
        assert_eq!(pulled.load(portable_atomic::Ordering::Acquire), 14);
    }

    #[test]
    fn replenish_stops_after_exhaustion() {
        let config = PipelineConfig::new(4, 8);
        let (mut dispatcher, _, _) = dispatcher(crate::pipeline::UidSource::new(5), &config);
        dispatcher.replenish();
        assert_eq!(dispatcher.buffer.len(), 5);
        assert!(dispatcher.source_exhausted);
    }

    #[tokio::test]
    async fn admits_in_source_order_and_drains() {
        let config = PipelineConfig::new(1, 2);
        let (dispatcher, store, aggregator) =
            dispatcher(crate::pipeline::UidSource::new(5), &config);

        dispatcher.run().await;
        aggregator.wait_drained().await;

        assert_eq!(
            *store.seen.lock(),
            ["uid-1", "uid-2", "uid-3", "uid-4", "uid-5"]
        );
        assert_eq!(aggregator.snapshot(false).succeeded, 5);
    }
}
