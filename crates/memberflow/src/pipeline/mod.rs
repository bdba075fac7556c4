//! Bounded-concurrency write pipeline.
//!
//! A run streams requests from a source into a [`MemberStore`] while keeping
//! at most `concurrency_bound` calls in flight:
//!
//! ```text
//! source -> dispatcher (prefetch buffer + admission window) -> [worker pool]
//!        -> MemberStore::create -> aggregator -> PipelineHandle::join
//! ```
//!
//! ## Submodules
//!
//! - [`config`] - Run configuration and validation.
//! - [`source`] - The counter-driven [`UidSource`].
//! - [`window`] - The [`AdmissionWindow`] bounding in-flight requests.
//! - [`flight`] - Per-request state between admission and settlement.
//! - [`aggregator`] - Counters, failure containment and drain detection.
//! - `dispatcher` - The admission loop.
//! - [`handle`] - The caller's [`PipelineHandle`].

pub mod aggregator;
pub mod config;
mod dispatcher;
pub mod flight;
pub mod handle;
pub mod source;
pub mod window;


pub use aggregator::{Counters, DrainResult};
pub use config::PipelineConfig;
pub use flight::{FlightRecord, FlightState};
pub use handle::PipelineHandle;
pub use source::UidSource;
pub use window::AdmissionWindow;

use crate::pool::WorkerPool;
use aggregator::Aggregator;
use dispatcher::Dispatcher;
use memberflow_core::{CreateRequest, Error, MemberStore, Result};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Entry point for pipeline runs against one [`MemberStore`].
///
/// A pipeline may carry a shared [`WorkerPool`]; runs that ask for off-loading
/// use it and must request exactly its size. Runs on a pipeline without one
/// get a pool of their own sized by [`PipelineConfig::worker_pool_size`].
#[derive(Debug)]
pub struct Pipeline<S> {
    store: Arc<S>,
    pool: Option<Arc<WorkerPool>>,
}

impl<S> Clone for Pipeline<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            pool: self.pool.clone(),
        }
    }
}

impl<S: MemberStore> Pipeline<S> {
    pub fn new(store: S) -> Self {
        Self::from_arc(Arc::new(store))
    }

    pub const fn from_arc(store: Arc<S>) -> Self {
        Self { store, pool: None }
    }

    /// Attaches a long-lived pool that every off-loading run shares.
    #[must_use]
    pub fn with_worker_pool(mut self, pool: Arc<WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn worker_pool(&self) -> Option<&Arc<WorkerPool>> {
        self.pool.as_ref()
    }

    /// Validates `config` and starts streaming `source` on the current Tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] before the source is touched if the
    /// configuration is invalid, no Tokio runtime is running, the attached
    /// pool's size differs from `worker_pool_size`, or an off-loading pool
    /// cannot be spawned.
    pub fn submit<I>(&self, source: I, config: PipelineConfig) -> Result<PipelineHandle>
    where
        I: IntoIterator<Item = CreateRequest>,
        I::IntoIter: Send + 'static,
    {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| {
            Error::configuration(format!("pipeline requires a Tokio runtime: {e}"))
        })?;

        let pool = match (config.worker_pool_size, &self.pool) {
            (None, _) => None,
            (Some(size), Some(shared)) if shared.size() != size => {
                return Err(Error::configuration(format!(
                    "run asks for {size} workers but the attached pool has {}",
                    shared.size()
                )));
            }
            (Some(_), Some(shared)) => Some(Arc::clone(shared)),
            (Some(size), None) => Some(Arc::new(WorkerPool::spawn(
                size,
                config.concurrency_bound,
            )?)),
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            concurrency_bound = config.concurrency_bound,
            prefetch_window = config.prefetch_window,
            worker_pool_size = pool.as_ref().map(|p| p.size()),
            "Starting pipeline run"
        );

        let window = Arc::new(AdmissionWindow::new(config.concurrency_bound));
        let aggregator = Arc::new(Aggregator::new(config.retain_records));
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.store),
            source.into_iter(),
            &config,
            Arc::clone(&window),
            Arc::clone(&aggregator),
            pool,
        );

        let fut = dispatcher.run();
        #[cfg(feature = "tracing")]
        let fut = {
            use tracing::Instrument;
            fut.instrument(tracing::info_span!("pipeline"))
        };

        Ok(PipelineHandle::new(
            aggregator,
            window,
            runtime.spawn(fut),
            config.drain_timeout,
        ))
    }
}

/// Runs `source` against `store` on a fresh [`Pipeline`].
///
/// # Errors
///
/// See [`Pipeline::submit`].
pub fn run<S, I>(source: I, config: PipelineConfig, store: S) -> Result<PipelineHandle>
where
    S: MemberStore,
    I: IntoIterator<Item = CreateRequest>,
    I::IntoIter: Send + 'static,
{
    Pipeline::new(store).submit(source, config)
}
