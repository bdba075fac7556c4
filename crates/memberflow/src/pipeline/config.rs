use core::time::Duration;
use memberflow_core::{Error, Result};
use tokio::sync::Semaphore;

/// Default admission window width.
pub const DEFAULT_CONCURRENCY_BOUND: usize = 256;

/// Default lookahead into the request source.
pub const DEFAULT_PREFETCH_WINDOW: usize = 256;

/// Default upper bound on how long a drain may take.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(3000);

/// Immutable configuration of one pipeline run.
///
/// `concurrency_bound` caps simultaneous persistence calls. `prefetch_window`
/// caps how far ahead of admission the source is drained into the dispatcher's
/// buffer. The two are independent. `worker_pool_size` selects off-loading:
/// `None` runs each call on its own runtime task, `Some(n)` routes calls
/// through a pool of `n` workers. When the pipeline has a pool attached, `n`
/// must equal that pool's size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub concurrency_bound: usize,
    pub prefetch_window: usize,
    pub worker_pool_size: Option<usize>,
    pub drain_timeout: Duration,
    /// Keep every created member for [`PipelineHandle::records`].
    ///
    /// [`PipelineHandle::records`]: super::PipelineHandle::records
    pub retain_records: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency_bound: DEFAULT_CONCURRENCY_BOUND,
            prefetch_window: DEFAULT_PREFETCH_WINDOW,
            worker_pool_size: None,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            retain_records: false,
        }
    }
}

impl PipelineConfig {
    pub fn new(concurrency_bound: usize, prefetch_window: usize) -> Self {
        Self {
            concurrency_bound,
            prefetch_window,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_worker_pool(mut self, size: usize) -> Self {
        self.worker_pool_size = Some(size);
        self
    }

    #[must_use]
    pub const fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    #[must_use]
    pub const fn retain_records(mut self, retain: bool) -> Self {
        self.retain_records = retain;
        self
    }

    /// Buffer level at which the dispatcher pulls the next prefetch batch.
    ///
    /// Replenishment kicks in once three quarters of the window are consumed.
    pub const fn low_water_mark(&self) -> usize {
        self.prefetch_window >> 2
    }

    /// Rejects bounds that would stall or disable the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `concurrency_bound`,
    /// `prefetch_window` or an explicit `worker_pool_size` is zero, or if
    /// `concurrency_bound` exceeds what a semaphore can hand out.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency_bound == 0 {
            return Err(Error::configuration(
                "concurrency bound must be greater than 0",
            ));
        }
        if self.concurrency_bound > Semaphore::MAX_PERMITS {
            return Err(Error::configuration(format!(
                "concurrency bound must not exceed {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.prefetch_window == 0 {
            return Err(Error::configuration(
                "prefetch window must be greater than 0",
            ));
        }
        if self.worker_pool_size == Some(0) {
            return Err(Error::configuration(
                "worker pool size must be greater than 0",
            ));
        }
        Ok(())
    }
}
