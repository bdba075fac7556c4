//! Fixed-capacity pool of asynchronous workers.
//!
//! This module defines the [`WorkerPool`] struct, which owns the sending half
//! of a bounded work queue and a set of worker tasks draining it. Submission
//! only waits when the queue is full; execution happens on whichever worker is
//! idle first. The pool supports coordinated shutdown via a shared
//! [`CancellationToken`].

use super::{
    request::{Job, WorkRequest},
    worker::worker_loop,
};
use core::time::Duration;
use memberflow_core::{Error, Result};
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::{
    runtime::Handle,
    sync::{Mutex, Semaphore, mpsc, oneshot},
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;

/// Default time [`WorkerPool::shutdown`] waits for pending jobs to drain.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// How long each worker gets to acknowledge a shutdown request.
const WORKER_ACK_TIMEOUT: Duration = Duration::from_secs(3);

/// A cooperative pool of asynchronous workers that execute [`Job`]s.
///
/// Workers share one bounded MPSC queue. Each worker runs a single job at a
/// time, so the number of concurrently executing jobs never exceeds
/// [`size`](Self::size).
#[derive(Debug)]
pub struct WorkerPool {
    queue: mpsc::Sender<WorkRequest>,
    size: usize,
    pending: Arc<AtomicUsize>,
    shutdown_token: CancellationToken,
    shutdown_timeout: Duration,
}

impl WorkerPool {
    /// Spawns `size` workers on the current Tokio runtime, fed by a queue
    /// holding up to `queue_capacity` jobs.
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] if `size` or `queue_capacity` is zero, if
    ///   `queue_capacity` is too large for a bounded channel, or if no Tokio
    ///   runtime is running.
    pub fn spawn(size: usize, queue_capacity: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::configuration("worker pool size must be at least 1"));
        }
        if queue_capacity == 0 || queue_capacity > Semaphore::MAX_PERMITS {
            return Err(Error::configuration(format!(
                "worker pool queue capacity must be between 1 and {}",
                Semaphore::MAX_PERMITS
            )));
        }
        let handle = Handle::try_current().map_err(|e| {
            Error::configuration(format!("worker pool requires a Tokio runtime: {e}"))
        })?;

        let (tx, rx) = mpsc::channel(queue_capacity);
        let queue = Arc::new(Mutex::new(rx));
        let pending = Arc::new(AtomicUsize::new(0));
        let shutdown_token = CancellationToken::new();

        for worker_id in 0..size {
            handle.spawn(worker_loop(
                worker_id,
                Arc::clone(&queue),
                shutdown_token.clone(),
                Arc::clone(&pending),
            ));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Spawned worker pool with {size} workers (queue capacity {queue_capacity})");

        Ok(Self {
            queue: tx,
            size,
            pending,
            shutdown_token,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        })
    }

    /// Overrides how long [`shutdown`](Self::shutdown) waits for pending jobs.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    /// Number of workers, i.e. the maximum number of concurrently running jobs.
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Jobs submitted but not yet finished (queued or running).
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_token.is_cancelled() || self.queue.is_closed()
    }

    /// Enqueues `job` for execution on the next idle worker.
    ///
    /// Waits only if the queue is full. If the job is refused it is dropped,
    /// which lets any guard it owns observe the refusal.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The pool is shutting down (`shutdown_token` was cancelled).
    /// - Every worker has exited and the queue is closed.
    pub async fn submit(&self, job: Job) -> Result<()> {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }

        self.pending.fetch_add(1, Ordering::AcqRel);
        match self.queue.send(WorkRequest::Execute { job }).await {
            Ok(()) => Ok(()),
            Err(_) => {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                Err(Error::ChannelError {
                    context: "worker pool queue closed".to_string(),
                })
            }
        }
    }

    /// Gracefully shuts down all workers in the pool.
    ///
    /// - Waits (up to the shutdown timeout) for pending jobs to finish.
    /// - Cancels the shared [`CancellationToken`] so queued jobs are dropped
    ///   and new submissions are refused.
    /// - Sends a [`WorkRequest::Shutdown`] to each worker and waits (up to 3
    ///   seconds per worker) for acknowledgements.
    pub async fn shutdown(&self) -> Result<()> {
        // === Phase 1: Wait for pending jobs to drain ===
        #[cfg(feature = "tracing")]
        tracing::info!("Draining worker pool ({} jobs pending)", self.pending());
        let drain_result = timeout(self.shutdown_timeout, async {
            while self.pending() > 0 {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        if drain_result.is_err() {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                "Worker pool drain timed out ({} jobs still pending)",
                self.pending()
            );
        }

        // === Phase 2: Refuse new work and drop anything still queued ===
        self.shutdown_token.cancel();

        // === Phase 3: Notify workers to shut down ===
        let mut shutdown_handles = Vec::with_capacity(self.size);
        for _i in 0..self.size {
            let (tx, rx) = oneshot::channel();
            if let Err(_e) = self.queue.send(WorkRequest::Shutdown { response: tx }).await {
                #[cfg(feature = "tracing")]
                tracing::debug!("Worker queue already closed, skipping shutdown notice {_i}");
                break;
            }
            shutdown_handles.push((_i, rx));
        }

        let ack_futures = shutdown_handles.into_iter().map(|(_i, rx)| async move {
            match timeout(WORKER_ACK_TIMEOUT, rx).await {
                Ok(Ok(())) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("Shutdown notice {_i} acknowledged");
                }
                Ok(Err(_e)) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Shutdown notice {_i} dropped: {_e}");
                }
                Err(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Shutdown notice {_i} timed out");
                }
            }
        });

        futures::future::join_all(ack_futures).await;

        #[cfg(feature = "tracing")]
        tracing::info!("Worker pool shutdown complete");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[tokio::test]
    async fn rejects_zero_sizes() {
        assert!(matches!(
            WorkerPool::spawn(0, 4),
            Err(Error::Configuration { .. })
        ));
        assert!(matches!(
            WorkerPool::spawn(4, 0),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn requires_a_runtime() {
        assert!(matches!(
            WorkerPool::spawn(1, 1),
            Err(Error::Configuration { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_runs_more_jobs_than_workers() {
        const WORKERS: usize = 3;
        let pool = WorkerPool::spawn(WORKERS, 64).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut done = Vec::new();

        for _ in 0..32 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let (tx, rx) = oneshot::channel();
            done.push(rx);
            pool.submit(
                async move {
                    let now = running.fetch_add(1, Ordering::AcqRel) + 1;
                    peak.fetch_max(now, Ordering::AcqRel);
                    sleep(Duration::from_millis(2)).await;
                    running.fetch_sub(1, Ordering::AcqRel);
                    let _ = tx.send(());
                }
                .boxed(),
            )
            .await
            .unwrap();
        }

        for rx in done {
            rx.await.unwrap();
        }
        assert!(peak.load(Ordering::Acquire) <= WORKERS);
        // A job signals before its worker has counted it as finished.
        wait_for_idle(&pool).await;
        assert_eq!(pool.pending(), 0);
    }

    async fn wait_for_idle(pool: &WorkerPool) {
        timeout(Duration::from_secs(1), async {
            while pool.pending() > 0 {
                sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("pool never went idle");
    }

    #[tokio::test]
    async fn panicking_job_does_not_kill_worker() {
        let pool = WorkerPool::spawn(1, 4).unwrap();
        pool.submit(async { panic!("boom") }.boxed()).await.unwrap();

        let (tx, rx) = oneshot::channel();
        pool.submit(
            async move {
                let _ = tx.send(7);
            }
            .boxed(),
        )
        .await
        .unwrap();
        assert_eq!(rx.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn shutdown_refuses_new_work() {
        let pool = WorkerPool::spawn(2, 4)
            .unwrap()
            .with_shutdown_timeout(Duration::from_millis(100));
        pool.shutdown().await.unwrap();

        assert!(pool.is_shutting_down());
        let err = pool.submit(async {}.boxed()).await.unwrap_err();
        assert_eq!(err, Error::ServiceShutdown);
    }
}
