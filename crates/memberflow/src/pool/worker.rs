use super::request::WorkRequest;
use core::panic::AssertUnwindSafe;
use futures::FutureExt;
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// Decrements the pool's pending count once the job is finished or dropped,
/// including when the worker task itself is torn down mid-job.
struct PendingJob<'a>(&'a AtomicUsize);

impl Drop for PendingJob<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Worker task responsible for executing off-loaded [`WorkRequest`]s.
///
/// All workers of a pool share one receiver. A worker holds the receiver lock
/// only while waiting for the next message, never while running a job, so at
/// most `size` jobs run at once and the rest wait in the queue.
///
/// The loop ends when a [`WorkRequest::Shutdown`] is received or when every
/// sender has been dropped and the queue is empty.
///
/// # Arguments
///
/// - `worker_id`: Index of this worker (used for logs/tracing).
/// - `queue`: Shared receiving half of the pool's bounded queue.
/// - `shutdown_token`: Once cancelled, queued jobs are dropped unexecuted.
/// - `pending`: Count of submitted but unfinished jobs, decremented here.
pub async fn worker_loop(
    worker_id: usize,
    queue: Arc<Mutex<mpsc::Receiver<WorkRequest>>>,
    shutdown_token: CancellationToken,
    pending: Arc<AtomicUsize>,
) {
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} started");

    loop {
        let work = {
            let mut rx = queue.lock().await;
            rx.recv().await
        };

        let Some(work) = work else {
            break;
        };

        match work {
            WorkRequest::Execute { job } => {
                let _pending = PendingJob(pending.as_ref());
                if shutdown_token.is_cancelled() {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Worker {worker_id} dropping job after cancellation");
                    drop(job);
                } else if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Worker {worker_id} recovered from a panicking job");
                }
            }
            WorkRequest::Shutdown { response } => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Worker {worker_id} received shutdown signal");

                if response.send(()).is_err() {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Worker {worker_id} failed to acknowledge shutdown");
                }
                break;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} stopped");
    #[cfg(not(feature = "tracing"))]
    let _ = worker_id;
}
