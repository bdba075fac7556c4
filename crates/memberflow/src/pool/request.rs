use futures::future::BoxFuture;
use tokio::sync::oneshot;

/// A unit of off-loaded work. The job reports its own outcome; the pool only
/// drives it to completion.
pub type Job = BoxFuture<'static, ()>;

/// A message sent from the [`WorkerPool`] to its workers.
///
/// [`WorkRequest`]s travel over the pool's bounded queue and are consumed by
/// the first idle worker.
///
/// [`WorkerPool`]: super::WorkerPool
pub enum WorkRequest {
    /// Run `job` to completion on the receiving worker.
    Execute { job: Job },

    /// Request the receiving worker to stop.
    ///
    /// - `response`: One-shot channel acknowledging that the worker has left
    ///   its loop.
    Shutdown { response: oneshot::Sender<()> },
}

impl core::fmt::Debug for WorkRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Execute { .. } => f.write_str("WorkRequest::Execute"),
            Self::Shutdown { .. } => f.write_str("WorkRequest::Shutdown"),
        }
    }
}
