//! Bounded admission window.
//!
//! The window is a semaphore sized to the concurrency bound plus an atomic
//! in-flight gauge. A request is in flight from the moment its
//! [`AdmissionPermit`] is issued until the permit is dropped at settlement.

use crate::telemetry::{decrement_inflight, increment_inflight};
use memberflow_core::{Error, Result};
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug)]
pub struct AdmissionWindow {
    permits: Arc<Semaphore>,
    bound: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl AdmissionWindow {
    pub fn new(bound: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(bound)),
            bound,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub const fn bound(&self) -> usize {
        self.bound
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Highest in-flight count observed so far.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    /// Waits for a free slot and admits one request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelError`] if the window has been closed.
    pub async fn admit(self: &Arc<Self>) -> Result<AdmissionPermit> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| Error::ChannelError {
                context: "admission window closed".to_string(),
            })?;

        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        increment_inflight();

        Ok(AdmissionPermit {
            window: Arc::clone(self),
            _permit: permit,
        })
    }

    /// Stops issuing permits. Pending and future [`admit`](Self::admit) calls
    /// fail; permits already issued stay valid.
    pub fn close(&self) {
        self.permits.close();
    }
}

/// One occupied slot of an [`AdmissionWindow`]. Dropping it frees the slot.
#[derive(Debug)]
pub struct AdmissionPermit {
    window: Arc<AdmissionWindow>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        // The gauge drops before the semaphore permit is returned, so it never
        // exceeds the bound.
        self.window.in_flight.fetch_sub(1, Ordering::AcqRel);
        decrement_inflight();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn blocks_when_full_and_resumes_on_release() {
        let window = Arc::new(AdmissionWindow::new(2));
        let first = window.admit().await.unwrap();
        let _second = window.admit().await.unwrap();
        assert_eq!(window.in_flight(), 2);

        assert!(
            timeout(Duration::from_millis(20), window.admit())
                .await
                .is_err()
        );

        drop(first);
        assert_eq!(window.in_flight(), 1);
        let _third = timeout(Duration::from_millis(20), window.admit())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(window.in_flight(), 2);
        assert_eq!(window.peak(), 2);
    }

    #[tokio::test]
    async fn closed_window_refuses_admission() {
        let window = Arc::new(AdmissionWindow::new(1));
        window.close();
        assert!(matches!(
            window.admit().await,
            Err(Error::ChannelError { .. })
        ));
        assert_eq!(window.in_flight(), 0);
    }
}
