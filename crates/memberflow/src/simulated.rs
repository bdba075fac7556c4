//! A [`MemberStore`] with configurable latency and failure injection.
//!
//! Wraps a [`MemberService`] and delays every create by a fixed latency plus
//! optional random jitter. Used by the binary and by load scenarios to model a
//! slow backing store.

use core::time::Duration;
use memberflow_core::{
    CreateRequest, Error, InMemoryMemberRepository, Member, MemberRepository, MemberService,
    MemberStore, Result,
};
use rand::Rng;

#[derive(Debug)]
pub struct SimulatedStore<R = InMemoryMemberRepository> {
    service: MemberService<R>,
    latency: Duration,
    jitter: Duration,
    fail_every: Option<u64>,
}

impl<R> Clone for SimulatedStore<R> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            latency: self.latency,
            jitter: self.jitter,
            fail_every: self.fail_every,
        }
    }
}

impl SimulatedStore<InMemoryMemberRepository> {
    /// A store over a fresh in-memory repository.
    pub fn in_memory(latency: Duration) -> Self {
        Self::new(MemberService::new(InMemoryMemberRepository::new()), latency)
    }
}

impl<R: MemberRepository> SimulatedStore<R> {
    pub const fn new(service: MemberService<R>, latency: Duration) -> Self {
        Self {
            service,
            latency,
            jitter: Duration::ZERO,
            fail_every: None,
        }
    }

    /// Adds up to `jitter` of uniformly random extra latency per call.
    #[must_use]
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Fails every request whose sequence is a multiple of `n`. `0` disables
    /// injection.
    #[must_use]
    pub fn with_fail_every(mut self, n: u64) -> Self {
        self.fail_every = if n == 0 { None } else { Some(n) };
        self
    }

    pub const fn service(&self) -> &MemberService<R> {
        &self.service
    }

    pub const fn latency(&self) -> Duration {
        self.latency
    }

    fn delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.latency;
        }
        let extra = rand::rng().random_range(0..=self.jitter.as_micros() as u64);
        self.latency + Duration::from_micros(extra)
    }

    fn should_fail(&self, request: &CreateRequest) -> bool {
        self.fail_every.is_some_and(|n| request.sequence % n == 0)
    }
}

impl<R: MemberRepository> MemberStore for SimulatedStore<R> {
    async fn create(&self, request: CreateRequest) -> Result<Member> {
        let delay = self.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.should_fail(&request) {
            return Err(Error::persistence(request.uid, "injected failure"));
        }
        self.service.create(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn create_waits_for_latency() {
        let store = SimulatedStore::in_memory(Duration::from_millis(10));
        let started = Instant::now();
        let member = store
            .create(CreateRequest::from_sequence(1))
            .await
            .unwrap();

        assert_eq!(member.uid(), "uid-1");
        assert!(started.elapsed() >= Duration::from_millis(10));
        assert_eq!(store.service().repository().len(), 1);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let store = SimulatedStore::in_memory(Duration::from_millis(5))
            .with_jitter(Duration::from_millis(3));
        for _ in 0..32 {
            let delay = store.delay();
            assert!(delay >= Duration::from_millis(5));
            assert!(delay <= Duration::from_millis(8));
        }
    }

    #[tokio::test]
    async fn injects_failures_by_sequence() {
        let store = SimulatedStore::in_memory(Duration::ZERO).with_fail_every(3);

        assert!(store.create(CreateRequest::from_sequence(1)).await.is_ok());
        let err = store
            .create(CreateRequest::from_sequence(3))
            .await
            .unwrap_err();
        assert_eq!(err, Error::persistence("uid-3", "injected failure"));
        assert!(store.service().get_member("uid-3").await.unwrap().is_none());
    }

    #[test]
    fn zero_disables_failure_injection() {
        let store = SimulatedStore::in_memory(Duration::ZERO).with_fail_every(0);
        assert!(!store.should_fail(&CreateRequest::from_sequence(10)));
    }
}
