use crate::{CreateRequest, Error, Member, MemberRepository, MemberStore, Result};
use std::sync::Arc;

/// CRUD operations for members on top of a [`MemberRepository`].
///
/// The service is cheap to clone; clones share the same repository.
#[derive(Debug)]
pub struct MemberService<R> {
    repository: Arc<R>,
}

impl<R> Clone for MemberService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: MemberRepository> MemberService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    pub const fn from_arc(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Inserts a new member with the given uid.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
    pub async fn create_member(&self, uid: impl Into<String>) -> Result<Member> {
        self.repository.save(Member::new_member(uid)).await
    }

    pub async fn get_member(&self, uid: &str) -> Result<Option<Member>> {
        self.repository.find_by_id(uid).await
    }

    pub async fn get_all_members(&self) -> Result<Vec<Member>> {
        self.repository.find_all().await
    }

    /// Re-saves an existing member.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no member has this uid.
    pub async fn update_member(&self, uid: &str) -> Result<Member> {
        let mut existing = self
            .repository
            .find_by_id(uid)
            .await?
            .ok_or_else(|| Error::NotFound {
                uid: uid.to_string(),
            })?;
        existing.set_uid(uid);
        self.repository.save(existing).await
    }

    pub async fn delete_member(&self, uid: &str) -> Result<()> {
        self.repository.delete_by_id(uid).await
    }
}

impl<R: MemberRepository> MemberStore for MemberService<R> {
    async fn create(&self, request: CreateRequest) -> Result<Member> {
        self.create_member(request.uid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryMemberRepository;

    fn service() -> MemberService<InMemoryMemberRepository> {
        MemberService::new(InMemoryMemberRepository::new())
    }

    #[tokio::test]
    async fn crud_round() {
        let service = service();
        service.create_member("uid-1").await.unwrap();
        service.create_member("uid-2").await.unwrap();

        assert_eq!(service.get_all_members().await.unwrap().len(), 2);
        assert_eq!(
            service.get_member("uid-1").await.unwrap(),
            Some(Member::existing("uid-1"))
        );

        let updated = service.update_member("uid-2").await.unwrap();
        assert_eq!(updated.uid(), "uid-2");

        service.delete_member("uid-1").await.unwrap();
        assert!(service.get_member("uid-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_missing_member_fails() {
        let err = service().update_member("uid-404").await.unwrap_err();
        assert_eq!(
            err,
            Error::NotFound {
                uid: "uid-404".into()
            }
        );
    }

    #[tokio::test]
    async fn store_contract_creates_once() {
        let service = service();
        let member = service
            .create(CreateRequest::from_sequence(3))
            .await
            .unwrap();
        assert_eq!(member.uid(), "uid-3");

        let err = service
            .create(CreateRequest::from_sequence(3))
            .await
            .unwrap_err();
        assert!(err.is_per_item());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_are_all_stored() {
        let service = service();
        let tasks: Vec<_> = (1..=64)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move { service.create_member(format!("uid-{i}")).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(service.repository().len(), 64);
    }
}
