use crate::{Error, Member, MemberRepository, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// A [`MemberRepository`] backed by an ordered in-process map.
///
/// Stands in for a real database in tests and in the simulated store. Locks are
/// never held across an await point.
#[derive(Debug, Default)]
pub struct InMemoryMemberRepository {
    members: RwLock<BTreeMap<String, Member>>,
}

impl InMemoryMemberRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored members, without going through the async contract.
    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }
}

impl MemberRepository for InMemoryMemberRepository {
    async fn save(&self, member: Member) -> Result<Member> {
        let mut members = self.members.write();
        let exists = members.contains_key(member.uid());

        match (member.is_new(), exists) {
            (true, true) => Err(Error::Duplicate {
                uid: member.uid().to_string(),
            }),
            (false, false) => Err(Error::NotFound {
                uid: member.uid().to_string(),
            }),
            _ => {
                let stored = member.persisted();
                members.insert(stored.uid().to_string(), stored.clone());
                Ok(stored)
            }
        }
    }

    async fn find_by_id(&self, uid: &str) -> Result<Option<Member>> {
        Ok(self.members.read().get(uid).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Member>> {
        Ok(self.members.read().values().cloned().collect())
    }

    async fn delete_by_id(&self, uid: &str) -> Result<()> {
        self.members.write().remove(uid);
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_then_duplicate_is_rejected() {
        let repo = InMemoryMemberRepository::new();
        let saved = repo.save(Member::new_member("uid-1")).await.unwrap();
        assert!(!saved.is_new());

        let err = repo.save(Member::new_member("uid-1")).await.unwrap_err();
        assert_eq!(
            err,
            Error::Duplicate {
                uid: "uid-1".into()
            }
        );
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn update_requires_existing_row() {
        let repo = InMemoryMemberRepository::new();
        let err = repo.save(Member::existing("uid-9")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));

        repo.save(Member::new_member("uid-9")).await.unwrap();
        let updated = repo.save(Member::existing("uid-9")).await.unwrap();
        assert_eq!(updated.uid(), "uid-9");
    }

    #[tokio::test]
    async fn find_all_is_ordered_by_uid() {
        let repo = InMemoryMemberRepository::new();
        for uid in ["uid-b", "uid-a", "uid-c"] {
            repo.save(Member::new_member(uid)).await.unwrap();
        }
        let uids: Vec<_> = repo
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.uid().to_string())
            .collect();
        assert_eq!(uids, ["uid-a", "uid-b", "uid-c"]);

        repo.delete_by_id("uid-b").await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 2);
        assert!(repo.find_by_id("uid-b").await.unwrap().is_none());
    }
}
