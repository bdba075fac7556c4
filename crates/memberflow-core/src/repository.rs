use crate::{CreateRequest, Member, Result};
use core::future::Future;

/// Persistence contract for [`Member`] records.
///
/// Implementations must be safe to call concurrently from many tasks. `save`
/// follows the entity's `is_new` flag: new members are inserted and must not
/// already exist, existing members are updated and must already exist.
pub trait MemberRepository: Send + Sync + 'static {
    /// Inserts or updates `member` and returns the stored record.
    ///
    /// # Errors
    ///
    /// - [`Error::Duplicate`] when inserting a uid that already exists.
    /// - [`Error::NotFound`] when updating a uid that does not exist.
    ///
    /// [`Error::Duplicate`]: crate::Error::Duplicate
    /// [`Error::NotFound`]: crate::Error::NotFound
    fn save(&self, member: Member) -> impl Future<Output = Result<Member>> + Send;

    fn find_by_id(&self, uid: &str) -> impl Future<Output = Result<Option<Member>>> + Send;

    fn find_all(&self) -> impl Future<Output = Result<Vec<Member>>> + Send;

    /// Removes the member if present. Deleting a missing uid is not an error.
    fn delete_by_id(&self, uid: &str) -> impl Future<Output = Result<()>> + Send;

    fn count(&self) -> impl Future<Output = Result<usize>> + Send;
}

/// The narrow collaborator contract consumed by the write pipeline.
///
/// Given a request, asynchronously returns the created [`Member`] or a typed
/// failure. The pipeline treats every failure as recoverable and skippable, so
/// implementations should return errors rather than panic.
pub trait MemberStore: Send + Sync + 'static {
    fn create(&self, request: CreateRequest) -> impl Future<Output = Result<Member>> + Send;
}
