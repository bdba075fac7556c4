//! # Member Types
//!
//! The entity persisted by the pipeline and the request that creates it.
//!
//! - [`Member`] - A persisted member, keyed by `uid`
//! - [`CreateRequest`] - One unit of work flowing through the pipeline
//! - [`UID_PREFIX`] - Prefix used by generated identifiers

/// Prefix of every generated member identifier (`uid-1`, `uid-2`, ...).
pub const UID_PREFIX: &str = "uid-";

/// A member record.
///
/// The `is_new` flag is transient: it tells a repository whether `save` is an
/// insert or an update and is never serialized.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Member {
    uid: String,
    #[cfg_attr(feature = "serde", serde(skip))]
    is_new: bool,
}

impl Member {
    /// A member that has not been persisted yet. Saving it inserts.
    pub fn new_member(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            is_new: true,
        }
    }

    /// A member loaded from storage. Saving it updates.
    pub fn existing(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            is_new: false,
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub const fn is_new(&self) -> bool {
        self.is_new
    }

    /// Marks the member as persisted.
    #[must_use]
    pub fn persisted(mut self) -> Self {
        self.is_new = false;
        self
    }

    pub fn set_uid(&mut self, uid: impl Into<String>) {
        self.uid = uid.into();
    }
}

/// A request to create one member.
///
/// `sequence` is the 1-based position of the request in its source. It is
/// informational only; the pipeline never relies on completion order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CreateRequest {
    pub uid: String,
    pub sequence: u64,
}

impl CreateRequest {
    pub fn new(uid: impl Into<String>, sequence: u64) -> Self {
        Self {
            uid: uid.into(),
            sequence,
        }
    }

    /// Builds the request for position `sequence` using [`UID_PREFIX`].
    pub fn from_sequence(sequence: u64) -> Self {
        Self {
            uid: format!("{UID_PREFIX}{sequence}"),
            sequence,
        }
    }
}
