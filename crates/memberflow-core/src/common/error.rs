//! Error types for the member write pipeline.
//!
//! This module defines the central `Error` enum shared by the CRUD layer and
//! the pipeline. Only configuration errors are meant to reach the caller of a
//! pipeline run as a hard failure; persistence errors are per-item and are
//! absorbed by the completion aggregator.
//!
//! ## Error Cases
//! - `Configuration`: Invalid pipeline bounds, rejected before any work starts.
//! - `Persistence`: A single create call failed. Counted, never propagated.
//! - `DeadlineExceeded`: A drain wait elapsed while work was still in flight.
//! - `Duplicate`: An insert collided with an existing member.
//! - `NotFound`: An update or lookup targeted a missing member.
//! - `ChannelError`: An internal communication failure between tasks.
//! - `ServiceShutdown`: Work was offered to a worker pool that is shutting down.

use core::time::Duration;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the member pipeline.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The pipeline configuration is invalid.
    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },

    /// The persistence collaborator failed to create a member.
    #[error("Failed to persist {uid}: {reason}")]
    Persistence { uid: String, reason: String },

    /// A bounded drain wait elapsed before every admitted request settled.
    #[error("Drain deadline of {timeout:?} exceeded ({settled}/{submitted} settled)")]
    DeadlineExceeded {
        timeout: Duration,
        settled: u64,
        submitted: u64,
    },

    /// A member with the same uid already exists.
    #[error("Member {uid} already exists")]
    Duplicate { uid: String },

    /// No member exists with the given uid.
    #[error("Member {uid} not found")]
    NotFound { uid: String },

    /// Internal channel send/receive failure (e.g., closed or full channel).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The worker pool is in the process of shutting down.
    #[error("Worker pool is shutting down")]
    ServiceShutdown,
}

impl Error {
    /// Shorthand for a [`Error::Configuration`] with the given reason.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`Error::Persistence`] failure on `uid`.
    pub fn persistence(uid: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Persistence {
            uid: uid.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors that only affect a single request.
    pub const fn is_per_item(&self) -> bool {
        matches!(
            self,
            Self::Persistence { .. } | Self::Duplicate { .. } | Self::NotFound { .. }
        )
    }
}
