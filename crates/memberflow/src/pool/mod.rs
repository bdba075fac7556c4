//! Fixed-size worker pool for off-loading persistence calls.
//!
//! This module manages a set of asynchronous worker tasks that execute jobs
//! handed over by the dispatcher. It provides:
//!
//! - A single bounded work queue shared by every worker
//! - At most one running job per worker, so the pool never grows past its size
//! - Graceful shutdown coordination via cancellation tokens and one-shot
//!   acknowledgements
//!
//! ## Submodules
//!
//! - [`request`] - Messages exchanged between the pool and its workers.
//! - [`worker`] - Defines the worker task loop and job execution.
//! - [`manager`] - Orchestrates the pool, submission, and shutdown logic.
//!
//! The pool holds no business state. A single pool may be attached to a
//! [`Pipeline`] and reused across runs.
//!
//! [`Pipeline`]: crate::pipeline::Pipeline
pub mod manager;
pub mod request;
pub mod worker;

pub use manager::WorkerPool;
pub use request::{Job, WorkRequest};
