#![doc = include_str!("../README.md")]

pub mod pipeline;
pub mod pool;
pub mod simulated;
pub mod telemetry;

pub use memberflow_core::{
    CreateRequest, Error, InMemoryMemberRepository, Member, MemberRepository, MemberService,
    MemberStore, Result, UID_PREFIX,
};
pub use pipeline::{DrainResult, Pipeline, PipelineConfig, PipelineHandle, UidSource, run};
pub use pool::WorkerPool;
pub use simulated::SimulatedStore;
