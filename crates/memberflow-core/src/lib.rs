#![doc = include_str!("../README.md")]

mod common;
mod memory;
mod repository;
mod service;

pub use common::*;
pub use memory::*;
pub use repository::*;
pub use service::*;
