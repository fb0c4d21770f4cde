//! Domain layer: value types shared by the engine, the nodes and the stores.
//!
//! Submodules:
//! - [`execution`]: execution record and its status machine.
//! - [`tier`]: the hierarchical role a signing or verifying node acts for.

pub mod execution;
pub mod tier;

pub use execution::{ExecutionRecord, ExecutionStatus};
pub use tier::Tier;
