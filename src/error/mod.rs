//! Error types for the provincial node.
//!
//! - [`ResultCode`]: stable (code, message) pairs returned to callers.
//! - [`NodeError`]: failures inside a single pipeline node.
//! - [`StoreError`]: persistence failures.
//! - [`EngineError`]: engine-level failures (unknown execution, replay conflict).

pub mod engine_error;
pub mod node_error;
pub mod result_code;
pub mod store_error;

pub use engine_error::EngineError;
pub use node_error::NodeError;
pub use result_code::{category_of, ErrorCategory, ResultCode};
pub use store_error::StoreError;

/// Convenience alias for node-level results.
pub type NodeResult<T> = Result<T, NodeError>;
/// Convenience alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
