//! Execution record types.

mod record;
mod status;

pub use record::ExecutionRecord;
pub use status::ExecutionStatus;
