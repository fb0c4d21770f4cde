pub mod async_pool;
pub mod engine;
pub mod process_context;
pub mod recovery;
pub mod retry;
pub mod runtime_context;

pub use async_pool::{AsyncNodePool, AsyncPoolConfig, Dispatch};
pub use engine::{EngineConfig, ProcessEngine};
pub use process_context::{keys, Outcome, ProcessContext};
pub use recovery::{RecoveryConfig, RecoveryJob, RecoveryReport};
pub use retry::RetryPolicy;
pub use runtime_context::{
    IdGenerator, RealIdGenerator, RealTimeProvider, RuntimeContext, TimeProvider,
};
