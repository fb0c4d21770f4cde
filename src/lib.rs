//! # Tierflow: provincial-tier data exchange node
//!
//! `tierflow` sits between city-level participants and the national node.
//! Every interface call runs a *process*: an ordered, externally configured
//! pipeline of nodes that authenticate the caller, open its envelope,
//! validate and remap parameters, re-seal the payload for the national node,
//! forward it, and seal the reply back for the caller.
//!
//! - **Process engine**: ordered node pipeline with exponential-backoff
//!   retries, fire-and-forget async nodes, an execution record per run and
//!   a lease-guarded replay.
//! - **Recovery job**: periodically re-drives transient failures with
//!   bounded concurrency.
//! - **Envelope codec** (`tierflow-envelope`): sign-then-encrypt hybrid
//!   envelope used on every cross-tier hop.
//! - **Validation engine**: declarative, recursive rule trees over nested
//!   maps, arrays and JSON strings.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use tierflow::gateway::{Collaborators, Gateway};
//! use tierflow::store::*;
//! use tierflow::{GatewayConfig, RuntimeContext};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = GatewayConfig::load("gateway.yaml").unwrap();
//!     let gateway = Gateway::build(
//!         config,
//!         Collaborators {
//!             interfaces: Arc::new(MemoryInterfaceDefinitionStore::new()),
//!             organizations: Arc::new(MemoryOrganizationDirectory::new()),
//!             tokens: Arc::new(MemoryTokenStore::new()),
//!             authorization_letters: Arc::new(MemoryAuthorizationLetterStore::new()),
//!             request_logs: Arc::new(MemoryRequestLogStore::new()),
//!             node_configs: Arc::new(MemoryNodeConfigStore::new()),
//!             records: Arc::new(MemoryExecutionStore::new()),
//!             national_client: None,
//!         },
//!         RuntimeContext::default(),
//!     )
//!     .unwrap();
//!     let body = json!({"txnBodyCom": {}, "txnCommCom": {}});
//!     let response = gateway.handle("IF001", "city-a", &body, None).await;
//!     println!("{}", serde_json::to_string(&response).unwrap());
//! }
//! ```

pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod nodes;
pub mod response;
pub mod store;
pub mod validation;

pub use tierflow_envelope as envelope;

pub use crate::config::{ConfigError, ConfigFormat, GatewayConfig};
pub use crate::core::{
    AsyncNodePool, AsyncPoolConfig, EngineConfig, IdGenerator, ProcessContext, ProcessEngine,
    RealIdGenerator, RealTimeProvider, RecoveryConfig, RecoveryJob, RecoveryReport, RetryPolicy,
    RuntimeContext, TimeProvider,
};
pub use crate::domain::{ExecutionRecord, ExecutionStatus, Tier};
pub use crate::error::{EngineError, ErrorCategory, NodeError, ResultCode, StoreError};
pub use crate::gateway::{Collaborators, Gateway};
pub use crate::nodes::{Node, NodeDependencies, NodeRegistry};
pub use crate::response::{CallerResponse, ProcessResult};
pub use crate::validation::{ValidationEngine, ValidationFailure};
