//! Persistence boundaries consumed by the engine and the nodes, with
//! in-memory (and, for execution records, file-backed) implementations.

pub mod directory;
pub mod execution;
pub mod interface;
pub mod node_config;
pub mod request_log;

pub use directory::{
    AuthorizationLetter, AuthorizationLetterStore, MemoryAuthorizationLetterStore,
    MemoryOrganizationDirectory, MemoryTokenStore, OrgStatus, Organization,
    OrganizationDirectory, TokenGrant, TokenStore,
};
pub use execution::{
    restore_from_record, ExecutionRecordStore, FileExecutionStore, MemoryExecutionStore,
};
pub use interface::{
    InterfaceDefinition, InterfaceDefinitionStore, MemoryInterfaceDefinitionStore,
};
pub use node_config::{MemoryNodeConfigStore, NodeConfig, NodeConfigStore};
pub use request_log::{MemoryRequestLogStore, RequestLogEntry, RequestLogStore};
