//! Interface definitions: which process serves an interface code, and
//! whether the interface is open to callers.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::StoreResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceDefinition {
    pub interface_code: String,
    #[serde(default)]
    pub interface_name: String,
    pub process_code: String,
    pub enabled: bool,
}

impl InterfaceDefinition {
    /// Enabled interface served by `process_code`.
    pub fn new(interface_code: impl Into<String>, process_code: impl Into<String>) -> Self {
        let interface_code = interface_code.into();
        Self {
            interface_name: interface_code.clone(),
            interface_code,
            process_code: process_code.into(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[async_trait]
pub trait InterfaceDefinitionStore: Send + Sync {
    async fn find(&self, interface_code: &str) -> StoreResult<Option<InterfaceDefinition>>;
}

#[derive(Default)]
pub struct MemoryInterfaceDefinitionStore {
    definitions: RwLock<HashMap<String, InterfaceDefinition>>,
}

impl MemoryInterfaceDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, definition: InterfaceDefinition) {
        self.definitions
            .write()
            .insert(definition.interface_code.clone(), definition);
    }
}

#[async_trait]
impl InterfaceDefinitionStore for MemoryInterfaceDefinitionStore {
    async fn find(&self, interface_code: &str) -> StoreResult<Option<InterfaceDefinition>> {
        Ok(self.definitions.read().get(interface_code).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_by_code() {
        let store = MemoryInterfaceDefinitionStore::new();
        store.insert(InterfaceDefinition::new("IF001", "P-ORG-QUERY"));
        store.insert(InterfaceDefinition::new("IF002", "P-ORG-QUERY").disabled());

        let found = store.find("IF001").await.unwrap().unwrap();
        assert_eq!(found.process_code, "P-ORG-QUERY");
        assert!(found.enabled);
        assert!(!store.find("IF002").await.unwrap().unwrap().enabled);
        assert!(store.find("IF404").await.unwrap().is_none());
    }
}
