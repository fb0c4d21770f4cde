//! Per-process pipeline configuration.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::retry::RetryPolicy;
use crate::domain::Tier;
use crate::error::{NodeError, NodeResult, StoreError, StoreResult};

fn default_enabled() -> bool {
    true
}

/// One step of a process, as persisted by the hosting application.
///
/// `retry_config` and `node_config` are kept as the raw JSON text they are
/// stored as; the engine parses them when the pipeline is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    pub process_code: String,
    pub node_id: String,
    #[serde(default)]
    pub node_name: Option<String>,
    pub node_order: i32,
    #[serde(default)]
    pub async_execution: bool,
    #[serde(default)]
    pub retry_config: Option<String>,
    #[serde(default)]
    pub node_config: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl NodeConfig {
    pub fn new(process_code: impl Into<String>, node_id: impl Into<String>, node_order: i32) -> Self {
        Self {
            process_code: process_code.into(),
            node_id: node_id.into(),
            node_name: None,
            node_order,
            async_execution: false,
            retry_config: None,
            node_config: None,
            enabled: true,
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.node_config = Some(config.to_string());
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry_config = serde_json::to_string(&policy).ok();
        self
    }

    pub fn run_async(mut self) -> Self {
        self.async_execution = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn display_name(&self) -> &str {
        self.node_name.as_deref().unwrap_or(&self.node_id)
    }

    /// Parse the node's configuration blob. A missing blob is an empty
    /// object; anything that is not a JSON object, or carries an unknown
    /// `side`, is rejected.
    pub fn parsed_config(&self) -> NodeResult<Map<String, Value>> {
        let raw = match self.node_config.as_deref().map(str::trim) {
            None | Some("") => return Ok(Map::new()),
            Some(raw) => raw,
        };
        let value: Value = serde_json::from_str(raw).map_err(|e| {
            NodeError::Config(format!("node '{}' config is not valid JSON: {}", self.node_id, e))
        })?;
        let Value::Object(map) = value else {
            return Err(NodeError::Config(format!(
                "node '{}' config must be a JSON object",
                self.node_id
            )));
        };
        if let Some(side) = map.get("side") {
            let side = side.as_str().unwrap_or_default();
            side.parse::<Tier>().map_err(|e| {
                NodeError::Config(format!("node '{}' config: {}", self.node_id, e))
            })?;
        }
        Ok(map)
    }
}

#[async_trait]
pub trait NodeConfigStore: Send + Sync {
    /// Enabled nodes of `process_code`, ascending by `node_order`.
    async fn get_enabled_ordered_nodes(&self, process_code: &str) -> StoreResult<Vec<NodeConfig>>;
}

#[derive(Default)]
pub struct MemoryNodeConfigStore {
    nodes: RwLock<Vec<NodeConfig>>,
}

impl MemoryNodeConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders must be unique within a process.
    pub fn insert(&self, config: NodeConfig) -> StoreResult<()> {
        let mut nodes = self.nodes.write();
        if nodes
            .iter()
            .any(|n| n.process_code == config.process_code && n.node_order == config.node_order)
        {
            return Err(StoreError::Storage(format!(
                "duplicate node order {} in process {}",
                config.node_order, config.process_code
            )));
        }
        nodes.push(config);
        Ok(())
    }

    pub fn insert_all(&self, configs: impl IntoIterator<Item = NodeConfig>) -> StoreResult<()> {
        for config in configs {
            self.insert(config)?;
        }
        Ok(())
    }
}

#[async_trait]
impl NodeConfigStore for MemoryNodeConfigStore {
    async fn get_enabled_ordered_nodes(&self, process_code: &str) -> StoreResult<Vec<NodeConfig>> {
        let mut nodes: Vec<NodeConfig> = self
            .nodes
            .read()
            .iter()
            .filter(|n| n.enabled && n.process_code == process_code)
            .cloned()
            .collect();
        nodes.sort_by_key(|n| n.node_order);
        Ok(nodes)
    }
}
