use std::collections::HashMap;
use std::sync::Arc;

use super::authorization::AuthorizationLetterValidateNode;
use super::exception::ExceptionHandlerNode;
use super::field_convert::FieldNameConvertNode;
use super::log_record::LogRecordNode;
use super::national::NationalNodeRequestNode;
use super::param_validate::ParamValidateNode;
use super::signature::{SignatureNode, SignatureVerifyNode};
use super::token::TokenValidateNode;
use super::{Node, NodeDependencies};

/// Pipeline nodes keyed by node id.
pub struct NodeRegistry {
    nodes: HashMap<String, Arc<dyn Node>>,
}

impl NodeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        NodeRegistry {
            nodes: HashMap::new(),
        }
    }

    /// Register a node under `Node::id()`.
    pub fn register(&mut self, node: Arc<dyn Node>) {
        self.nodes.insert(node.id().to_string(), node);
    }

    pub fn get(&self, node_id: &str) -> Option<Arc<dyn Node>> {
        self.nodes.get(node_id).cloned()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// All registered node ids.
    pub fn registered_ids(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry holding every built-in node, sharing `deps`.
pub fn create_default_registry(deps: NodeDependencies) -> NodeRegistry {
    let deps = Arc::new(deps);
    let mut registry = NodeRegistry::new();

    // Authentication
    registry.register(Arc::new(TokenValidateNode::new(deps.clone())));
    registry.register(Arc::new(AuthorizationLetterValidateNode::new(deps.clone())));

    // Envelope
    registry.register(Arc::new(SignatureVerifyNode::new(deps.clone())));
    registry.register(Arc::new(SignatureNode::new(deps.clone())));

    // Parameters
    registry.register(Arc::new(ParamValidateNode::new(deps.clone())));
    registry.register(Arc::new(FieldNameConvertNode));

    // Upstream
    registry.register(Arc::new(NationalNodeRequestNode::new(deps.clone())));

    // Audit and classification
    registry.register(Arc::new(LogRecordNode::new(deps)));
    registry.register(Arc::new(ExceptionHandlerNode));

    registry
}
