//! Entry point for city-node calls: builds the context from the wire body,
//! runs the interface's process and shapes the caller response.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::GatewayConfig;
use crate::core::engine::ProcessEngine;
use crate::core::process_context::{keys, ProcessContext};
use crate::core::recovery::RecoveryJob;
use crate::core::runtime_context::RuntimeContext;
use crate::error::{NodeResult, ResultCode};
use crate::nodes::{
    create_default_registry, HttpNationalNodeClient, NationalNodeClient, NodeDependencies,
};
use crate::response::{CallerResponse, ProcessResult};
use crate::store::{
    AuthorizationLetterStore, ExecutionRecordStore, InterfaceDefinition,
    InterfaceDefinitionStore, NodeConfigStore, OrganizationDirectory, RequestLogStore, TokenStore,
};
use crate::validation::ValidationEngine;

/// Wire containers merged into `requestParams`, body first.
pub const BODY_CONTAINER: &str = "txnBodyCom";
pub const COMMON_CONTAINER: &str = "txnCommCom";

/// Persistence and lookup collaborators supplied by the host.
pub struct Collaborators {
    pub interfaces: Arc<dyn InterfaceDefinitionStore>,
    pub organizations: Arc<dyn OrganizationDirectory>,
    pub tokens: Arc<dyn TokenStore>,
    pub authorization_letters: Arc<dyn AuthorizationLetterStore>,
    pub request_logs: Arc<dyn RequestLogStore>,
    pub node_configs: Arc<dyn NodeConfigStore>,
    pub records: Arc<dyn ExecutionRecordStore>,
    /// Defaults to the HTTP client built from `nationalNode`.
    pub national_client: Option<Arc<dyn NationalNodeClient>>,
}

pub struct Gateway {
    engine: Arc<ProcessEngine>,
    interfaces: Arc<dyn InterfaceDefinitionStore>,
    organizations: Arc<dyn OrganizationDirectory>,
    runtime: RuntimeContext,
    config: GatewayConfig,
}

impl Gateway {
    /// Wire the default node catalog and the engine from configuration.
    pub fn build(
        config: GatewayConfig,
        collaborators: Collaborators,
        runtime: RuntimeContext,
    ) -> NodeResult<Self> {
        let national_client = match collaborators.national_client {
            Some(client) => client,
            None => Arc::new(HttpNationalNodeClient::new(&config.national_node)?),
        };
        let deps = NodeDependencies {
            organizations: Arc::clone(&collaborators.organizations),
            tokens: collaborators.tokens,
            authorization_letters: collaborators.authorization_letters,
            request_logs: collaborators.request_logs,
            national_client,
            national: config.national_node.clone(),
            validation: Arc::new(ValidationEngine::default()),
            runtime: runtime.clone(),
            self_app_key: config.self_app_key.clone(),
        };
        let registry = create_default_registry(deps);
        let engine = ProcessEngine::new(
            Arc::new(registry),
            collaborators.node_configs,
            collaborators.records,
            runtime.clone(),
            config.engine.clone(),
            config.async_pool.clone(),
        );
        Ok(Self {
            engine: Arc::new(engine),
            interfaces: collaborators.interfaces,
            organizations: collaborators.organizations,
            runtime,
            config,
        })
    }

    pub fn engine(&self) -> &Arc<ProcessEngine> {
        &self.engine
    }

    /// Recovery job sharing this gateway's engine.
    pub fn recovery_job(&self) -> RecoveryJob {
        RecoveryJob::new(Arc::clone(&self.engine), self.config.recovery.clone())
    }

    /// Handle one call to `interface_code`, running the process its
    /// interface definition names.
    pub async fn handle(
        &self,
        interface_code: &str,
        app_key: &str,
        body: &Value,
        request_ip: Option<&str>,
    ) -> CallerResponse {
        let definition = match self.resolve_interface(interface_code).await {
            Ok(definition) => definition,
            Err(response) => return response,
        };
        let params = match merge_containers(body) {
            Ok(params) => params,
            Err(message) => {
                warn!(interface_code, app_key, "Rejected malformed request body");
                return CallerResponse::failure(ResultCode::ParamMissing.code(), &message);
            }
        };

        let mut context =
            ProcessContext::new(self.runtime.next_id(), interface_code, app_key).with_params(params);
        match self.organizations.lookup_by_app_key(&self.config.self_app_key).await {
            Ok(Some(own)) => context.set_attribute(keys::SELF_PUBLIC_KEY, Value::String(own.public_key)),
            Ok(None) => warn!(self_app_key = %self.config.self_app_key, "Own keypair not registered"),
            Err(e) => warn!(error = %e, "Failed to look up own keypair"),
        }
        if let Some(ip) = request_ip {
            context.set_attribute(keys::REQUEST_IP, Value::String(ip.to_string()));
        }

        let process_code = definition.process_code.as_str();
        match self.engine.execute_process(process_code, &mut context).await {
            Ok(result) => {
                info!(
                    interface_code,
                    process_code,
                    request_id = %context.request_id(),
                    execution_id = %result.execution_id,
                    code = %result.code,
                    "Request handled"
                );
                CallerResponse::from_result(&result)
            }
            Err(e) => {
                error!(interface_code, request_id = %context.request_id(), error = %e, "Process could not run");
                system_failure()
            }
        }
    }

    /// Unknown interfaces are `NOT_FOUND`, disabled ones
    /// `SERVICE_UNAVAILABLE`; neither creates an execution record.
    async fn resolve_interface(
        &self,
        interface_code: &str,
    ) -> Result<InterfaceDefinition, CallerResponse> {
        match self.interfaces.find(interface_code).await {
            Ok(Some(definition)) if definition.enabled => Ok(definition),
            Ok(Some(_)) => {
                warn!(interface_code, "Interface is disabled");
                Err(CallerResponse::failure(
                    ResultCode::ServiceUnavailable.code(),
                    &format!("interface {} is not enabled", interface_code),
                ))
            }
            Ok(None) => {
                warn!(interface_code, "Interface is not defined");
                Err(CallerResponse::failure(
                    ResultCode::NotFound.code(),
                    &format!("interface not found: {}", interface_code),
                ))
            }
            Err(e) => {
                error!(interface_code, error = %e, "Failed to look up interface definition");
                Err(system_failure())
            }
        }
    }

    /// Replay a recorded execution on behalf of an operator.
    pub async fn replay(&self, execution_id: &str) -> CallerResponse {
        match self.engine.replay_process(execution_id).await {
            Ok(result) => CallerResponse::from_result(&result),
            Err(e) => {
                warn!(execution_id, error = %e, "Replay refused");
                let code = e.result_code();
                let message = match code {
                    ResultCode::SystemError => code.message().to_string(),
                    _ => e.to_string(),
                };
                CallerResponse::failure(code.code(), &message)
            }
        }
    }
}

fn system_failure() -> CallerResponse {
    let result = ProcessResult {
        execution_id: String::new(),
        code: ResultCode::SystemError.code().to_string(),
        message: ResultCode::SystemError.message().to_string(),
        data: None,
    };
    CallerResponse::from_result(&result)
}

/// Flatten `txnBodyCom` then `txnCommCom` into one parameter map. Both
/// containers must be present; a container given as JSON text is decoded.
pub fn merge_containers(body: &Value) -> Result<Map<String, Value>, String> {
    let mut params = Map::new();
    for container in [BODY_CONTAINER, COMMON_CONTAINER] {
        let fields = match body.get(container) {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => map,
                _ => return Err(format!("{} must be an object", container)),
            },
            Some(Value::Null) | None => {
                return Err(format!("request body must contain {}", container))
            }
            Some(_) => return Err(format!("{} must be an object", container)),
        };
        params.extend(fields);
    }
    Ok(params)
}
