use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use tierflow_envelope::PartyKeyPair;

use async_trait::async_trait;

use crate::core::runtime_context::{FakeIdGenerator, FakeTimeProvider, RuntimeContext, TimeProvider};
use crate::error::NodeResult;
use crate::store::{
    MemoryAuthorizationLetterStore, MemoryOrganizationDirectory, MemoryRequestLogStore,
    MemoryTokenStore, OrgStatus, Organization, TokenGrant,
};
use crate::validation::ValidationEngine;

use super::national::{NationalNodeClient, NationalNodeConfig};
use super::NodeDependencies;

/// Records forwarded bodies and replays queued replies; answers
/// `{"success": true}` once the queue is empty.
#[derive(Default)]
pub struct StubNationalClient {
    replies: Mutex<VecDeque<NodeResult<Value>>>,
    requests: Mutex<Vec<(String, Value)>>,
}

impl StubNationalClient {
    pub fn reply(&self, reply: NodeResult<Value>) {
        self.replies.lock().push_back(reply);
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl NationalNodeClient for StubNationalClient {
    async fn forward(&self, interface_code: &str, body: &Value) -> NodeResult<Value> {
        self.requests
            .lock()
            .push((interface_code.to_string(), body.clone()));
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({"success": true})))
    }
}

/// Keys and in-memory collaborators for node tests.
///
/// `city` is the city node's own pair, `city_channel` the pair this node
/// holds for app key `city-a`, `provincial` this node's own pair (app key
/// `self`), `national` the national node's pair.
pub struct Fixture {
    pub clock: Arc<FakeTimeProvider>,
    pub orgs: Arc<MemoryOrganizationDirectory>,
    pub tokens: Arc<MemoryTokenStore>,
    pub letters: Arc<MemoryAuthorizationLetterStore>,
    pub logs: Arc<MemoryRequestLogStore>,
    pub national_client: Arc<StubNationalClient>,
    pub city: PartyKeyPair,
    pub city_channel: PartyKeyPair,
    pub provincial: PartyKeyPair,
    pub national: PartyKeyPair,
}

fn org(app_key: &str, keys: &PartyKeyPair) -> Organization {
    Organization {
        app_key: app_key.into(),
        org_code: format!("{}-org", app_key),
        org_name: app_key.into(),
        public_key: keys.public.to_base64(),
        private_key: Some(keys.private.to_base64()),
        status: OrgStatus::Enabled,
    }
}

impl Fixture {
    pub fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    pub fn new() -> Self {
        let fx = Self {
            clock: Arc::new(FakeTimeProvider::new(Self::start())),
            orgs: Arc::new(MemoryOrganizationDirectory::new()),
            tokens: Arc::new(MemoryTokenStore::new()),
            letters: Arc::new(MemoryAuthorizationLetterStore::new()),
            logs: Arc::new(MemoryRequestLogStore::new()),
            national_client: Arc::new(StubNationalClient::default()),
            city: PartyKeyPair::generate(),
            city_channel: PartyKeyPair::generate(),
            provincial: PartyKeyPair::generate(),
            national: PartyKeyPair::generate(),
        };
        fx.orgs.insert(org("city-a", &fx.city_channel));
        fx.orgs.insert(org("self", &fx.provincial));
        fx
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn national_config(&self) -> NationalNodeConfig {
        NationalNodeConfig {
            base_url: "http://national.test".into(),
            token: "nat-token".into(),
            public_key: self.national.public.to_base64(),
            ..NationalNodeConfig::default()
        }
    }

    pub fn deps(&self) -> Arc<NodeDependencies> {
        Arc::new(NodeDependencies {
            organizations: self.orgs.clone(),
            tokens: self.tokens.clone(),
            authorization_letters: self.letters.clone(),
            request_logs: self.logs.clone(),
            national_client: self.national_client.clone(),
            national: self.national_config(),
            validation: Arc::new(ValidationEngine::default()),
            runtime: RuntimeContext::new(
                self.clock.clone(),
                Arc::new(FakeIdGenerator::new("id".into())),
            ),
            self_app_key: "self".into(),
        })
    }

    /// Issue `token` to `app_key`, expiring `ttl` from now when given.
    pub fn grant_token(&self, token: &str, app_key: &str, ttl: Option<Duration>) {
        self.tokens.insert(TokenGrant {
            token: token.into(),
            app_key: app_key.into(),
            expires_at: ttl.map(|ttl| self.now() + ttl),
        });
    }
}
