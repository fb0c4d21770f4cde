//! Participant lookups: organizations and their keys, access tokens, and
//! authorization letters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::StoreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrgStatus {
    Enabled,
    Disabled,
}

/// A registered participant and the keypair this node uses with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub app_key: String,
    #[serde(default)]
    pub org_code: String,
    #[serde(default)]
    pub org_name: String,
    pub public_key: String,
    #[serde(default)]
    pub private_key: Option<String>,
    pub status: OrgStatus,
}

impl Organization {
    pub fn is_enabled(&self) -> bool {
        self.status == OrgStatus::Enabled
    }
}

#[async_trait]
pub trait OrganizationDirectory: Send + Sync {
    async fn lookup_by_app_key(&self, app_key: &str) -> StoreResult<Option<Organization>>;
}

#[derive(Default)]
pub struct MemoryOrganizationDirectory {
    orgs: RwLock<HashMap<String, Organization>>,
}

impl MemoryOrganizationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, org: Organization) {
        self.orgs.write().insert(org.app_key.clone(), org);
    }
}

#[async_trait]
impl OrganizationDirectory for MemoryOrganizationDirectory {
    async fn lookup_by_app_key(&self, app_key: &str) -> StoreResult<Option<Organization>> {
        Ok(self.orgs.read().get(app_key).cloned())
    }
}

/// An issued access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub token: String,
    pub app_key: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenGrant {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn find(&self, token: &str) -> StoreResult<Option<TokenGrant>>;
}

#[derive(Default)]
pub struct MemoryTokenStore {
    grants: RwLock<HashMap<String, TokenGrant>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, grant: TokenGrant) {
        self.grants.write().insert(grant.token.clone(), grant);
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn find(&self, token: &str) -> StoreResult<Option<TokenGrant>> {
        Ok(self.grants.read().get(token).cloned())
    }
}

/// Letter authorizing a participant to query on someone's behalf.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationLetter {
    pub auth_identifier: String,
    #[serde(default)]
    pub org_code: Option<String>,
    pub enabled: bool,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}

impl AuthorizationLetter {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.enabled
            && self.valid_from.map(|from| from <= now).unwrap_or(true)
            && self.valid_until.map(|until| now <= until).unwrap_or(true)
    }
}

#[async_trait]
pub trait AuthorizationLetterStore: Send + Sync {
    async fn find(&self, auth_identifier: &str) -> StoreResult<Option<AuthorizationLetter>>;
}

#[derive(Default)]
pub struct MemoryAuthorizationLetterStore {
    letters: RwLock<HashMap<String, AuthorizationLetter>>,
}

impl MemoryAuthorizationLetterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, letter: AuthorizationLetter) {
        self.letters
            .write()
            .insert(letter.auth_identifier.clone(), letter);
    }
}

#[async_trait]
impl AuthorizationLetterStore for MemoryAuthorizationLetterStore {
    async fn find(&self, auth_identifier: &str) -> StoreResult<Option<AuthorizationLetter>> {
        Ok(self.letters.read().get(auth_identifier).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_token_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let grant = TokenGrant {
            token: "t".into(),
            app_key: "city-a".into(),
            expires_at: Some(now),
        };
        assert!(grant.is_expired(now));
        assert!(!grant.is_expired(now - Duration::seconds(1)));
    }

    #[test]
    fn test_letter_window() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let letter = AuthorizationLetter {
            auth_identifier: "AL-1".into(),
            org_code: None,
            enabled: true,
            valid_from: Some(now - Duration::days(1)),
            valid_until: Some(now + Duration::days(1)),
        };
        assert!(letter.is_valid_at(now));
        assert!(!letter.is_valid_at(now + Duration::days(2)));
        let disabled = AuthorizationLetter {
            enabled: false,
            ..letter
        };
        assert!(!disabled.is_valid_at(now));
    }
}
