//! Domain payloads cached by the coordinator.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Share of an upstream credential's lifetime it may spend in the cache.
///
/// Keeping cached credentials strictly younger than the real ones means an
/// entry always leaves the cache before upstream would reject it.
pub const CREDENTIAL_TTL_RATIO: f64 = 0.92;

/// Cache TTL for a credential whose upstream lifetime is `lifetime`.
pub fn credential_ttl(lifetime: Duration) -> Duration {
    lifetime.mul_f64(CREDENTIAL_TTL_RATIO)
}

// == Cached Credential ==
/// An upstream access credential obtained through the token exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedCredential {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// When upstream stops honouring the token
    pub expires_at: DateTime<Utc>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl CachedCredential {
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: default_token_type(),
            scopes: Vec::new(),
            expires_at,
        }
    }

    /// Time left before upstream rejects the token, zero once past.
    pub fn remaining_lifetime(&self) -> Duration {
        (self.expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

// == Cached Permission ==
/// Outcome of a capability lookup for one subject on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPermission {
    pub subject: String,
    pub resource: String,
    /// Whether any access was granted at all
    pub granted: bool,
    /// Actions the subject may perform, e.g. `read`, `write`
    #[serde(default)]
    pub actions: Vec<String>,
}

impl CachedPermission {
    pub fn granted(
        subject: impl Into<String>,
        resource: impl Into<String>,
        actions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            subject: subject.into(),
            resource: resource.into(),
            granted: true,
            actions: actions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn denied(subject: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            resource: resource.into(),
            granted: false,
            actions: Vec::new(),
        }
    }

    pub fn allows(&self, action: &str) -> bool {
        self.granted && self.actions.iter().any(|a| a == action || a == "*")
    }
}

// == Resource Info ==
/// Metadata describing an upstream resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub id: String,
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl ResourceInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
            owner: None,
            attributes: HashMap::new(),
        }
    }
}
