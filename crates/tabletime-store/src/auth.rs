//! # Credential Context
//!
//! The signed-in user's bearer token and role, passed explicitly to whatever
//! talks to the remote store.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   login(token) ──► CredentialContext { token, role, name, expires }     │
//! │        │                     │                                          │
//! │        │                     ▼                                          │
//! │        │            HttpStore adds "Authorization: Bearer …"            │
//! │        │                                                                │
//! │   logout() ──► slot emptied; further requests fail Unauthorized         │
//! │                without touching the network                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The token's signature is NOT verified here. The remote store verifies it
//! on every request; the client only reads the role to shape its views.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

/// Role claim written by the remote identity provider.
pub const ROLE_CLAIM: &str = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role";

/// Name claim written by the remote identity provider.
pub const NAME_CLAIM: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name";

// =============================================================================
// Role
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Seller,
    Other(String),
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Admin" => Role::Admin,
            "Seller" => Role::Seller,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "Admin",
            Role::Seller => "Seller",
            Role::Other(other) => other,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Credential Context
// =============================================================================

/// A decoded bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialContext {
    token: String,
    role: Role,
    user_name: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for CredentialContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialContext")
            .field("token", &"<redacted>")
            .field("role", &self.role)
            .field("user_name", &self.user_name)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl CredentialContext {
    /// Reads the role, name and expiry claims out of a JWT.
    pub fn from_token(token: impl Into<String>) -> StoreResult<Self> {
        let token = token.into();

        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<HashMap<String, Value>>(
            &token,
            &DecodingKey::from_secret(&[]),
            &validation,
        )
        .map_err(|e| StoreError::Unauthorized {
            reason: format!("Malformed sign-in token: {e}"),
        })?;
        let claims = data.claims;

        let role = claim_str(&claims, &[ROLE_CLAIM, "role"])
            .map(Role::parse)
            .ok_or_else(|| StoreError::Unauthorized {
                reason: "Sign-in token carries no role".to_string(),
            })?;
        let user_name = claim_str(&claims, &[NAME_CLAIM, "unique_name", "name"]).map(String::from);
        let expires_at = claims
            .get("exp")
            .and_then(Value::as_i64)
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        Ok(Self {
            token,
            role,
            user_name,
            expires_at,
        })
    }

    /// The raw token, for the `Authorization: Bearer` header.
    pub fn bearer(&self) -> &str {
        &self.token
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_seller(&self) -> bool {
        self.role == Role::Seller
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }
}

/// First string value among `keys`. Array-valued claims yield their first
/// string element.
fn claim_str<'a>(claims: &'a HashMap<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| match claims.get(*key)? {
        Value::String(s) => Some(s.as_str()),
        Value::Array(items) => items.iter().find_map(Value::as_str),
        _ => None,
    })
}

// =============================================================================
// Credentials slot
// =============================================================================

/// Shared slot holding the current credential context, if any.
///
/// Cloning shares the slot: log out through one clone and every holder sees
/// it.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    slot: Arc<RwLock<Option<Arc<CredentialContext>>>>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `token` and installs it. Returns the signed-in role.
    pub fn login(&self, token: impl Into<String>) -> StoreResult<Role> {
        let ctx = CredentialContext::from_token(token)?;
        let role = ctx.role().clone();
        info!(role = %role, user = ?ctx.user_name(), "Signed in");
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Arc::new(ctx));
        Ok(role)
    }

    /// Tears down the current context.
    pub fn logout(&self) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        if slot.take().is_some() {
            debug!("Signed out");
        }
    }

    pub fn current(&self) -> Option<Arc<CredentialContext>> {
        self.slot.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Current context or `Unauthorized`.
    pub fn require(&self) -> StoreResult<Arc<CredentialContext>> {
        self.current().ok_or_else(|| StoreError::Unauthorized {
            reason: "Not signed in".to_string(),
        })
    }
}
