// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer claims and the authenticated principal.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::AuthError;
use crate::policy::RoleSet;

/// Decoded bearer claims.
pub type Claims = serde_json::Map<String, Value>;

/// Subject claim carrying the principal id.
pub const SUBJECT_CLAIM: &str = "sub";

/// Default claim carrying role names.
pub const DEFAULT_ROLES_CLAIM: &str = "roles";

/// Claim carrying the caller's encrypted API key.
pub const API_KEY_CLAIM: &str = "apiKey";

/// Authenticated identity attached to a request.
///
/// Populated by the claims extractor (and optionally a role loader) before
/// the authorization guard runs, and treated as read-only afterwards except
/// for `api_key_id`, which key validation fills in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Canonical principal id (`sub` claim)
    pub id: String,

    /// Roles held by the principal
    pub roles: RoleSet,

    /// Encrypted API key as presented in the `apiKey` claim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_secret: Option<String>,

    /// Decrypted API key id, set once key validation has decrypted it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_id: Option<String>,

    /// All decoded claims (not serialized)
    #[serde(skip)]
    pub claims: Claims,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Build a principal from decoded claims.
    ///
    /// Roles are read from `roles_claim`, which may hold an array of strings
    /// or a single whitespace-separated string.
    pub fn from_claims(claims: Claims, roles_claim: &str) -> Result<Self, AuthError> {
        let id = claims
            .get(SUBJECT_CLAIM)
            .and_then(Value::as_str)
            .filter(|sub| !sub.is_empty())
            .ok_or(AuthError::MissingSubject)?
            .to_string();

        let roles = claims
            .get(roles_claim)
            .map(roles_from_value)
            .unwrap_or_default();

        let encrypted_secret = claims
            .get(API_KEY_CLAIM)
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            id,
            roles,
            encrypted_secret,
            api_key_id: None,
            claims,
        })
    }

    /// Look up a single claim.
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Whether the principal holds at least one of `required`.
    pub fn has_any_role(&self, required: &RoleSet) -> bool {
        !self.roles.is_disjoint(required)
    }
}

fn roles_from_value(value: &Value) -> RoleSet {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Value::String(joined) => joined.split_whitespace().map(str::to_string).collect(),
        _ => RoleSet::new(),
    }
}
