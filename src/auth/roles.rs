// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Application-supplied role loading.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tower::BoxError;

use super::Principal;
use crate::policy::RoleSet;

/// Loads extra roles for an authenticated principal.
///
/// Runs after claim extraction and before authorization. Returned roles are
/// added to those taken from the token.
#[async_trait]
pub trait RoleLoader: Send + Sync {
    async fn load_roles(&self, principal: &Principal) -> Result<RoleSet, BoxError>;
}

/// In-memory role assignments keyed by principal id.
#[derive(Debug, Default)]
pub struct StaticRoleLoader {
    assignments: RwLock<HashMap<String, RoleSet>>,
}

impl StaticRoleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant roles to a principal id, on top of any already granted.
    pub fn grant<I, S>(&self, principal_id: impl Into<String>, roles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assignments
            .write()
            .entry(principal_id.into())
            .or_default()
            .extend(roles.into_iter().map(Into::into));
    }
}

#[async_trait]
impl RoleLoader for StaticRoleLoader {
    async fn load_roles(&self, principal: &Principal) -> Result<RoleSet, BoxError> {
        Ok(self
            .assignments
            .read()
            .get(&principal.id)
            .cloned()
            .unwrap_or_default())
    }
}
