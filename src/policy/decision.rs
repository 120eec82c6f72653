// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization decisions for a request against the route policy registry.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::registry::{RoleSet, RoutePolicyRegistry};
use crate::auth::Principal;
use crate::pipeline::RequestContext;

/// What to do with a non-open route that has no role requirement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnregisteredRoutePolicy {
    /// Only explicitly registered routes are restricted.
    #[default]
    Allow,
    /// Every non-open route must have a matching role requirement.
    Deny,
}

impl FromStr for UnregisteredRoutePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            other => Err(format!("unknown route policy '{other}' (expected 'allow' or 'deny')")),
        }
    }
}

/// Why a decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    OpenPath,
    NoRequirement,
    RoleGranted,
    RoleMissing,
    DefaultDeny,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DecisionReason::OpenPath => "open_path",
            DecisionReason::NoRequirement => "no_requirement",
            DecisionReason::RoleGranted => "role_granted",
            DecisionReason::RoleMissing => "role_missing",
            DecisionReason::DefaultDeny => "default_deny",
        };
        f.write_str(reason)
    }
}

/// Result of an authorization decision. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub allowed: bool,
    /// Required roles of the matched pattern, when one matched.
    pub matched_roles: Option<RoleSet>,
    pub reason: DecisionReason,
}

impl DecisionOutcome {
    fn new(allowed: bool, matched_roles: Option<RoleSet>, reason: DecisionReason) -> Self {
        Self {
            allowed,
            matched_roles,
            reason,
        }
    }
}

/// Stateless decision logic over a shared registry.
#[derive(Debug, Clone)]
pub struct AuthorizationEngine {
    registry: Arc<RoutePolicyRegistry>,
    unregistered: UnregisteredRoutePolicy,
}

impl AuthorizationEngine {
    pub fn new(registry: Arc<RoutePolicyRegistry>) -> Self {
        Self {
            registry,
            unregistered: UnregisteredRoutePolicy::default(),
        }
    }

    pub fn with_unregistered_policy(mut self, policy: UnregisteredRoutePolicy) -> Self {
        self.unregistered = policy;
        self
    }

    pub fn registry(&self) -> &Arc<RoutePolicyRegistry> {
        &self.registry
    }

    pub fn unregistered_policy(&self) -> UnregisteredRoutePolicy {
        self.unregistered
    }

    /// Decide whether `principal` may access `method path`.
    ///
    /// Open routes are always allowed. Otherwise the principal needs any one
    /// of the matched pattern's roles. A missing principal holds no roles.
    pub fn decide(&self, method: &str, path: &str, principal: Option<&Principal>) -> DecisionOutcome {
        if self.registry.is_public_path(method, path) {
            return DecisionOutcome::new(true, None, DecisionReason::OpenPath);
        }

        let Some(requirement) = self.registry.role_requirement(method, path) else {
            return match self.unregistered {
                UnregisteredRoutePolicy::Allow => {
                    DecisionOutcome::new(true, None, DecisionReason::NoRequirement)
                }
                UnregisteredRoutePolicy::Deny => {
                    DecisionOutcome::new(false, None, DecisionReason::DefaultDeny)
                }
            };
        };

        let granted = principal.is_some_and(|p| p.has_any_role(&requirement.roles));
        let reason = if granted {
            DecisionReason::RoleGranted
        } else {
            DecisionReason::RoleMissing
        };
        DecisionOutcome::new(granted, Some(requirement.roles), reason)
    }

    /// Boolean form of [`decide`](Self::decide).
    pub fn allows(&self, method: &str, path: &str, principal: Option<&Principal>) -> bool {
        self.decide(method, path, principal).allowed
    }

    /// Whether the request targets an open route.
    pub fn is_public_path(&self, ctx: &RequestContext) -> bool {
        self.registry.is_public_path(ctx.method().as_str(), ctx.path())
    }

    /// Roles required by the request's route, `None` when nothing is registered.
    pub fn get_roles_for_path(&self, ctx: &RequestContext) -> Option<RoleSet> {
        self.registry
            .roles_for_path(ctx.method().as_str(), ctx.path())
    }

    /// Decide for a request using the principal attached to it.
    pub fn decide_request(&self, ctx: &RequestContext) -> DecisionOutcome {
        self.decide(ctx.method().as_str(), ctx.path(), ctx.principal())
    }

    pub fn has_resource_access_right(&self, ctx: &RequestContext) -> bool {
        self.decide_request(ctx).allowed
    }
}
