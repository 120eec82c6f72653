// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Built-in guards, in the order the pipeline installs them.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::RequestContext;
use crate::auth::{AuthError, ClaimsExtractor, RoleLoader};
use crate::keys::AsymmetricKeyValidator;
use crate::policy::AuthorizationEngine;

/// One step of the guard chain.
///
/// - `Ok(true)`: continue with the next guard
/// - `Ok(false)`: deny; the guard should have recorded a rejection on the
///   context
/// - `Err(e)`: deny with `e`
#[async_trait]
pub trait Guard: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    async fn check(&self, ctx: &mut RequestContext) -> Result<bool, AuthError>;
}

/// Marks requests to open routes so later guards let them through.
#[derive(Debug, Clone)]
pub struct OpenPathGuard {
    engine: Arc<AuthorizationEngine>,
}

impl OpenPathGuard {
    pub fn new(engine: Arc<AuthorizationEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Guard for OpenPathGuard {
    fn name(&self) -> &'static str {
        "open_path"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Result<bool, AuthError> {
        if self.engine.is_public_path(ctx) {
            debug!(method = %ctx.method(), path = %ctx.path(), "Open route");
            ctx.mark_public();
        }
        Ok(true)
    }
}

/// Extracts the principal from the bearer credential.
pub struct AuthenticationGuard {
    extractor: Arc<dyn ClaimsExtractor>,
    role_loader: Option<Arc<dyn RoleLoader>>,
}

impl AuthenticationGuard {
    pub fn new(extractor: Arc<dyn ClaimsExtractor>) -> Self {
        Self {
            extractor,
            role_loader: None,
        }
    }

    /// Merge roles from an application loader into the token roles.
    pub fn with_role_loader(mut self, loader: Arc<dyn RoleLoader>) -> Self {
        self.role_loader = Some(loader);
        self
    }
}

#[async_trait]
impl Guard for AuthenticationGuard {
    fn name(&self) -> &'static str {
        "authentication"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Result<bool, AuthError> {
        if ctx.is_public() || ctx.principal().is_some() {
            return Ok(true);
        }

        let mut principal = self.extractor.extract(ctx.headers()).await?;

        if let Some(loader) = &self.role_loader {
            let extra = loader
                .load_roles(&principal)
                .await
                .map_err(|e| AuthError::RoleLoaderFailed(e.to_string()))?;
            principal.roles.extend(extra);
        }

        debug!(
            principal = %principal.id,
            roles = principal.roles.len(),
            "Principal authenticated"
        );
        ctx.set_principal(principal);
        Ok(true)
    }
}

/// Checks the principal's roles against the route's requirement.
#[derive(Debug, Clone)]
pub struct AuthorizationGuard {
    engine: Arc<AuthorizationEngine>,
}

impl AuthorizationGuard {
    pub fn new(engine: Arc<AuthorizationEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Guard for AuthorizationGuard {
    fn name(&self) -> &'static str {
        "authorization"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Result<bool, AuthError> {
        if ctx.is_public() {
            return Ok(true);
        }

        let outcome = self.engine.decide_request(ctx);
        if outcome.allowed {
            debug!(reason = %outcome.reason, "Access granted");
            return Ok(true);
        }

        let rejection = if ctx.principal().is_none() {
            AuthError::Unauthenticated
        } else {
            AuthError::InsufficientPermissions
        };
        debug!(
            reason = %outcome.reason,
            required = ?outcome.matched_roles,
            "Access denied"
        );
        ctx.reject(rejection);
        Ok(false)
    }
}

/// Requires proof of the registered key pair on every non-open route.
///
/// To protect only part of an application, mount a separate pipeline with
/// this guard on the nested router that needs it.
#[derive(Debug, Clone)]
pub struct KeyValidationGuard {
    validator: Arc<AsymmetricKeyValidator>,
}

impl KeyValidationGuard {
    pub fn new(validator: Arc<AsymmetricKeyValidator>) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl Guard for KeyValidationGuard {
    fn name(&self) -> &'static str {
        "key_validation"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Result<bool, AuthError> {
        if ctx.is_public() {
            return Ok(true);
        }
        self.validator.validate(ctx).await?;
        Ok(true)
    }
}
