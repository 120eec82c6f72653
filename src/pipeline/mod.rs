// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Guard Pipeline
//!
//! Runs an ordered chain of [`Guard`]s against one [`RequestContext`].
//!
//! - The first guard that denies stops the chain; later guards never run
//!   and the recorded rejection is never replaced
//! - A guard that panics is caught and turned into a `500` rejection
//! - Every deny is logged once, with the guard's name
//!
//! ```rust,ignore
//! let pipeline = PipelineBuilder::new(registry)
//!     .authenticate_with(extractor)
//!     .install_key_validator(&key_path, loader, cipher)?
//!     .build();
//!
//! let app = Router::new()
//!     .route("/orders", post(create_order))
//!     .layer(middleware::from_fn_with_state(Arc::new(pipeline), guard_requests));
//! ```

pub mod context;
pub mod guards;
pub mod middleware;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, info, warn};

pub use context::RequestContext;
pub use guards::{AuthenticationGuard, AuthorizationGuard, Guard, KeyValidationGuard, OpenPathGuard};
pub use middleware::guard_requests;

use crate::auth::{AuthError, ClaimsExtractor, RoleLoader};
use crate::keys::{
    AccessKeyLoader, AsymmetricKeyValidator, KeyLoadError, SecretCipher, ServerKeyPair,
};
use crate::policy::{AuthorizationEngine, RoutePolicyRegistry, UnregisteredRoutePolicy};

/// Ordered guard chain with early exit on deny.
pub struct Pipeline {
    engine: Arc<AuthorizationEngine>,
    guards: Vec<Arc<dyn Guard>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("guards", &self.guard_names())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn builder(registry: Arc<RoutePolicyRegistry>) -> PipelineBuilder {
        PipelineBuilder::new(registry)
    }

    pub fn engine(&self) -> &Arc<AuthorizationEngine> {
        &self.engine
    }

    pub fn guard_names(&self) -> Vec<&'static str> {
        self.guards.iter().map(|guard| guard.name()).collect()
    }

    /// Run every guard in order. Returns `true` when all allowed.
    ///
    /// On `false` the context holds the rejection to send.
    pub async fn run(&self, ctx: &mut RequestContext) -> bool {
        for guard in &self.guards {
            let name = guard.name();
            let outcome = AssertUnwindSafe(guard.check(ctx)).catch_unwind().await;

            match outcome {
                Ok(Ok(true)) => continue,
                Ok(Ok(false)) => {
                    if ctx.rejection().is_none() {
                        ctx.reject(AuthError::InsufficientPermissions);
                    }
                }
                Ok(Err(e)) => ctx.reject(e),
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(
                        guard = name,
                        request_id = %ctx.request_id(),
                        method = %ctx.method(),
                        path = %ctx.path(),
                        panic = %message,
                        "Guard panicked, denying request"
                    );
                    ctx.reject(AuthError::GuardFault(message));
                    return false;
                }
            }

            if let Some(rejection) = ctx.rejection() {
                warn!(
                    guard = name,
                    request_id = %ctx.request_id(),
                    method = %ctx.method(),
                    path = %ctx.path(),
                    principal = ctx.principal().map(|p| p.id.as_str()),
                    error_code = rejection.error_code(),
                    error = ?rejection,
                    "Request denied"
                );
            }
            return false;
        }
        true
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

struct KeyValidation {
    key_pair: Arc<ServerKeyPair>,
    loader: Arc<dyn AccessKeyLoader>,
    cipher: Arc<dyn SecretCipher>,
}

/// Assembles a [`Pipeline`].
///
/// Guard order: open path, authentication (when an extractor is set),
/// authorization, key validation (when installed), then extra guards in the
/// order they were added.
pub struct PipelineBuilder {
    registry: Arc<RoutePolicyRegistry>,
    unregistered: UnregisteredRoutePolicy,
    extractor: Option<Arc<dyn ClaimsExtractor>>,
    role_loader: Option<Arc<dyn RoleLoader>>,
    key_validation: Option<KeyValidation>,
    extra: Vec<Arc<dyn Guard>>,
}

impl PipelineBuilder {
    pub fn new(registry: Arc<RoutePolicyRegistry>) -> Self {
        Self {
            registry,
            unregistered: UnregisteredRoutePolicy::default(),
            extractor: None,
            role_loader: None,
            key_validation: None,
            extra: Vec::new(),
        }
    }

    pub fn authenticate_with(mut self, extractor: Arc<dyn ClaimsExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn load_roles_with(mut self, loader: Arc<dyn RoleLoader>) -> Self {
        self.role_loader = Some(loader);
        self
    }

    pub fn unregistered_routes(mut self, policy: UnregisteredRoutePolicy) -> Self {
        self.unregistered = policy;
        self
    }

    /// Load the server private key and require key-pair validation.
    ///
    /// A key that cannot be loaded is returned as an error; callers are
    /// expected to abort startup.
    pub fn install_key_validator(
        self,
        private_key_path: impl AsRef<Path>,
        loader: Arc<dyn AccessKeyLoader>,
        cipher: Arc<dyn SecretCipher>,
    ) -> Result<Self, KeyLoadError> {
        let path = private_key_path.as_ref();
        let key_pair = ServerKeyPair::load(path)?;
        info!(
            path = %path.display(),
            key_family = key_pair.private_key().family(),
            "Loaded server private key"
        );
        Ok(self.with_key_pair(Arc::new(key_pair), loader, cipher))
    }

    /// Require key-pair validation against an already loaded key pair.
    pub fn with_key_pair(
        mut self,
        key_pair: Arc<ServerKeyPair>,
        loader: Arc<dyn AccessKeyLoader>,
        cipher: Arc<dyn SecretCipher>,
    ) -> Self {
        self.key_validation = Some(KeyValidation {
            key_pair,
            loader,
            cipher,
        });
        self
    }

    /// Append a custom guard after the built-in ones.
    pub fn guard(mut self, guard: impl Guard + 'static) -> Self {
        self.extra.push(Arc::new(guard));
        self
    }

    pub fn build(self) -> Pipeline {
        let engine = Arc::new(
            AuthorizationEngine::new(self.registry).with_unregistered_policy(self.unregistered),
        );

        let mut guards: Vec<Arc<dyn Guard>> = vec![Arc::new(OpenPathGuard::new(engine.clone()))];

        if let Some(extractor) = &self.extractor {
            let mut authentication = AuthenticationGuard::new(extractor.clone());
            if let Some(loader) = self.role_loader {
                authentication = authentication.with_role_loader(loader);
            }
            guards.push(Arc::new(authentication));
        }

        guards.push(Arc::new(AuthorizationGuard::new(engine.clone())));

        if let Some(KeyValidation {
            key_pair,
            loader,
            cipher,
        }) = self.key_validation
        {
            let mut validator = AsymmetricKeyValidator::new(key_pair, loader, cipher);
            if let Some(extractor) = self.extractor {
                validator = validator.with_extractor(extractor);
            }
            guards.push(Arc::new(KeyValidationGuard::new(Arc::new(validator))));
        }

        guards.extend(self.extra);
        Pipeline { engine, guards }
    }
}
