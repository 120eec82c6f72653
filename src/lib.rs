// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Gatekeeper - Request Authorization for Axum Services
//!
//! Decides, for every inbound request, whether the caller may proceed:
//! open routes pass, protected routes need a bearer principal holding one of
//! the route's roles, and service callers can additionally be required to
//! prove possession of a registered key pair.
//!
//! ## Modules
//!
//! - `policy` - Route patterns, policy registry, authorization decisions
//! - `auth` - Bearer claim extraction (JWT/JWKS), principal, role loading
//! - `keys` - Server key pair, secret cipher, key-pair validation
//! - `pipeline` - Ordered guard chain and Axum middleware
//! - `config` - Environment configuration
//! - `logging` - Tracing subscriber setup

pub mod auth;
pub mod config;
pub mod keys;
pub mod logging;
pub mod pipeline;
pub mod policy;

pub use auth::{Auth, AuthError, OptionalAuth, Principal};
pub use pipeline::{guard_requests, Pipeline, PipelineBuilder, RequestContext};
pub use policy::{AuthorizationEngine, RoutePattern, RoutePolicyRegistry, UnregisteredRoutePolicy};
