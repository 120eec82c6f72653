// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Route Policy
//!
//! Route patterns, their compiled matchers, the registry of open routes and
//! role requirements, and the decision logic built on top of it.
//!
//! ## Decision Order
//!
//! 1. Open route → allow, roles are not consulted
//! 2. No role requirement for the route → allow (or deny under
//!    [`UnregisteredRoutePolicy::Deny`])
//! 3. Otherwise allow iff the principal holds any one of the required roles

pub mod decision;
pub mod matcher;
pub mod pattern;
pub mod registry;

pub use decision::{AuthorizationEngine, DecisionOutcome, DecisionReason, UnregisteredRoutePolicy};
pub use matcher::CompiledPattern;
pub use pattern::RoutePattern;
pub use registry::{RoleRequirement, RoleSet, RoutePolicyRegistry};
