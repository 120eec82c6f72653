// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Route policy registry.
//!
//! Holds the open (public) routes and the role requirements per route.
//! Registration normally happens at startup, but every mutation and lookup
//! goes through a single read-write lock so that late registration can race
//! with live traffic safely.
//!
//! ## Matching order
//!
//! A request key (`METHOD::path`) is first compared for exact equality with
//! registered keys. Otherwise patterns are tried most-specific first (see
//! [`CompiledPattern::precedence`]); ties keep registration order. The first
//! pattern that matches wins.
//!
//! ## HEAD requests
//!
//! Axum serves `HEAD` with the `GET` handler of a route. A `HEAD` request
//! with no `HEAD::` registration of its own (open or role-protected) is
//! therefore resolved under the `GET::` key for the same path.

use std::collections::{BTreeSet, HashMap};

use axum::http::Method;
use parking_lot::RwLock;

use super::matcher::CompiledPattern;
use super::pattern::{request_key, RoutePattern};

/// Ordered set of role names.
pub type RoleSet = BTreeSet<String>;

/// Role requirement resolved for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRequirement {
    /// The registered pattern that matched.
    pub pattern: RoutePattern,
    /// Roles of which the principal needs at least one.
    pub roles: RoleSet,
}

#[derive(Debug)]
struct Entry<V> {
    compiled: CompiledPattern,
    value: V,
}

/// Patterns kept in precedence order with an exact-key index.
#[derive(Debug)]
struct PatternTable<V> {
    entries: Vec<Entry<V>>,
    index: HashMap<String, usize>,
}

impl<V> Default for PatternTable<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<V> PatternTable<V> {
    fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        let position = *self.index.get(key)?;
        self.entries.get_mut(position).map(|entry| &mut entry.value)
    }

    fn insert(&mut self, compiled: CompiledPattern, value: V) {
        self.entries.push(Entry { compiled, value });
        // Stable sort: equal precedence keeps registration order.
        self.entries
            .sort_by(|a, b| a.compiled.precedence(&b.compiled));
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.compiled.key().to_string(), position))
            .collect();
    }

    fn lookup(&self, key: &str) -> Option<&Entry<V>> {
        if let Some(&position) = self.index.get(key) {
            return self.entries.get(position);
        }
        self.entries
            .iter()
            .find(|entry| entry.compiled.matches_key(key))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Default)]
struct Tables {
    open: PatternTable<()>,
    roles: PatternTable<RoleSet>,
}

impl Tables {
    /// Request key used for both tables.
    fn resolve_key(&self, method: &str, path: &str) -> String {
        let key = request_key(method, path);
        if method == Method::HEAD.as_str()
            && self.open.lookup(&key).is_none()
            && self.roles.lookup(&key).is_none()
        {
            return request_key(Method::GET.as_str(), path);
        }
        key
    }
}

/// Registry of open routes and per-route role requirements.
///
/// Entries are only ever added. Construct one per application and share it
/// behind an `Arc`.
#[derive(Debug, Default)]
pub struct RoutePolicyRegistry {
    tables: RwLock<Tables>,
}

impl RoutePolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a pattern (`METHOD::template`) as public. Idempotent.
    pub fn add_open_path(&self, pattern: impl Into<RoutePattern>) {
        self.add_open_route(pattern.into());
    }

    /// Typed variant of [`add_open_path`](Self::add_open_path).
    pub fn add_open_route(&self, pattern: RoutePattern) {
        let compiled = CompiledPattern::compile(pattern);
        let mut tables = self.tables.write();
        if tables.open.index.contains_key(compiled.key()) {
            return;
        }
        tracing::debug!(pattern = %compiled.pattern(), "Registered open route");
        tables.open.insert(compiled, ());
    }

    /// Require one of `roles` for a pattern (`METHOD::template`).
    ///
    /// An empty role list is a no-op. Registering the same pattern again
    /// replaces its role set.
    pub fn add_roles<I, S>(&self, pattern: impl Into<RoutePattern>, roles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_route_roles(pattern.into(), roles);
    }

    /// Typed variant of [`add_roles`](Self::add_roles).
    pub fn add_route_roles<I, S>(&self, pattern: RoutePattern, roles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let roles: RoleSet = roles.into_iter().map(Into::into).collect();
        if roles.is_empty() {
            return;
        }

        let compiled = CompiledPattern::compile(pattern);
        let mut tables = self.tables.write();
        tracing::debug!(pattern = %compiled.pattern(), roles = ?roles, "Registered route roles");
        if let Some(existing) = tables.roles.get_mut(compiled.key()) {
            *existing = roles;
        } else {
            tables.roles.insert(compiled, roles);
        }
    }

    /// Whether the request matches an open route.
    pub fn is_public_path(&self, method: &str, path: &str) -> bool {
        let tables = self.tables.read();
        let key = tables.resolve_key(method, path);
        tables.open.lookup(&key).is_some()
    }

    /// Roles registered for the first pattern matching the request.
    pub fn roles_for_path(&self, method: &str, path: &str) -> Option<RoleSet> {
        self.role_requirement(method, path)
            .map(|requirement| requirement.roles)
    }

    /// Matched pattern and its roles, for callers that log the match.
    pub fn role_requirement(&self, method: &str, path: &str) -> Option<RoleRequirement> {
        let tables = self.tables.read();
        let key = tables.resolve_key(method, path);
        tables.roles.lookup(&key).map(|entry| RoleRequirement {
            pattern: entry.compiled.pattern().clone(),
            roles: entry.value.clone(),
        })
    }

    pub fn open_route_count(&self) -> usize {
        self.tables.read().open.len()
    }

    pub fn role_rule_count(&self) -> usize {
        self.tables.read().roles.len()
    }
}
