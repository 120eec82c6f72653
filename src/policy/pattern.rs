// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Route patterns of the form `<METHOD>::<template>`.

use std::fmt;

use axum::http::Method;

/// Separator between the HTTP method and the path template in a pattern key.
pub const KEY_SEPARATOR: &str = "::";

/// A registered route: HTTP method plus a path template.
///
/// Template segments are either literal (`/catalogs`) or dynamic
/// (`/:catalogId` or `/{catalogId}`). The identity key is
/// `method + "::" + template` and never changes after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutePattern {
    method: String,
    template: String,
}

impl RoutePattern {
    /// Build a pattern from a typed method and a template.
    pub fn new(method: Method, template: impl Into<String>) -> Self {
        Self {
            method: method.as_str().to_string(),
            template: template.into(),
        }
    }

    /// Parse `<METHOD>::<template>`.
    ///
    /// Input without a separator is kept verbatim as the template with an
    /// empty method. Such a pattern can never match a request, since every
    /// request carries a method.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(KEY_SEPARATOR) {
            Some((method, template)) => Self {
                method: method.to_string(),
                template: template.to_string(),
            },
            None => {
                tracing::warn!(pattern = %raw, "Route pattern has no method separator and will never match");
                Self {
                    method: String::new(),
                    template: raw.to_string(),
                }
            }
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Identity key used by the registry.
    pub fn key(&self) -> String {
        request_key(&self.method, &self.template)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{KEY_SEPARATOR}{}", self.method, self.template)
    }
}

impl From<&str> for RoutePattern {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for RoutePattern {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

/// Lookup key for a concrete request.
pub fn request_key(method: &str, path: &str) -> String {
    format!("{method}{KEY_SEPARATOR}{path}")
}
