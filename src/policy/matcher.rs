// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Compiled path matchers for route templates.
//!
//! A template such as `/user/:userId/catalogs/{catalogId}` compiles to an
//! anchored regular expression over the full request key
//! (`POST::/user/abc/catalogs/xyz`). Each dynamic segment matches one or more
//! characters other than `/`, so it never spans segments.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;

use super::pattern::{request_key, RoutePattern, KEY_SEPARATOR};

/// Dynamic segment tokens: `:name` or `{name}`.
static DYNAMIC_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":[A-Za-z][A-Za-z0-9_]*|\{[A-Za-z_][A-Za-z0-9_]*\}")
        .expect("dynamic token expression is valid")
});

/// Replacement for a dynamic segment.
const SEGMENT_CAPTURE: &str = "([^/]+?)";

/// A route pattern together with its precompiled matcher.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pattern: RoutePattern,
    key: String,
    matcher: Option<Regex>,
    dynamic_segments: usize,
    literal_len: usize,
}

impl CompiledPattern {
    /// Compile a pattern once, at registration time.
    ///
    /// Compilation never rejects a template. If the expression cannot be
    /// built the pattern still matches its own key exactly.
    pub fn compile(pattern: RoutePattern) -> Self {
        let key = pattern.key();
        let mut expression = format!("^{}{KEY_SEPARATOR}", regex::escape(pattern.method()));
        let mut dynamic_segments = 0;
        let mut literal_len = 0;
        let mut last = 0;

        let template = pattern.template();
        for token in DYNAMIC_TOKEN.find_iter(template) {
            let literal = &template[last..token.start()];
            literal_len += literal.len();
            expression.push_str(&regex::escape(literal));
            expression.push_str(SEGMENT_CAPTURE);
            dynamic_segments += 1;
            last = token.end();
        }
        let tail = &template[last..];
        literal_len += tail.len();
        expression.push_str(&regex::escape(tail));
        expression.push('$');

        let matcher = match Regex::new(&expression) {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::warn!(pattern = %pattern, error = %e, "Falling back to exact matching for route pattern");
                None
            }
        };

        Self {
            pattern,
            key,
            matcher,
            dynamic_segments,
            literal_len,
        }
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// Identity key (`METHOD::template`).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Number of dynamic segments in the template.
    pub fn dynamic_segments(&self) -> usize {
        self.dynamic_segments
    }

    /// Whether a full request key (`METHOD::path`) matches.
    pub fn matches_key(&self, request_key: &str) -> bool {
        if self.key == request_key {
            return true;
        }
        self.matcher
            .as_ref()
            .is_some_and(|regex| regex.is_match(request_key))
    }

    /// Whether a concrete method and path match.
    pub fn matches(&self, method: &str, path: &str) -> bool {
        self.matches_key(&request_key(method, path))
    }

    /// Precedence between two patterns that may both match a request.
    ///
    /// `Less` means `self` is tried first: fewer dynamic segments, then more
    /// literal characters (template bytes outside dynamic tokens, so a
    /// partly literal segment like `:name.json` counts), then the longer
    /// template.
    pub fn precedence(&self, other: &Self) -> Ordering {
        self.dynamic_segments
            .cmp(&other.dynamic_segments)
            .then_with(|| other.literal_len.cmp(&self.literal_len))
            .then_with(|| {
                other
                    .pattern
                    .template()
                    .len()
                    .cmp(&self.pattern.template().len())
            })
    }
}
