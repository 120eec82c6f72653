// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request state shared by the guards of one pipeline run.

use axum::http::{request::Parts, HeaderMap, Method};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::{AuthError, Principal};

/// Request id header, set by the request-id layer when present.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request state carried through the guard chain.
///
/// A guard that denies records its rejection here before returning `false`.
/// The first rejection recorded is final.
#[derive(Debug)]
pub struct RequestContext {
    request_id: String,
    method: Method,
    path: String,
    headers: HeaderMap,
    public: bool,
    principal: Option<Principal>,
    rejection: Option<AuthError>,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>, headers: HeaderMap) -> Self {
        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            request_id,
            method,
            path: path.into(),
            headers,
            public: false,
            principal: None,
            rejection: None,
        }
    }

    /// Build from request parts. Headers are copied, the request keeps its own.
    pub fn from_parts(parts: &Parts) -> Self {
        Self::new(
            parts.method.clone(),
            parts.uri.path(),
            parts.headers.clone(),
        )
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as a string, `None` if absent or not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Claim of the attached principal.
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.principal.as_ref().and_then(|p| p.claim(name))
    }

    /// Mark the request as targeting an open route.
    pub fn mark_public(&mut self) {
        self.public = true;
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn principal_mut(&mut self) -> Option<&mut Principal> {
        self.principal.as_mut()
    }

    pub fn set_principal(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }

    /// Record a terminal rejection. Later rejections never replace it.
    pub fn reject(&mut self, error: AuthError) {
        if self.rejection.is_none() {
            self.rejection = Some(error);
        }
    }

    pub fn rejection(&self) -> Option<&AuthError> {
        self.rejection.as_ref()
    }

    pub fn take_rejection(&mut self) -> Option<AuthError> {
        self.rejection.take()
    }

    pub fn into_principal(self) -> Option<Principal> {
        self.principal
    }
}
