// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access key lookup for key-pair validation.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tower::BoxError;

use crate::pipeline::RequestContext;

/// Fetches the caller's sealed public key for a request.
///
/// Called after the API key has been decrypted, so
/// `ctx.principal().api_key_id` is set. The returned value is still
/// encrypted; the validator decrypts it with the secret cipher.
#[async_trait]
pub trait AccessKeyLoader: Send + Sync {
    async fn load_access_key(&self, ctx: &RequestContext) -> Result<String, BoxError>;
}

/// Sealed public keys keyed by API key id.
#[derive(Debug, Default)]
pub struct InMemoryAccessKeys {
    keys: RwLock<HashMap<String, String>>,
}

impl InMemoryAccessKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the sealed key for an API key id.
    pub fn insert(&self, api_key_id: impl Into<String>, sealed_public_key: impl Into<String>) {
        self.keys
            .write()
            .insert(api_key_id.into(), sealed_public_key.into());
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

#[async_trait]
impl AccessKeyLoader for InMemoryAccessKeys {
    async fn load_access_key(&self, ctx: &RequestContext) -> Result<String, BoxError> {
        let api_key_id = ctx
            .principal()
            .and_then(|p| p.api_key_id.as_deref())
            .ok_or("request has no decrypted API key id")?;

        self.keys
            .read()
            .get(api_key_id)
            .cloned()
            .ok_or_else(|| format!("no access key registered for '{api_key_id}'").into())
    }
}
