// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request proof that a caller's registered public key pairs with the
//! server private key.

use std::sync::Arc;

use serde_json::Value;

use super::cipher::SecretCipher;
use super::error::KeyValidationError;
use super::loader::AccessKeyLoader;
use super::material::{PublicKeyMaterial, ServerKeyPair};
use crate::auth::claims::API_KEY_CLAIM;
use crate::auth::ClaimsExtractor;
use crate::pipeline::RequestContext;

/// Validates service callers against the server key pair.
///
/// Steps, each a terminal failure:
///
/// 1. Claims: reuse the principal attached by authentication, or run the
///    configured extractor
/// 2. Decrypt the API key claim and record it as `Principal::api_key_id`
/// 3. Load the caller's sealed access key
/// 4. Decrypt it to a PEM public key
/// 5. Parse the PKIX public key
/// 6. Compare its public parameters with the server key pair
pub struct AsymmetricKeyValidator {
    key_pair: Arc<ServerKeyPair>,
    loader: Arc<dyn AccessKeyLoader>,
    cipher: Arc<dyn SecretCipher>,
    extractor: Option<Arc<dyn ClaimsExtractor>>,
    api_key_claim: String,
}

impl std::fmt::Debug for AsymmetricKeyValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsymmetricKeyValidator")
            .field("key_family", &self.key_pair.private_key().family())
            .field("api_key_claim", &self.api_key_claim)
            .field("has_extractor", &self.extractor.is_some())
            .finish_non_exhaustive()
    }
}

impl AsymmetricKeyValidator {
    pub fn new(
        key_pair: Arc<ServerKeyPair>,
        loader: Arc<dyn AccessKeyLoader>,
        cipher: Arc<dyn SecretCipher>,
    ) -> Self {
        Self {
            key_pair,
            loader,
            cipher,
            extractor: None,
            api_key_claim: API_KEY_CLAIM.to_string(),
        }
    }

    /// Extractor used when no principal is attached yet.
    pub fn with_extractor(mut self, extractor: Arc<dyn ClaimsExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_api_key_claim(mut self, claim: impl Into<String>) -> Self {
        self.api_key_claim = claim.into();
        self
    }

    pub fn key_pair(&self) -> &Arc<ServerKeyPair> {
        &self.key_pair
    }

    pub async fn validate(&self, ctx: &mut RequestContext) -> Result<(), KeyValidationError> {
        self.ensure_principal(ctx).await?;

        let sealed_api_key = ctx
            .principal()
            .and_then(|principal| {
                principal
                    .claim(&self.api_key_claim)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| principal.encrypted_secret.clone())
            })
            .ok_or_else(|| KeyValidationError::MissingApiKeyClaim(self.api_key_claim.clone()))?;

        let api_key_id = self
            .cipher
            .decrypt(&sealed_api_key)
            .map_err(|source| KeyValidationError::Decryption {
                stage: "api key",
                source,
            })?;
        if let Some(principal) = ctx.principal_mut() {
            principal.api_key_id = Some(api_key_id);
        }

        let sealed_access_key = self
            .loader
            .load_access_key(ctx)
            .await
            .map_err(|e| KeyValidationError::KeyLoader(e.to_string()))?;

        let public_pem = self
            .cipher
            .decrypt(&sealed_access_key)
            .map_err(|source| KeyValidationError::Decryption {
                stage: "access key",
                source,
            })?;

        let supplied = PublicKeyMaterial::from_public_key_pem(&public_pem)?;
        self.key_pair.verify_counterpart(&supplied)
    }

    async fn ensure_principal(&self, ctx: &mut RequestContext) -> Result<(), KeyValidationError> {
        if ctx.principal().is_some() {
            return Ok(());
        }
        let extractor = self.extractor.as_ref().ok_or_else(|| {
            KeyValidationError::ClaimExtraction("no principal and no claims extractor".into())
        })?;
        let principal = extractor
            .extract(ctx.headers())
            .await
            .map_err(|e| KeyValidationError::ClaimExtraction(e.to_string()))?;
        ctx.set_principal(principal);
        Ok(())
    }
}
