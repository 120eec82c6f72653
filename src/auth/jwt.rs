// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token claim extraction.
//!
//! [`ClaimsExtractor`] is the seam between the guard pipeline and whatever
//! verifies bearer credentials. [`JwtClaimsExtractor`] is the JWT
//! implementation: it verifies the token with `jsonwebtoken` against a
//! static key or a [`JwksManager`] and turns the claims into a [`Principal`].

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Algorithm, DecodingKey, Validation};

use super::claims::{Claims, DEFAULT_ROLES_CLAIM};
use super::{AuthError, JwksManager, Principal};

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Turns request headers into an authenticated principal.
///
/// Failure is always an error; an extractor never yields an anonymous
/// principal.
#[async_trait]
pub trait ClaimsExtractor: Send + Sync {
    async fn extract(&self, headers: &HeaderMap) -> Result<Principal, AuthError>;
}

/// Read the bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(AuthError::InvalidAuthHeader)?;

    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}

/// Where token verification keys come from.
#[derive(Clone)]
enum VerificationKey {
    Static {
        key: DecodingKey,
        algorithm: Algorithm,
    },
    Jwks(Arc<JwksManager>),
    /// Structure-only decoding, no signature check.
    #[cfg(feature = "dev")]
    Insecure,
}

/// JWT-backed claims extractor.
#[derive(Clone)]
pub struct JwtClaimsExtractor {
    key: VerificationKey,
    issuer: Option<String>,
    audience: Option<String>,
    roles_claim: String,
}

impl JwtClaimsExtractor {
    fn with_key(key: VerificationKey) -> Self {
        Self {
            key,
            issuer: None,
            audience: None,
            roles_claim: DEFAULT_ROLES_CLAIM.to_string(),
        }
    }

    /// Verify HS256 tokens with a shared secret.
    pub fn hmac(secret: &[u8]) -> Self {
        Self::with_key(VerificationKey::Static {
            key: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
        })
    }

    /// Verify RS256 tokens with a PEM-encoded RSA public key.
    pub fn rsa_pem(public_key_pem: &[u8]) -> Result<Self, AuthError> {
        let key = DecodingKey::from_rsa_pem(public_key_pem)
            .map_err(|e| AuthError::InternalError(format!("Invalid RSA verification key: {e}")))?;
        Ok(Self::with_key(VerificationKey::Static {
            key,
            algorithm: Algorithm::RS256,
        }))
    }

    /// Verify ES256 tokens with a PEM-encoded EC public key.
    pub fn ec_pem(public_key_pem: &[u8]) -> Result<Self, AuthError> {
        let key = DecodingKey::from_ec_pem(public_key_pem)
            .map_err(|e| AuthError::InternalError(format!("Invalid EC verification key: {e}")))?;
        Ok(Self::with_key(VerificationKey::Static {
            key,
            algorithm: Algorithm::ES256,
        }))
    }

    /// Verify tokens against keys published at a JWKS endpoint.
    pub fn jwks(jwks: Arc<JwksManager>) -> Self {
        Self::with_key(VerificationKey::Jwks(jwks))
    }

    /// Decode tokens without verifying signatures.
    ///
    /// WARNING: development only.
    #[cfg(feature = "dev")]
    pub fn insecure() -> Self {
        tracing::warn!("JWT signature verification is disabled (dev feature)");
        Self::with_key(VerificationKey::Insecure)
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Claim holding role names (default `roles`).
    pub fn with_roles_claim(mut self, claim: impl Into<String>) -> Self {
        self.roles_claim = claim.into();
        self
    }

    /// Verify a token and return its claims.
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        match &self.key {
            VerificationKey::Static { key, algorithm } => self.decode_claims(token, key, *algorithm),
            VerificationKey::Jwks(jwks) => {
                let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
                let (key, algorithm) = match &header.kid {
                    Some(kid) => jwks.get_decoding_key(kid).await?,
                    None => jwks.get_any_decoding_key().await?,
                };
                self.decode_claims(token, &key, algorithm)
            }
            #[cfg(feature = "dev")]
            VerificationKey::Insecure => decode_insecure(token),
        }
    }

    fn decode_claims(
        &self,
        token: &str,
        key: &DecodingKey,
        algorithm: Algorithm,
    ) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(algorithm);
        validation.leeway = CLOCK_SKEW_LEEWAY;

        if let Some(ref issuer) = self.issuer {
            validation.set_issuer(&[issuer]);
        }
        match self.audience {
            Some(ref audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        decode::<Claims>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                ErrorKind::InvalidAudience => AuthError::InvalidAudience,
                ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
                _ => AuthError::MalformedToken,
            })
    }
}

#[cfg(feature = "dev")]
fn decode_insecure(token: &str) -> Result<Claims, AuthError> {
    let claims = jsonwebtoken::dangerous::insecure_decode::<Claims>(token)
        .map_err(|_| AuthError::MalformedToken)?
        .claims;

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| AuthError::InternalError(e.to_string()))?
        .as_secs();
    let exp = claims
        .get("exp")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0);
    if exp > 0 && exp + CLOCK_SKEW_LEEWAY < now {
        return Err(AuthError::TokenExpired);
    }
    Ok(claims)
}

#[async_trait]
impl ClaimsExtractor for JwtClaimsExtractor {
    async fn extract(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = bearer_token(headers)?;
        let claims = self.verify(token).await?;
        Principal::from_claims(claims, &self.roles_claim)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};

    use super::*;

    const SECRET: &[u8] = b"test-signing-secret";
    const FAR_FUTURE: u64 = 4_102_444_800;

    fn token(claims: Value, secret: &[u8]) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn bearer(claims: Value) -> HeaderMap {
        headers_with(&format!("Bearer {}", token(claims, SECRET)))
    }

    #[test]
    fn bearer_token_requires_header() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingAuthHeader)
        ));
        assert!(matches!(
            bearer_token(&headers_with("Basic dXNlcjpwYXNz")),
            Err(AuthError::InvalidAuthHeader)
        ));
        assert!(matches!(
            bearer_token(&headers_with("Bearer ")),
            Err(AuthError::InvalidAuthHeader)
        ));
        assert_eq!(bearer_token(&headers_with("Bearer abc.def")).unwrap(), "abc.def");
    }

    #[tokio::test]
    async fn extracts_principal_from_valid_token() {
        let extractor = JwtClaimsExtractor::hmac(SECRET);
        let principal = extractor
            .extract(&bearer(json!({
                "sub": "user_123",
                "exp": FAR_FUTURE,
                "roles": ["user:catalogs:view"],
                "apiKey": "sealed-key"
            })))
            .await
            .unwrap();

        assert_eq!(principal.id, "user_123");
        assert!(principal.has_role("user:catalogs:view"));
        assert_eq!(principal.encrypted_secret.as_deref(), Some("sealed-key"));
    }

    #[tokio::test]
    async fn custom_roles_claim() {
        let extractor = JwtClaimsExtractor::hmac(SECRET).with_roles_claim("permissions");
        let principal = extractor
            .extract(&bearer(json!({
                "sub": "svc",
                "exp": FAR_FUTURE,
                "permissions": ["reports:read"]
            })))
            .await
            .unwrap();
        assert!(principal.has_role("reports:read"));
    }

    #[tokio::test]
    async fn rejects_wrong_signature() {
        let extractor = JwtClaimsExtractor::hmac(SECRET);
        let headers = headers_with(&format!(
            "Bearer {}",
            token(json!({"sub": "u", "exp": FAR_FUTURE}), b"another-secret")
        ));
        assert!(matches!(
            extractor.extract(&headers).await,
            Err(AuthError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let extractor = JwtClaimsExtractor::hmac(SECRET);
        let result = extractor
            .extract(&bearer(json!({"sub": "u", "exp": 1_000_000})))
            .await;
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn checks_issuer_and_audience() {
        let extractor = JwtClaimsExtractor::hmac(SECRET)
            .with_issuer("https://issuer.example")
            .with_audience("gatekeeper");

        let wrong_issuer = extractor
            .extract(&bearer(json!({
                "sub": "u", "exp": FAR_FUTURE,
                "iss": "https://other.example", "aud": "gatekeeper"
            })))
            .await;
        assert!(matches!(wrong_issuer, Err(AuthError::InvalidIssuer)));

        let wrong_audience = extractor
            .extract(&bearer(json!({
                "sub": "u", "exp": FAR_FUTURE,
                "iss": "https://issuer.example", "aud": "someone-else"
            })))
            .await;
        assert!(matches!(wrong_audience, Err(AuthError::InvalidAudience)));

        let ok = extractor
            .extract(&bearer(json!({
                "sub": "u", "exp": FAR_FUTURE,
                "iss": "https://issuer.example", "aud": "gatekeeper"
            })))
            .await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn rejects_garbage_and_missing_subject() {
        let extractor = JwtClaimsExtractor::hmac(SECRET);
        assert!(matches!(
            extractor.extract(&headers_with("Bearer not-a-jwt")).await,
            Err(AuthError::MalformedToken)
        ));
        assert!(matches!(
            extractor.extract(&bearer(json!({"exp": FAR_FUTURE}))).await,
            Err(AuthError::MissingSubject)
        ));
    }

    #[cfg(feature = "dev")]
    #[tokio::test]
    async fn insecure_mode_skips_signature() {
        use base64ct::{Base64UrlUnpadded, Encoding};

        let header = Base64UrlUnpadded::encode_string(br#"{"alg":"RS256","typ":"JWT"}"#);
        let claims = Base64UrlUnpadded::encode_string(
            format!(r#"{{"sub":"dev_user","exp":{FAR_FUTURE}}}"#).as_bytes(),
        );
        let headers = headers_with(&format!("Bearer {header}.{claims}.fake_signature"));

        let principal = JwtClaimsExtractor::insecure().extract(&headers).await.unwrap();
        assert_eq!(principal.id, "dev_user");
    }
}
