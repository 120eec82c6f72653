// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the typed configuration loaded
//! from them at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `JWT_SECRET` | HMAC secret for bearer token verification | One of secret/JWKS required |
//! | `JWKS_URL` | HTTPS JWKS endpoint for bearer token verification | One of secret/JWKS required |
//! | `JWT_ISSUER` | Expected `iss` claim | Unchecked |
//! | `JWT_AUDIENCE` | Expected `aud` claim | Unchecked |
//! | `SERVER_PRIVATE_KEY_PATH` | PKCS#8 PEM private key for key-pair validation | Disabled |
//! | `ACCESS_KEY_CIPHER_KEY` | Base64 AES-256-GCM key for API and access keys | Required with key path |
//! | `ACCESS_KEYS` | Comma-separated `apiKeyId=sealedPublicKeyPem` entries for the in-memory access key loader | Empty |
//! | `UNREGISTERED_ROUTE_POLICY` | `allow` or `deny` for routes with no role requirement | `allow` |

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::logging::LogFormat;
use crate::policy::UnregisteredRoutePolicy;

/// Server bind address.
pub const HOST_ENV: &str = "HOST";
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Server bind port.
pub const PORT_ENV: &str = "PORT";
pub const DEFAULT_PORT: u16 = 8080;

/// `json` for production log shipping, `pretty` for local development.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// HMAC secret for HS256 bearer tokens.
///
/// Takes precedence over `JWKS_URL` when both are set.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";

/// JWKS endpoint for asymmetric bearer tokens. Must be HTTPS.
pub const JWKS_URL_ENV: &str = "JWKS_URL";

pub const JWT_ISSUER_ENV: &str = "JWT_ISSUER";
pub const JWT_AUDIENCE_ENV: &str = "JWT_AUDIENCE";

/// Path of the server private key.
///
/// When set, every non-open request must also pass key-pair validation and
/// the process refuses to start if the key cannot be loaded.
pub const SERVER_PRIVATE_KEY_PATH_ENV: &str = "SERVER_PRIVATE_KEY_PATH";

/// Base64-encoded 32-byte key sealing API keys and access keys.
pub const ACCESS_KEY_CIPHER_KEY_ENV: &str = "ACCESS_KEY_CIPHER_KEY";

/// Access keys served by the in-memory loader, as `id=sealed` pairs
/// separated by commas. Sealed values are `ACCESS_KEY_CIPHER_KEY` output.
pub const ACCESS_KEYS_ENV: &str = "ACCESS_KEYS";

pub const UNREGISTERED_ROUTE_POLICY_ENV: &str = "UNREGISTERED_ROUTE_POLICY";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not valid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{var} is required when {required_by} is set")]
    Missing {
        var: &'static str,
        required_by: &'static str,
    },

    #[error("Either JWT_SECRET or JWKS_URL must be set")]
    NoTokenVerifier,
}

/// How bearer tokens are verified.
#[derive(Clone, PartialEq, Eq)]
pub enum TokenVerifier {
    Secret(String),
    Jwks(String),
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenVerifier::Secret(_) => f.write_str("Secret(<redacted>)"),
            TokenVerifier::Jwks(url) => f.debug_tuple("Jwks").field(url).finish(),
        }
    }
}

/// Key-pair validation settings.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyValidationConfig {
    pub private_key_path: PathBuf,
    pub cipher_key: String,
    /// `(api_key_id, sealed public key PEM)` pairs.
    pub access_keys: Vec<(String, String)>,
}

impl std::fmt::Debug for KeyValidationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValidationConfig")
            .field("private_key_path", &self.private_key_path)
            .field("access_keys", &self.access_keys.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatekeeperConfig {
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
    pub token_verifier: TokenVerifier,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub key_validation: Option<KeyValidationConfig>,
    pub unregistered_routes: UnregisteredRoutePolicy,
}

impl GatekeeperConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = var(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match var(PORT_ENV) {
            Some(port) => port.parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: PORT_ENV,
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        let bind_addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                var: HOST_ENV,
                reason: e.to_string(),
            })?;

        let log_format = match var(LOG_FORMAT_ENV) {
            Some(format) => format.parse().map_err(|reason| ConfigError::Invalid {
                var: LOG_FORMAT_ENV,
                reason,
            })?,
            None => LogFormat::default(),
        };

        let token_verifier = match (var(JWT_SECRET_ENV), var(JWKS_URL_ENV)) {
            (Some(secret), _) => TokenVerifier::Secret(secret),
            (None, Some(url)) => TokenVerifier::Jwks(url),
            (None, None) => return Err(ConfigError::NoTokenVerifier),
        };

        let key_validation = match var(SERVER_PRIVATE_KEY_PATH_ENV) {
            Some(path) => {
                let cipher_key = var(ACCESS_KEY_CIPHER_KEY_ENV).ok_or(ConfigError::Missing {
                    var: ACCESS_KEY_CIPHER_KEY_ENV,
                    required_by: SERVER_PRIVATE_KEY_PATH_ENV,
                })?;
                let access_keys = match var(ACCESS_KEYS_ENV) {
                    Some(entries) => parse_access_keys(&entries)?,
                    None => Vec::new(),
                };
                Some(KeyValidationConfig {
                    private_key_path: PathBuf::from(path),
                    cipher_key,
                    access_keys,
                })
            }
            None => None,
        };

        let unregistered_routes = match var(UNREGISTERED_ROUTE_POLICY_ENV) {
            Some(policy) => policy.parse().map_err(|reason| ConfigError::Invalid {
                var: UNREGISTERED_ROUTE_POLICY_ENV,
                reason,
            })?,
            None => UnregisteredRoutePolicy::default(),
        };

        Ok(Self {
            bind_addr,
            log_format,
            token_verifier,
            issuer: var(JWT_ISSUER_ENV),
            audience: var(JWT_AUDIENCE_ENV),
            key_validation,
            unregistered_routes,
        })
    }
}

/// Split `id=sealed,id=sealed`. Only the first `=` separates, since sealed
/// values are padded base64.
fn parse_access_keys(entries: &str) -> Result<Vec<(String, String)>, ConfigError> {
    entries
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (id, sealed) = entry.split_once('=').ok_or_else(|| ConfigError::Invalid {
                var: ACCESS_KEYS_ENV,
                reason: "expected apiKeyId=sealedKey".to_string(),
            })?;
            let (id, sealed) = (id.trim(), sealed.trim());
            if id.is_empty() || sealed.is_empty() {
                return Err(ConfigError::Invalid {
                    var: ACCESS_KEYS_ENV,
                    reason: "empty api key id or sealed key".to_string(),
                });
            }
            Ok((id.to_string(), sealed.to_string()))
        })
        .collect()
}
