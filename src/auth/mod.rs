// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Turns bearer credentials into a [`Principal`] for the guard pipeline.
//!
//! ## Auth Flow
//!
//! 1. Caller sends `Authorization: Bearer <JWT>`
//! 2. The claims extractor:
//!    - Verifies signature, expiry, issuer, audience (static key or JWKS)
//!    - Extracts:
//!      - `sub` → principal id
//!      - role claim (default `roles`) → principal roles
//!      - `apiKey` → encrypted API key for key-pair validation
//! 3. An optional [`RoleLoader`] adds application-managed roles
//! 4. The pipeline attaches the principal to the request extensions, where
//!    handlers read it through the [`Auth`] extractor
//!
//! ## Security
//!
//! - Extraction failures always reject the request, never fall through
//! - JWKS is fetched over HTTPS only and cached with a TTL
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod jwt;
pub mod roles;

pub use claims::{Claims, Principal};
pub use error::AuthError;
pub use extractor::{Auth, OptionalAuth};
pub use jwks::JwksManager;
pub use jwt::{bearer_token, ClaimsExtractor, JwtClaimsExtractor};
pub use roles::{RoleLoader, StaticRoleLoader};
