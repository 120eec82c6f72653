// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Key-Pair Validation
//!
//! Service callers prove they hold a key pair registered with this server.
//!
//! ## Startup
//!
//! The server private key (PKCS#8 PEM, RSA or ECDSA) is loaded once into a
//! [`ServerKeyPair`]. A key that cannot be read, decoded or parsed, or one of
//! an unsupported type, is a [`KeyLoadError`] and the process must not start.
//!
//! ## Per request
//!
//! [`AsymmetricKeyValidator`] decrypts the caller's `apiKey` claim, loads the
//! caller's sealed public key through an [`AccessKeyLoader`], decrypts it
//! with the [`SecretCipher`], and checks that its public parameters match the
//! server key pair. Every failure is a [`KeyValidationError`], which the
//! pipeline turns into a logged deny.

pub mod cipher;
pub mod error;
pub mod loader;
pub mod material;
pub mod validator;

pub use cipher::{AesGcmCipher, CipherError, SecretCipher, KEY_LEN};
pub use error::{KeyLoadError, KeyValidationError};
pub use loader::{AccessKeyLoader, InMemoryAccessKeys};
pub use material::{
    EcdsaCurve, EcdsaPrivateKey, PublicKeyMaterial, ServerKeyPair, ServerPrivateKey,
};
pub use validator::AsymmetricKeyValidator;
