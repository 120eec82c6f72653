// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key loading and key validation errors.

use std::path::PathBuf;

use super::cipher::CipherError;

/// Failure to load the server private key. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum KeyLoadError {
    #[error("Failed to read private key file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid PEM: {0}")]
    Pem(#[from] pem::PemError),

    #[error("Unexpected PEM block '{found}' (expected '{expected}')")]
    UnexpectedPemTag {
        expected: &'static str,
        found: String,
    },

    #[error("Invalid PKCS#8 private key: {0}")]
    Pkcs8(String),

    #[error("Unsupported private key type: {0}")]
    UnsupportedKeyType(String),
}

/// Per-request key validation failure. Always resolved as a deny.
#[derive(Debug, thiserror::Error)]
pub enum KeyValidationError {
    #[error("Claim extraction failed: {0}")]
    ClaimExtraction(String),

    #[error("Claim '{0}' is missing")]
    MissingApiKeyClaim(String),

    #[error("Failed to decrypt {stage}: {source}")]
    Decryption {
        stage: &'static str,
        #[source]
        source: CipherError,
    },

    #[error("Access key loader failed: {0}")]
    KeyLoader(String),

    #[error("Invalid public key: {0}")]
    PublicKeyParse(String),

    #[error("Public key does not match the server key pair ({0})")]
    KeyMismatch(&'static str),
}

impl KeyValidationError {
    /// Stable failure class for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            KeyValidationError::ClaimExtraction(_) | KeyValidationError::MissingApiKeyClaim(_) => {
                "claim_extraction_failed"
            }
            KeyValidationError::Decryption { .. } => "decryption_failed",
            KeyValidationError::KeyLoader(_) => "key_loader_failed",
            KeyValidationError::PublicKeyParse(_) => "public_key_parse_failed",
            KeyValidationError::KeyMismatch(_) => "key_mismatch",
        }
    }
}
