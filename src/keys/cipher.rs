// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Symmetric cipher for API keys and sealed access keys.
//!
//! Ciphertexts are `base64(nonce || ciphertext || tag)` with a fresh random
//! 96-bit nonce per encryption (AES-256-GCM, no associated data).

use base64ct::{Base64, Encoding};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

/// AES-256-GCM key length in bytes.
pub const KEY_LEN: usize = 32;

/// GCM authentication tag length in bytes.
const TAG_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("Cipher key must be {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Value is not valid base64")]
    Encoding,

    #[error("Ciphertext is too short")]
    Truncated,

    #[error("Ciphertext failed authentication")]
    Authentication,

    #[error("Plaintext is not valid UTF-8")]
    Utf8,

    #[error("Nonce generation failed")]
    Rng,
}

/// Encrypts and decrypts UTF-8 secrets.
pub trait SecretCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError>;
    fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError>;
}

/// AES-256-GCM implementation backed by `ring`.
pub struct AesGcmCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl std::fmt::Debug for AesGcmCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmCipher").finish_non_exhaustive()
    }
}

impl AesGcmCipher {
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        let unbound = UnboundKey::new(&AES_256_GCM, key).map_err(|_| {
            CipherError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: key.len(),
            }
        })?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Build from a base64-encoded 32-byte key.
    pub fn from_base64(encoded: &str) -> Result<Self, CipherError> {
        let key = Base64::decode_vec(encoded.trim()).map_err(|_| CipherError::Encoding)?;
        Self::new(&key)
    }
}

impl SecretCipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CipherError::Rng)?;

        let mut sealed = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut sealed,
            )
            .map_err(|_| CipherError::Authentication)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(Base64::encode_string(&out))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError> {
        let raw = Base64::decode_vec(ciphertext.trim()).map_err(|_| CipherError::Encoding)?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::Truncated);
        }

        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce).map_err(|_| CipherError::Truncated)?;
        let mut buffer = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut buffer)
            .map_err(|_| CipherError::Authentication)?;

        String::from_utf8(plaintext.to_vec()).map_err(|_| CipherError::Utf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> AesGcmCipher {
        AesGcmCipher::new(&[7u8; KEY_LEN]).unwrap()
    }

    #[test]
    fn decrypts_what_it_encrypts() {
        let cipher = cipher();
        let sealed = cipher.encrypt("api-key-42").unwrap();
        assert_ne!(sealed, "api-key-42");
        assert_eq!(cipher.decrypt(&sealed).unwrap(), "api-key-42");
    }

    #[test]
    fn nonces_differ_per_encryption() {
        let cipher = cipher();
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn rejects_wrong_key_length() {
        assert!(matches!(
            AesGcmCipher::new(&[0u8; 16]),
            Err(CipherError::InvalidKeyLength { expected: 32, actual: 16 })
        ));
    }

    #[test]
    fn from_base64_accepts_encoded_key() {
        let encoded = Base64::encode_string(&[7u8; KEY_LEN]);
        let from_b64 = AesGcmCipher::from_base64(&encoded).unwrap();
        let sealed = cipher().encrypt("shared").unwrap();
        assert_eq!(from_b64.decrypt(&sealed).unwrap(), "shared");
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let cipher = cipher();
        let sealed = cipher.encrypt("api-key-42").unwrap();
        let mut raw = Base64::decode_vec(&sealed).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = Base64::encode_string(&raw);

        assert!(matches!(cipher.decrypt(&tampered), Err(CipherError::Authentication)));
    }

    #[test]
    fn rejects_garbage_input() {
        let cipher = cipher();
        assert!(matches!(cipher.decrypt("%%%"), Err(CipherError::Encoding)));
        assert!(matches!(
            cipher.decrypt(&Base64::encode_string(b"short")),
            Err(CipherError::Truncated)
        ));
    }

    #[test]
    fn different_key_cannot_decrypt() {
        let sealed = cipher().encrypt("secret").unwrap();
        let other = AesGcmCipher::new(&[9u8; KEY_LEN]).unwrap();
        assert!(matches!(other.decrypt(&sealed), Err(CipherError::Authentication)));
    }
}
