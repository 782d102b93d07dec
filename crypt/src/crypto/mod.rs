//! Cryptographic primitives behind auth tokens and package bodies. Derivation
//! and sealing live in separate submodules so each stays easy to audit.

use thiserror::Error;

pub mod cipher;
pub mod kdf;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key length; expected 32 bytes")]
    InvalidKeyLength,
    #[error("key derivation failed: {0}")]
    DerivationFailed(String),
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
}
