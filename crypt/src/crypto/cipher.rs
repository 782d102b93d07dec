//! Authenticated encryption of package bodies with ChaCha20-Poly1305.
//! The cipher key is never the auth private key itself; it is expanded from it
//! with HKDF so the short token key is not used directly as cipher input.

use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::rngs::OsRng;
use zeroize::Zeroize;

use super::kdf::hkdf_expand;
use super::CryptoError;

pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;
const KEY_LEN: usize = 32;
const CONTENT_KEY_SALT: &[u8] = b"iris-crypt/package";
const CONTENT_KEY_INFO: &[u8] = b"content-key/v1";

/// Output of [`ContentCipher::seal`]: the random nonce and ciphertext with its
/// trailing authentication tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
}

/// Symmetric cipher bound to one auth private key.
pub struct ContentCipher {
    key: Key,
}

impl ContentCipher {
    /// Builds a cipher from raw key bytes. The key must be 32 bytes.
    pub fn from_key_bytes(key_bytes: &[u8]) -> Result<Self, CryptoError> {
        if key_bytes.len() != KEY_LEN {
            return Err(CryptoError::InvalidKeyLength);
        }
        let mut key = Key::default();
        key.copy_from_slice(key_bytes);
        Ok(Self { key })
    }

    /// Expands an auth private key into the package content key.
    pub fn for_private_key(private_key: &[u8]) -> Result<Self, CryptoError> {
        let mut okm = hkdf_expand(private_key, CONTENT_KEY_SALT, CONTENT_KEY_INFO, KEY_LEN)?;
        let cipher = Self::from_key_bytes(&okm);
        okm.zeroize();
        cipher
    }

    /// Encrypts `plaintext`, authenticating `aad` alongside it.
    pub fn seal(&self, aad: &[u8], plaintext: &[u8]) -> Result<Sealed, CryptoError> {
        let cipher = ChaCha20Poly1305::new(&self.key);
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, Payload { msg: plaintext, aad })
            .map_err(|e| CryptoError::EncryptionFailed(format!("{e}")))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        nonce_bytes.copy_from_slice(&nonce);
        Ok(Sealed { nonce: nonce_bytes, ciphertext })
    }

    /// Decrypts and authenticates a body produced by [`ContentCipher::seal`].
    pub fn open(&self, aad: &[u8], nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < TAG_SIZE {
            return Err(CryptoError::DecryptionFailed(
                "ciphertext shorter than authentication tag".to_string(),
            ));
        }
        let cipher = ChaCha20Poly1305::new(&self.key);
        cipher
            .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
            .map_err(|e| CryptoError::DecryptionFailed(format!("{e}")))
    }
}

impl Drop for ContentCipher {
    fn drop(&mut self) {
        self.key.as_mut_slice().zeroize();
    }
}
