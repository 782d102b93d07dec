//! Key derivation and digest helpers. Auth tokens come from PBKDF2, package
//! content keys from HKDF; both run over HMAC-SHA256.

use hkdf::Hkdf;
use hmac::Hmac;
use sha2::{Digest, Sha256};

use super::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// Returns the hexadecimal representation of a SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    let digest: [u8; 32] = Sha256::digest(data).into();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Derives `length` bytes with PBKDF2-HMAC-SHA256.
pub fn pbkdf2_sha256(password: &[u8], salt: &[u8], rounds: u32, length: usize) -> Result<Vec<u8>, CryptoError> {
    let mut okm = vec![0u8; length];
    pbkdf2::pbkdf2::<HmacSha256>(password, salt, rounds, &mut okm)
        .map_err(|e| CryptoError::DerivationFailed(format!("{e}")))?;
    Ok(okm)
}

/// Derives key material using HKDF-SHA256.
pub fn hkdf_expand(input_key_material: &[u8], salt: &[u8], info: &[u8], length: usize) -> Result<Vec<u8>, CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), input_key_material);
    let mut okm = vec![0u8; length];
    hk.expand(info, &mut okm)
        .map_err(|e| CryptoError::DerivationFailed(format!("{e}")))?;
    Ok(okm)
}
