//! Serial-number auth tokens.
//!
//! A token is 15 bytes: an 11 byte private key derived from the serial number,
//! the serial itself and a 16-bit checksum, both little-endian. It is shown as
//! Crockford Base32 in dash-separated groups of four:
//! `XXXX-XXXX-XXXX-XXXX-XXXX-XXXX`.
//!
//! Packages store only the 4 byte public part (serial and checksum); the
//! private part keys the package body and is never written anywhere.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use zeroize::Zeroize;

use crate::base32::{self, Base32Error};
use crate::crypto::kdf::pbkdf2_sha256;
use crate::crypto::CryptoError;

pub const PRIVATE_KEY_LEN: usize = 11;
pub const PUBLIC_KEY_LEN: usize = 4;
pub const AUTH_LEN: usize = PRIVATE_KEY_LEN + PUBLIC_KEY_LEN;

const KEY_PASSWORD: &[u8] = b"irisCrypt";
const KEY_ROUNDS: u32 = 1000;
const GROUP: usize = 4;
const PUBLIC_KEY_TEXT_OFFSET: usize = 20;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid auth encoding: {0}")]
    Encoding(#[from] Base32Error),
    #[error("invalid auth length: expected 15 bytes, got {0}")]
    Length(usize),
    #[error("auth checksum mismatch")]
    Checksum,
    #[error("auth derivation failed: {0}")]
    Derivation(#[from] CryptoError),
}

/// Wrapping 16-bit sum of the bytes read as signed values, so tokens issued
/// by earlier releases keep parsing.
fn checksum(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |sum, &b| sum.wrapping_add(b as i8 as i16 as u16))
}

/// Authentication token for one serial number.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    data: [u8; AUTH_LEN],
}

impl AuthToken {
    /// Derives the token for `serial`. The result is deterministic.
    pub fn generate(serial: u16) -> Result<Self, AuthError> {
        let mut private_key = pbkdf2_sha256(KEY_PASSWORD, serial.to_string().as_bytes(), KEY_ROUNDS, PRIVATE_KEY_LEN)?;

        let mut data = [0u8; AUTH_LEN];
        data[..PRIVATE_KEY_LEN].copy_from_slice(&private_key);
        private_key.zeroize();
        data[PRIVATE_KEY_LEN..PRIVATE_KEY_LEN + 2].copy_from_slice(&serial.to_le_bytes());
        let sum = checksum(&data[..PRIVATE_KEY_LEN + 2]);
        data[PRIVATE_KEY_LEN + 2..].copy_from_slice(&sum.to_le_bytes());
        Ok(Self { data })
    }

    /// Raw token bytes.
    pub fn as_bytes(&self) -> &[u8; AUTH_LEN] {
        &self.data
    }

    pub fn serial(&self) -> u16 {
        u16::from_le_bytes([self.data[PRIVATE_KEY_LEN], self.data[PRIVATE_KEY_LEN + 1]])
    }

    pub fn private_key(&self) -> &[u8] {
        &self.data[..PRIVATE_KEY_LEN]
    }

    /// The part of the token a package header carries.
    pub fn public_key(&self) -> &[u8] {
        &self.data[PRIVATE_KEY_LEN..]
    }

    /// Trailing groups of the display form, shown as a package's key.
    pub fn public_key_string(&self) -> String {
        self.to_string()[PUBLIC_KEY_TEXT_OFFSET..].to_string()
    }
}

impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = base32::encode(&self.data);
        for (i, group) in encoded.as_bytes().chunks(GROUP).enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            // base32 output is ASCII
            f.write_str(std::str::from_utf8(group).map_err(|_| fmt::Error)?)?;
        }
        Ok(())
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("serial", &self.serial())
            .field("public_key", &self.public_key_string())
            .finish_non_exhaustive()
    }
}

impl FromStr for AuthToken {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.trim().chars().filter(|&c| c != '-').collect();
        let bytes = base32::decode(&compact)?;
        if bytes.len() != AUTH_LEN {
            return Err(AuthError::Length(bytes.len()));
        }

        let mut data = [0u8; AUTH_LEN];
        data.copy_from_slice(&bytes);
        let stored = u16::from_le_bytes([data[AUTH_LEN - 2], data[AUTH_LEN - 1]]);
        if stored != checksum(&data[..AUTH_LEN - 2]) {
            return Err(AuthError::Checksum);
        }
        Ok(Self { data })
    }
}

impl Drop for AuthToken {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::{checksum, AuthError, AuthToken, AUTH_LEN};

    #[test]
    fn generation_is_deterministic() {
        let a = AuthToken::generate(1234).unwrap();
        let b = AuthToken::generate(1234).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, AuthToken::generate(1235).unwrap());
    }

    #[test]
    fn displays_six_groups_of_four() {
        let text = AuthToken::generate(1234).unwrap().to_string();
        let groups: Vec<&str> = text.split('-').collect();
        assert_eq!(groups.len(), 6);
        assert!(groups.iter().all(|g| g.len() == 4));
        assert!(!text.contains('='));
    }

    #[test]
    fn carries_serial_and_checksum() {
        let token = AuthToken::generate(0xBEEF).unwrap();
        assert_eq!(token.serial(), 0xBEEF);
        assert_eq!(&token.public_key()[..2], &[0xEF, 0xBE]);
        assert_eq!(token.private_key().len() + token.public_key().len(), AUTH_LEN);
    }

    #[test]
    fn parses_its_own_display_form() {
        let token = AuthToken::generate(42).unwrap();
        let parsed: AuthToken = token.to_string().parse().unwrap();
        assert_eq!(parsed, token);

        let lower: AuthToken = token.to_string().to_lowercase().parse().unwrap();
        assert_eq!(lower, token);

        let undashed: AuthToken = token.to_string().replace('-', "").parse().unwrap();
        assert_eq!(undashed, token);
    }

    #[test]
    fn public_key_string_is_the_last_two_groups() {
        let token = AuthToken::generate(7).unwrap();
        let text = token.to_string();
        assert_eq!(token.public_key_string(), text[20..]);
        assert_eq!(token.public_key_string().len(), 9);
    }

    #[test]
    fn matches_known_token_for_serial_1234() {
        let token = AuthToken::generate(1234).unwrap();
        assert_eq!(token.to_string(), "C3S2-3TZJ-7DMF-42YE-YK90-9200");
        assert_eq!(token.public_key(), &[0xD2, 0x04, 0x88, 0x00]);
        assert_eq!(token.public_key_string(), "YK90-9200");
        let parsed: AuthToken = "C3S2-3TZJ-7DMF-42YE-YK90-9200".parse().unwrap();
        assert_eq!(parsed.serial(), 1234);
    }

    #[test]
    fn checksum_sums_bytes_as_signed() {
        assert_eq!(checksum(&[0x01, 0x02]), 0x0003);
        assert_eq!(checksum(&[0xFF]), 0xFFFF);
        assert_eq!(checksum(&[0x80, 0x80]), 0xFF00);
    }

    #[test]
    fn rejects_corrupted_checksum() {
        let token = AuthToken::generate(99).unwrap();
        let mut bytes = token.as_bytes().to_vec();
        bytes[0] ^= 0x01;
        let text = crate::base32::encode(&bytes);
        assert!(matches!(text.parse::<AuthToken>(), Err(AuthError::Checksum)));
    }

    #[test]
    fn rejects_wrong_length() {
        let text = crate::base32::encode(&[0u8; 10]);
        assert!(matches!(text.parse::<AuthToken>(), Err(AuthError::Length(10))));
    }

    #[test]
    fn rejects_non_base32_text() {
        assert!(matches!("UUUU-UUUU".parse::<AuthToken>(), Err(AuthError::Encoding(_))));
    }

    #[test]
    fn debug_output_hides_private_key() {
        let token = AuthToken::generate(5).unwrap();
        let debug = format!("{token:?}");
        assert!(debug.contains("serial: 5"));
        assert!(!debug.contains(&token.to_string()));
    }
}
