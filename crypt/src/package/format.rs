//! On-disk container layout.
//!
//! ```text
//! magic       4 bytes   "ICP0"
//! key_len     u32 LE
//! public_key  key_len bytes
//! nonce       12 bytes
//! body_len    u64 LE
//! body        ChaCha20-Poly1305 ciphertext with tag
//! ```
//!
//! Everything before the nonce is authenticated as associated data.

use std::io::{self, Read, Write};

use crate::crypto::cipher::NONCE_SIZE;

use super::PackageError;

pub const MAGIC: u32 = 0x3050_4349; // ICP0
const MAX_KEY_LEN: u32 = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub public_key: Vec<u8>,
    pub nonce: [u8; NONCE_SIZE],
    pub body: Vec<u8>,
}

/// Header bytes covered by the body's authentication tag.
pub fn header(public_key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + public_key.len());
    out.extend_from_slice(&MAGIC.to_le_bytes());
    out.extend_from_slice(&(public_key.len() as u32).to_le_bytes());
    out.extend_from_slice(public_key);
    out
}

fn read_err(e: io::Error) -> PackageError {
    PackageError::Read(format!("{e}"))
}

impl Container {
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&header(&self.public_key))?;
        out.write_all(&self.nonce)?;
        out.write_all(&(self.body.len() as u64).to_le_bytes())?;
        out.write_all(&self.body)?;
        out.flush()
    }

    pub fn read_from<R: Read>(input: &mut R) -> Result<Self, PackageError> {
        let mut word = [0u8; 4];
        input.read_exact(&mut word).map_err(read_err)?;
        if u32::from_le_bytes(word) != MAGIC {
            return Err(PackageError::InvalidFormat);
        }

        input.read_exact(&mut word).map_err(read_err)?;
        let key_len = u32::from_le_bytes(word);
        if key_len > MAX_KEY_LEN {
            return Err(PackageError::InvalidFormat);
        }
        let mut public_key = vec![0u8; key_len as usize];
        input.read_exact(&mut public_key).map_err(read_err)?;

        let mut nonce = [0u8; NONCE_SIZE];
        input.read_exact(&mut nonce).map_err(read_err)?;

        let mut len = [0u8; 8];
        input.read_exact(&mut len).map_err(read_err)?;
        let body_len = u64::from_le_bytes(len);

        // read through `take` so a corrupt length cannot force a huge allocation
        let mut body = Vec::new();
        input.take(body_len).read_to_end(&mut body).map_err(read_err)?;
        if body.len() as u64 != body_len {
            return Err(PackageError::Read(format!(
                "body truncated: expected {body_len} bytes, found {}",
                body.len()
            )));
        }

        Ok(Self { public_key, nonce, body })
    }
}

#[cfg(test)]
mod tests {
    use super::{header, Container, MAGIC};
    use crate::package::PackageError;

    fn sample() -> Container {
        Container {
            public_key: vec![0xD2, 0x04, 0x11, 0x22],
            nonce: [7u8; 12],
            body: b"opaque body with tag".to_vec(),
        }
    }

    #[test]
    fn magic_spells_icp0() {
        assert_eq!(&MAGIC.to_le_bytes(), b"ICP0");
        assert_eq!(&header(&[1, 2])[..4], b"ICP0");
    }

    #[test]
    fn writes_and_reads_back() {
        let mut bytes = Vec::new();
        sample().write_to(&mut bytes).unwrap();
        let parsed = Container::read_from(&mut bytes.as_slice()).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn rejects_foreign_magic() {
        let mut bytes = Vec::new();
        sample().write_to(&mut bytes).unwrap();
        bytes[3] = b'1';
        let err = Container::read_from(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, PackageError::InvalidFormat));
    }

    #[test]
    fn reports_truncated_body() {
        let mut bytes = Vec::new();
        sample().write_to(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 3);
        let err = Container::read_from(&mut bytes.as_slice()).unwrap_err();
        assert!(err.to_string().starts_with("package read error"));
    }

    #[test]
    fn reports_empty_input_as_read_error() {
        let mut empty: &[u8] = &[];
        let err = Container::read_from(&mut empty).unwrap_err();
        assert!(matches!(err, PackageError::Read(_)));
    }
}
