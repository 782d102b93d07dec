//! Douglas Crockford's Base32 alphabet, used for human-typable auth tokens.
//! Blocks of 5 bytes map to 8 digits; a short final block is padded with `=`.

use thiserror::Error;

const DIGITS: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const PAD: u8 = b'=';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Base32Error {
    #[error("invalid crockford base32 digit: {0}")]
    InvalidDigit(char),
    #[error("invalid padding")]
    InvalidPadding,
}

fn digit(value: u8) -> u8 {
    DIGITS[usize::from(value & 0x1F)]
}

fn number(digit: u8) -> Result<u8, Base32Error> {
    let value = match digit.to_ascii_uppercase() {
        b'0' | b'O' => 0,
        b'1' | b'I' | b'L' => 1,
        d @ b'2'..=b'9' => d - b'0',
        d @ b'A'..=b'H' => d - b'A' + 10,
        b'J' => 18,
        b'K' => 19,
        b'M' => 20,
        b'N' => 21,
        b'P' => 22,
        b'Q' => 23,
        b'R' => 24,
        b'S' => 25,
        b'T' => 26,
        b'V' => 27,
        b'W' => 28,
        b'X' => 29,
        b'Y' => 30,
        b'Z' => 31,
        PAD => 0,
        _ => return Err(Base32Error::InvalidDigit(char::from(digit))),
    };
    Ok(value)
}

fn encode_block(input: &[u8; 5], out: &mut Vec<u8>) {
    out.extend_from_slice(&[
        digit(input[0] >> 3),
        digit((input[0] & 0x07) << 2 | input[1] >> 6),
        digit((input[1] & 0x3E) >> 1),
        digit((input[1] & 0x01) << 4 | input[2] >> 4),
        digit((input[2] & 0x0F) << 1 | input[3] >> 7),
        digit((input[3] & 0x7C) >> 2),
        digit((input[3] & 0x03) << 3 | input[4] >> 5),
        digit(input[4] & 0x1F),
    ]);
}

fn decode_block(input: &[u8]) -> Result<[u8; 5], Base32Error> {
    let mut n = [0u8; 8];
    for (slot, &d) in n.iter_mut().zip(input) {
        *slot = number(d)?;
    }
    Ok([
        n[0] << 3 | n[1] >> 2,
        (n[1] & 0x03) << 6 | n[2] << 1 | n[3] >> 4,
        (n[3] & 0x0F) << 4 | n[4] >> 1,
        (n[4] & 0x01) << 7 | n[5] << 2 | n[6] >> 3,
        (n[6] & 0x07) << 5 | n[7],
    ])
}

/// Encodes bytes as padded Crockford Base32.
pub fn encode(data: &[u8]) -> String {
    let mut out = Vec::with_capacity(data.len().div_ceil(5) * 8);
    let mut chunks = data.chunks_exact(5);
    for chunk in chunks.by_ref() {
        let mut block = [0u8; 5];
        block.copy_from_slice(chunk);
        encode_block(&block, &mut out);
    }

    let rest = chunks.remainder();
    if !rest.is_empty() {
        let mut block = [0u8; 5];
        block[..rest.len()].copy_from_slice(rest);
        encode_block(&block, &mut out);
        let pads = (5 - rest.len()) * 8 / 5;
        let len = out.len();
        out[len - pads..].fill(PAD);
    }

    // every byte pushed above comes from DIGITS or PAD
    out.into_iter().map(char::from).collect()
}

/// Number of data bytes carried by the final block, keyed by its pad count.
fn final_block_len(text: &[u8]) -> Result<usize, Base32Error> {
    if text.len() % 8 != 0 {
        return Err(Base32Error::InvalidPadding);
    }
    let pads = text.iter().rev().take_while(|&&b| b == PAD).count();
    // padding may only be a trailing run inside the final block
    if pads >= 8 || text[..text.len() - pads].contains(&PAD) {
        return Err(Base32Error::InvalidPadding);
    }
    match pads {
        0 => Ok(5),
        1 => Ok(4),
        3 => Ok(3),
        4 => Ok(2),
        6 => Ok(1),
        _ => Err(Base32Error::InvalidPadding),
    }
}

/// Decodes padded Crockford Base32. Case-insensitive; `O` reads as zero and
/// `I`/`L` read as one.
pub fn decode(text: &str) -> Result<Vec<u8>, Base32Error> {
    let text = text.as_bytes();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let last_len = final_block_len(text)?;
    let mut out = Vec::with_capacity(text.len() / 8 * 5);
    for block in text.chunks_exact(8) {
        out.extend_from_slice(&decode_block(block)?);
    }
    out.truncate(out.len() - (5 - last_len));
    Ok(out)
}
