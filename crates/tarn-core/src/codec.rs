//! Base58check encoding and the canonical fixed-layout byte encoding used for
//! proof-of-work preimages, transaction ids, and on-disk block storage.
//!
//! The canonical encoding is hand-rolled rather than delegated to a generic
//! serializer: the proof-of-work preimage and the transaction id hash are
//! defined over an exact byte layout, so the layout has to be nailed down
//! field-by-field instead of left to a derive macro's discretion.

use crate::constants::BASE58_ALPHABET;
use crate::error::CodecError;

/// Encodes `input` as base58, preserving one leading alphabet-zero per
/// leading `0x00` byte in `input` (mirrors the reference base256-to-base58
/// conversion: treat both quantities as big-endian integers).
pub fn base58_encode(input: &[u8]) -> String {
    let mut digits: Vec<u8> = vec![0];

    for &byte in input {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            carry += (*digit as u32) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }

    let mut result: Vec<u8> = input
        .iter()
        .take_while(|&&b| b == 0x00)
        .map(|_| BASE58_ALPHABET[0])
        .collect();

    result.extend(digits.iter().rev().map(|&d| BASE58_ALPHABET[d as usize]));
    String::from_utf8(result).expect("base58 alphabet is ASCII")
}

/// Decodes a base58 string produced by [`base58_encode`].
pub fn base58_decode(input: &str) -> Vec<u8> {
    let leading_zeros = input
        .bytes()
        .take_while(|&b| b == BASE58_ALPHABET[0])
        .count();

    let mut bytes: Vec<u8> = vec![0];
    for ch in input.bytes() {
        let Some(value) = BASE58_ALPHABET.iter().position(|&a| a == ch) else {
            continue;
        };
        let mut carry = value as u32;
        for byte in bytes.iter_mut() {
            carry += (*byte as u32) * 58;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }

    let mut decoded: Vec<u8> = bytes.into_iter().rev().skip_while(|&b| b == 0).collect();
    let mut result = vec![0u8; leading_zeros];
    result.append(&mut decoded);
    result
}

/// Appends a checksum (first 4 bytes of `sha256(sha256(payload))`) and
/// base58-encodes the result.
pub fn base58check_encode(payload: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let first = Sha256::digest(payload);
    let second = Sha256::digest(first);
    let mut full = payload.to_vec();
    full.extend_from_slice(&second[..4]);
    base58_encode(&full)
}

/// Decodes a base58check string, verifying and stripping its checksum.
pub fn base58check_decode(input: &str) -> Result<Vec<u8>, CodecError> {
    use sha2::{Digest, Sha256};
    let full = base58_decode(input);
    if full.len() < 4 {
        return Err(CodecError::PayloadTooShort);
    }
    let (payload, checksum) = full.split_at(full.len() - 4);
    let first = Sha256::digest(payload);
    let second = Sha256::digest(first);
    if &second[..4] != checksum {
        return Err(CodecError::BadChecksum);
    }
    Ok(payload.to_vec())
}

/// Append-only byte buffer with the handful of primitives the canonical
/// encoding needs.
#[derive(Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u64_le(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i64_le(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Writes `bytes` prefixed with its length as a little-endian `u32`.
    pub fn write_bytes_lp(&mut self, bytes: &[u8]) {
        self.buf
            .extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(bytes);
    }

    /// Writes `bytes` with no length prefix; used only where the field
    /// length is already fixed by the format (e.g. a 32-byte hash).
    pub fn write_fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes an ASCII decimal representation of `v`, matching the source
    /// tool's `Itobytes` used inside the proof-of-work preimage.
    pub fn write_ascii_int(&mut self, v: i64) {
        self.buf.extend_from_slice(v.to_string().as_bytes());
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

/// Cursor over a byte slice matching [`ByteWriter`]'s primitives.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8, CodecError> {
        let b = *self.buf.get(self.pos).ok_or(CodecError::Truncated(field))?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_u64_le(&mut self, field: &'static str) -> Result<u64, CodecError> {
        let bytes = self.take(8, field)?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_i64_le(&mut self, field: &'static str) -> Result<i64, CodecError> {
        let bytes = self.take(8, field)?;
        Ok(i64::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_bytes_lp(&mut self, field: &'static str) -> Result<Vec<u8>, CodecError> {
        let len = self.read_u64_le_as_u32(field)?;
        Ok(self.take(len as usize, field)?.to_vec())
    }

    fn read_u64_le_as_u32(&mut self, field: &'static str) -> Result<u32, CodecError> {
        let bytes = self.take(4, field)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_fixed(&mut self, len: usize, field: &'static str) -> Result<Vec<u8>, CodecError> {
        Ok(self.take(len, field)?.to_vec())
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(n).ok_or(CodecError::Truncated(field))?;
        let slice = self.buf.get(self.pos..end).ok_or(CodecError::Truncated(field))?;
        self.pos = end;
        Ok(slice)
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base58_round_trips_arbitrary_bytes() {
        let input = b"hello tarn".to_vec();
        let encoded = base58_encode(&input);
        assert_eq!(base58_decode(&encoded), input);
    }

    #[test]
    fn base58_preserves_leading_zero_bytes() {
        let input = vec![0x00, 0x00, 0x01, 0x02];
        let encoded = base58_encode(&input);
        assert!(encoded.starts_with('1'));
        assert_eq!(base58_decode(&encoded), input);
    }

    #[test]
    fn base58_empty_input_round_trips() {
        let encoded = base58_encode(&[]);
        assert_eq!(base58_decode(&encoded), Vec::<u8>::new());
    }

    #[test]
    fn base58check_round_trips() {
        let payload = vec![0x00, 1, 2, 3, 4, 5];
        let encoded = base58check_encode(&payload);
        let decoded = base58check_decode(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn base58check_rejects_flipped_checksum_byte() {
        let payload = vec![0x00, 1, 2, 3, 4, 5];
        let mut encoded = base58_decode(&base58check_encode(&payload));
        let last = encoded.len() - 1;
        encoded[last] ^= 0xff;
        let tampered = base58_encode(&encoded);
        assert!(base58check_decode(&tampered).is_err());
    }

    #[test]
    fn byte_writer_reader_round_trip_lp_bytes() {
        let mut w = ByteWriter::new();
        w.write_bytes_lp(b"abc");
        w.write_u64_le(42);
        w.write_ascii_int(-7);
        let bytes = w.into_bytes();

        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_bytes_lp("x").unwrap(), b"abc");
        assert_eq!(r.read_u64_le("y").unwrap(), 42);
    }

    #[test]
    fn byte_reader_truncated_buffer_errors() {
        let mut r = ByteReader::new(&[1, 2]);
        assert!(r.read_u64_le("z").is_err());
    }
}
