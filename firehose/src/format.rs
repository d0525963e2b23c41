//! Wire encoders for trace line fields.
//!
//! Each encoder is a thin `Display` wrapper so that values are written straight into the
//! printer's line buffer instead of going through intermediate `String`s. Binary values are
//! lowercase hex without `0x` prefix, empty/absent values are the [`SENTINEL`] character since
//! the protocol is whitespace delimited and an empty token would shift every following field.

use alloy_primitives::{Address, B256, U256};
use serde::Serialize;
use std::fmt;

/// Encoding of an empty byte string or an absent big integer
pub const SENTINEL: &str = ".";

const HEX_CHUNK: usize = 64;

/// Writes `bytes` as lowercase hex through a fixed stack buffer, avoiding any heap allocation
fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    let mut out = [0u8; HEX_CHUNK * 2];
    for chunk in bytes.chunks(HEX_CHUNK) {
        let encoded = &mut out[..chunk.len() * 2];
        hex::encode_to_slice(chunk, encoded).map_err(|_| fmt::Error)?;
        f.write_str(std::str::from_utf8(encoded).map_err(|_| fmt::Error)?)?;
    }
    Ok(())
}

/// Fixed width 20 bytes address
pub struct Addr<'a>(pub &'a Address);

impl fmt::Display for Addr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, self.0.as_slice())
    }
}

/// Optional address, absent encodes as [`SENTINEL`] (contract creation has no recipient)
pub struct MaybeAddr<'a>(pub Option<&'a Address>);

impl fmt::Display for MaybeAddr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(address) => write_hex(f, address.as_slice()),
            None => f.write_str(SENTINEL),
        }
    }
}

/// Fixed width 32 bytes hash
pub struct Hash<'a>(pub &'a B256);

impl fmt::Display for Hash<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, self.0.as_slice())
    }
}

/// Comma separated hashes (log topics), the empty list encodes as [`SENTINEL`]
pub struct HashList<'a>(pub &'a [B256]);

impl fmt::Display for HashList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str(SENTINEL);
        }

        for (i, hash) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write_hex(f, hash.as_slice())?;
        }
        Ok(())
    }
}

/// Variable length byte string, empty input encodes as [`SENTINEL`]
pub struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str(SENTINEL);
        }

        write_hex(f, self.0)
    }
}

/// Arbitrary precision integer encoded as the hex of its minimal big-endian representation.
///
/// `None` and zero both have an empty minimal representation and encode as [`SENTINEL`].
pub struct BigInt<'a>(pub Option<&'a U256>);

impl<'a> BigInt<'a> {
    pub fn some(value: &'a U256) -> Self {
        Self(Some(value))
    }
}

impl fmt::Display for BigInt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            None => f.write_str(SENTINEL),
            Some(value) => {
                let bytes = value.to_be_bytes::<32>();
                fmt::Display::fmt(&Hex(trimmed_be_bytes(&bytes)), f)
            }
        }
    }
}

/// Strips the leading zero bytes of a big-endian integer, zero yields the empty slice
pub fn trimmed_be_bytes(bytes: &[u8]) -> &[u8] {
    let first_non_zero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[first_non_zero..]
}

/// Unsigned integer in decimal
pub struct Uint(pub u64);

impl fmt::Display for Uint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Boolean as `true`/`false`
pub struct Bool(pub bool);

impl fmt::Display for Bool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0 { "true" } else { "false" })
    }
}

/// Canonical JSON of a composite value (headers, receipts logs), never used for inner loop events.
///
/// Panics when the value cannot be serialized, that is a bug in the caller's type, not a
/// condition the trace can recover from.
pub fn json<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_string(value) {
        Ok(out) => out,
        Err(err) => panic!("Firehose unable to serialize value to JSON: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256};

    #[test]
    fn test_addr_and_hash() {
        let addr = address!("00000000000000000000000000000000000000ab");
        assert_eq!(Addr(&addr).to_string(), "00000000000000000000000000000000000000ab");

        let hash = b256!("0102030405060708091011121314151617181920212223242526272829303132");
        assert_eq!(
            Hash(&hash).to_string(),
            "0102030405060708091011121314151617181920212223242526272829303132"
        );
    }

    #[test]
    fn test_maybe_addr() {
        let addr = Address::repeat_byte(0x11);
        assert_eq!(MaybeAddr(Some(&addr)).to_string(), "11".repeat(20));
        assert_eq!(MaybeAddr(None).to_string(), ".");
    }

    #[test]
    fn test_hash_list() {
        assert_eq!(HashList(&[]).to_string(), ".");

        let topics = [B256::repeat_byte(0x01), B256::repeat_byte(0x02)];
        assert_eq!(
            HashList(&topics).to_string(),
            format!("{},{}", "01".repeat(32), "02".repeat(32))
        );
    }

    #[test]
    fn test_hex_sentinel() {
        assert_eq!(Hex(&[]).to_string(), ".");
        assert_eq!(Hex(&[0x00]).to_string(), "00");
        assert_eq!(Hex(&[0xde, 0xad, 0xbe, 0xef]).to_string(), "deadbeef");
    }

    #[test]
    fn test_hex_longer_than_chunk() {
        let data: Vec<u8> = (0..=255u8).collect();
        assert_eq!(Hex(&data).to_string(), hex::encode(&data));

        let decoded = hex::decode(Hex(&data).to_string()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_big_int() {
        assert_eq!(BigInt(None).to_string(), ".");
        assert_eq!(BigInt::some(&U256::ZERO).to_string(), ".");
        assert_eq!(BigInt::some(&U256::from(255u64)).to_string(), "ff");
        assert_eq!(BigInt::some(&U256::from(1000u64)).to_string(), "03e8");
        assert_eq!(BigInt::some(&U256::from(0x1234_5678_u64)).to_string(), "12345678");
        assert_eq!(BigInt::some(&U256::MAX).to_string(), "ff".repeat(32));
    }

    #[test]
    fn test_sentinel_never_collides_with_hex() {
        // Real hex output always has an even, non-zero number of hex digits
        for value in [U256::from(1u64), U256::from(16u64), U256::MAX] {
            let out = BigInt::some(&value).to_string();
            assert_ne!(out, SENTINEL);
            assert_eq!(out.len() % 2, 0);
            assert!(out.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_trimmed_be_bytes() {
        assert_eq!(trimmed_be_bytes(&[0, 0, 1, 0]), &[1, 0]);
        assert!(trimmed_be_bytes(&[0, 0]).is_empty());
        assert!(trimmed_be_bytes(&[]).is_empty());
    }

    #[test]
    fn test_uint_and_bool() {
        assert_eq!(Uint(0).to_string(), "0");
        assert_eq!(Uint(u64::MAX).to_string(), "18446744073709551615");
        assert_eq!(Bool(true).to_string(), "true");
        assert_eq!(Bool(false).to_string(), "false");
    }

    #[test]
    fn test_json() {
        let value = serde_json::json!({"number": 1, "hash": "0xab"});
        assert_eq!(json(&value), r#"{"hash":"0xab","number":1}"#);
    }
}
