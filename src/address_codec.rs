//! HASH160 and base58check, carried over from `address.rs::hash_address`
//! (SHA256 then RIPEMD160, version byte + 4-byte double-SHA256 checksum).

use ripemd160::{Digest as RipemdDigest, Ripemd160};
use sha2::{Digest, Sha256};

use crate::errors::{IndexerError, Result};

pub fn hash160(data: &[u8]) -> Vec<u8> {
    let sha = Sha256::digest(data);
    Ripemd160::digest(&sha).to_vec()
}

fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(&first);
    second.into()
}

/// Encode a raw 20-byte payload plus its version byte as a base58check
/// address string (§4.3, §11 `Address.hash_str`).
pub fn encode_base58check(payload: &[u8], version: u8) -> String {
    let mut extended = Vec::with_capacity(1 + payload.len() + 4);
    extended.push(version);
    extended.extend_from_slice(payload);
    let checksum = sha256d(&extended);
    extended.extend_from_slice(&checksum[0..4]);
    bs58::encode(extended).into_string()
}

/// Decode a base58check address string back into `(payload, version)`.
/// Used by the read-side address search (§11): the store indexes on raw
/// `hash`/`version`, not the display string, so a lookup-by-string must
/// decode first.
pub fn decode_base58check(encoded: &str) -> Result<(Vec<u8>, u8)> {
    let raw = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| IndexerError::Decode(format!("invalid base58: {e}")))?;
    if raw.len() < 5 {
        return Err(IndexerError::Decode("base58check payload too short".to_string()));
    }
    let (body, checksum) = raw.split_at(raw.len() - 4);
    let expected = sha256d(body);
    if &expected[0..4] != checksum {
        return Err(IndexerError::Decode("base58check checksum mismatch".to_string()));
    }
    let version = body[0];
    let payload = body[1..].to_vec();
    Ok((payload, version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_and_decode() {
        let payload = vec![0x11; 20];
        let encoded = encode_base58check(&payload, 30);
        let (decoded_payload, decoded_version) = decode_base58check(&encoded).unwrap();
        assert_eq!(decoded_payload, payload);
        assert_eq!(decoded_version, 30);
    }

    #[test]
    fn rejects_a_flipped_checksum_byte() {
        let payload = vec![0x22; 20];
        let mut encoded = encode_base58check(&payload, 13).into_bytes();
        let last = encoded.len() - 1;
        encoded[last] = encoded[last].wrapping_add(1);
        let encoded = String::from_utf8(encoded).unwrap();
        assert!(decode_base58check(&encoded).is_err());
    }

    #[test]
    fn hash160_is_twenty_bytes() {
        assert_eq!(hash160(b"anything").len(), 20);
    }
}
