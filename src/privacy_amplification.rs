use ring::digest::{digest, SHA256};

use crate::bb84_states::bits_to_string;
use crate::errors::{ProtocolError, Result};

/// Hex characters in a full SHA-256 digest.
pub const FULL_DIGEST_HEX_LEN: usize = 64;

/// Compresses the reconciled key into a fixed-length secret.
///
/// The key is rendered as `0`/`1` characters, hashed once with SHA-256 and
/// hex encoded; the result is cut to `hex_len` characters.
pub fn derive_secret_key(corrected_key: &[bool], hex_len: usize) -> Result<String> {
    if hex_len == 0 || hex_len > FULL_DIGEST_HEX_LEN {
        return Err(ProtocolError::InvalidDigestLength(hex_len));
    }
    let canonical = bits_to_string(corrected_key);
    let mut secret_key = hex::encode(digest(&SHA256, canonical.as_bytes()));
    secret_key.truncate(hex_len);
    Ok(secret_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    #[test]
    fn test_matches_independent_sha256_of_bit_string() {
        for len in [1usize, 7, 8, 33, 256] {
            let key: Vec<bool> = (0..len).map(|i| (i * 7) % 5 < 2).collect();
            let canonical: String = key.iter().map(|&b| if b { '1' } else { '0' }).collect();
            let reference = hex::encode(Sha256::digest(canonical.as_bytes()));
            assert_eq!(derive_secret_key(&key, FULL_DIGEST_HEX_LEN).unwrap(), reference);
        }
    }

    #[test]
    fn test_known_digest_of_two_ones() {
        let key = derive_secret_key(&[true, true], FULL_DIGEST_HEX_LEN).unwrap();
        assert_eq!(
            key,
            "4fc82b26aecb47d2868c4efbe3581732a3e7cbcc6c2efb32062c08170a05eeb8"
        );
    }

    #[test]
    fn test_empty_key_hashes_empty_string() {
        let key = derive_secret_key(&[], FULL_DIGEST_HEX_LEN).unwrap();
        assert_eq!(
            key,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_deterministic() {
        let shared_key = vec![true, false, true, false, true, false, true, false];
        assert_eq!(
            derive_secret_key(&shared_key, 64).unwrap(),
            derive_secret_key(&shared_key, 64).unwrap()
        );
    }

    #[test]
    fn test_single_bit_difference_changes_digest() {
        let shared_key = vec![true, false, true, true];
        let mut other = shared_key.clone();
        other[2] = false;
        assert_eq!(
            derive_secret_key(&shared_key, 64).unwrap(),
            "3dd9c0995d54c0abd51a90f1d57b1ce77bc885fc8a7cea52dcad3c2540dda5ee"
        );
        assert_ne!(
            derive_secret_key(&shared_key, 64).unwrap(),
            derive_secret_key(&other, 64).unwrap()
        );
    }

    #[test]
    fn test_truncation() {
        let key = derive_secret_key(&[true, true], 16).unwrap();
        assert_eq!(key, "4fc82b26aecb47d2");
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_invalid_lengths() {
        assert_eq!(
            derive_secret_key(&[true], 0),
            Err(ProtocolError::InvalidDigestLength(0))
        );
        assert_eq!(
            derive_secret_key(&[true], 65),
            Err(ProtocolError::InvalidDigestLength(65))
        );
    }
}
