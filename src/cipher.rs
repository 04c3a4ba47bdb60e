//! XOR stream cipher keyed directly by shared key bits.
//!
//! Plaintext bytes are expanded most-significant-bit first and XORed with
//! the key bits repeated out to the message length. Keys shorter than
//! [`MIN_KEY_BITS`] are refused and produce empty output.

use serde::{Deserialize, Serialize};

/// Shortest key the cipher will use.
pub const MIN_KEY_BITS: usize = 8;

/// Reported in place of the plaintext when the recovered bytes are not UTF-8.
pub const DECRYPTION_FAILED: &str = "<decryption failed>";

pub fn has_sufficient_key(key_bits: &[bool]) -> bool {
    key_bits.len() >= MIN_KEY_BITS
}

fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|&byte| (0..8).map(move |i| byte & (0x80 >> i) != 0))
        .collect()
}

fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            // A short final chunk is left-aligned, zero padded.
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, &bit)| acc | ((bit as u8) << (7 - i)))
        })
        .collect()
}

/// Key bits cycled and cut to exactly `len` bits.
fn keystream(key_bits: &[bool], len: usize) -> impl Iterator<Item = bool> + '_ {
    key_bits.iter().copied().cycle().take(len)
}

fn apply_keystream(data: &[u8], key_bits: &[bool]) -> Vec<u8> {
    if !has_sufficient_key(key_bits) {
        return Vec::new();
    }
    let data_bits = bytes_to_bits(data);
    let mixed: Vec<bool> = data_bits
        .iter()
        .zip(keystream(key_bits, data_bits.len()))
        .map(|(&m, k)| m ^ k)
        .collect();
    bits_to_bytes(&mixed)
}

pub fn encrypt(plaintext: &[u8], key_bits: &[bool]) -> Vec<u8> {
    apply_keystream(plaintext, key_bits)
}

pub fn decrypt(ciphertext: &[u8], key_bits: &[bool]) -> Vec<u8> {
    apply_keystream(ciphertext, key_bits)
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CipherResult {
    pub original_message: String,
    #[serde(skip)]
    pub ciphertext: Vec<u8>,
    #[serde(skip)]
    pub plaintext_recovered: Vec<u8>,
    pub encrypted_message_hex: String,
    pub decrypted_message: String,
    pub success: bool,
}

/// Encrypts `message` on the sender side and decrypts it on the receiver
/// side, each with its own copy of the key.
pub fn run_cipher(message: &str, sender_key: &[bool], receiver_key: &[bool]) -> CipherResult {
    if !has_sufficient_key(sender_key) {
        return CipherResult {
            original_message: message.to_owned(),
            ..CipherResult::default()
        };
    }

    let ciphertext = encrypt(message.as_bytes(), sender_key);
    let plaintext_recovered = decrypt(&ciphertext, receiver_key);
    let decrypted_message = if has_sufficient_key(receiver_key) {
        match String::from_utf8(plaintext_recovered.clone()) {
            Ok(text) => text,
            Err(_) => DECRYPTION_FAILED.to_owned(),
        }
    } else {
        String::new()
    };

    CipherResult {
        original_message: message.to_owned(),
        encrypted_message_hex: hex::encode(&ciphertext),
        success: decrypted_message == message,
        ciphertext,
        plaintext_recovered,
        decrypted_message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bb84_states::bits_from_str;

    #[test]
    fn test_round_trip() {
        let key = bits_from_str("10110010").unwrap();
        let message = "QKD demo";
        let ciphertext = encrypt(message.as_bytes(), &key);
        assert_eq!(ciphertext.len(), message.len());
        assert_ne!(ciphertext, message.as_bytes());
        assert_eq!(decrypt(&ciphertext, &key), message.as_bytes());
    }

    #[test]
    fn test_round_trip_key_not_multiple_of_eight() {
        let key = bits_from_str("1101001110111").unwrap();
        for message in ["", "a", "hello, world", "ünïcødé ✓"] {
            let ciphertext = encrypt(message.as_bytes(), &key);
            assert_eq!(decrypt(&ciphertext, &key), message.as_bytes());
        }
    }

    #[test]
    fn test_key_longer_than_message_is_truncated() {
        let mut key = bits_from_str("11111111").unwrap();
        key.extend(bits_from_str("00000000").unwrap());
        assert_eq!(encrypt(&[0x00], &key), vec![0xff]);
    }

    #[test]
    fn test_msb_first_expansion() {
        let key = bits_from_str("10000000").unwrap();
        assert_eq!(encrypt(&[0x00, 0x01], &key), vec![0x80, 0x81]);
    }

    #[test]
    fn test_short_key_yields_empty_output() {
        let key = bits_from_str("1011001").unwrap();
        assert!(encrypt(b"QKD demo", &key).is_empty());
        assert!(decrypt(b"QKD demo", &key).is_empty());
        assert!(encrypt(b"QKD demo", &[]).is_empty());
    }

    #[test]
    fn test_run_cipher_with_matching_keys() {
        let key = bits_from_str("0110100111").unwrap();
        let result = run_cipher("QKD demo", &key, &key);
        assert!(result.success);
        assert_eq!(result.decrypted_message, "QKD demo");
        assert_eq!(result.encrypted_message_hex, hex::encode(&result.ciphertext));
    }

    #[test]
    fn test_run_cipher_with_insufficient_key() {
        let key = bits_from_str("0110").unwrap();
        let result = run_cipher("QKD demo", &key, &key);
        assert!(!result.success);
        assert_eq!(result.original_message, "QKD demo");
        assert!(result.encrypted_message_hex.is_empty());
        assert!(result.decrypted_message.is_empty());
    }

    #[test]
    fn test_mismatched_receiver_key_reports_sentinel() {
        let sender_key = bits_from_str("00000000").unwrap();
        // Setting the top bit of every ASCII byte is never valid UTF-8 here.
        let receiver_key = bits_from_str("10000000").unwrap();
        let result = run_cipher("QKD demo", &sender_key, &receiver_key);
        assert!(!result.success);
        assert_eq!(result.decrypted_message, DECRYPTION_FAILED);
    }
}
