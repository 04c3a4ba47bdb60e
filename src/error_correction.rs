use crate::errors::{ensure_len, ProtocolError, Result};

pub const DEFAULT_BLOCK_SIZE: usize = 4;

/// Single-pass block parity reconciliation.
///
/// Both sifted strings are cut into consecutive blocks of `block_size` bits
/// (the last block may be shorter). Whenever a block's parity differs
/// between sender and receiver, the last bit of the receiver's block is
/// flipped. This only guarantees per-block parity agreement: an error
/// anywhere but the last position is moved rather than fixed, and an even
/// number of errors in one block goes unnoticed.
pub fn block_parity_correction(
    sender_bits: &[bool],
    receiver_bits: &[bool],
    block_size: usize,
) -> Result<Vec<bool>> {
    if block_size == 0 {
        return Err(ProtocolError::InvalidBlockSize(block_size));
    }
    ensure_len("receiver_sifted", sender_bits.len(), receiver_bits.len())?;

    let mut corrected_bits = Vec::with_capacity(receiver_bits.len());
    for (sender_block, receiver_block) in sender_bits
        .chunks(block_size)
        .zip(receiver_bits.chunks(block_size))
    {
        let mut block = receiver_block.to_vec();
        if calculate_parity(sender_block) != calculate_parity(&block) {
            if let Some(last) = block.last_mut() {
                *last = !*last;
            }
        }
        corrected_bits.extend(block);
    }

    Ok(corrected_bits)
}

/// Odd parity: `true` when the block holds an odd number of ones.
pub fn calculate_parity(bits: &[bool]) -> bool {
    bits.iter().filter(|&&bit| bit).count() % 2 == 1
}

/// Number of blocks whose parities disagree before correction.
pub fn mismatched_blocks(sender_bits: &[bool], receiver_bits: &[bool], block_size: usize) -> usize {
    if block_size == 0 {
        return 0;
    }
    sender_bits
        .chunks(block_size)
        .zip(receiver_bits.chunks(block_size))
        .filter(|(a, b)| calculate_parity(a) != calculate_parity(b))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bb84_states::bits_from_str;

    fn bits(s: &str) -> Vec<bool> {
        bits_from_str(s).unwrap()
    }

    #[test]
    fn test_no_error() {
        let sender_bits = bits("0101");
        let corrected = block_parity_correction(&sender_bits, &sender_bits, 4).unwrap();
        assert_eq!(corrected, sender_bits);
    }

    #[test]
    fn test_single_error_in_last_position_is_fixed() {
        let sender_bits = bits("10011010");
        let receiver_bits = bits("10011011");
        let corrected = block_parity_correction(&sender_bits, &receiver_bits, 4).unwrap();
        assert_eq!(corrected, sender_bits);
    }

    #[test]
    fn test_single_error_restores_block_parity() {
        let sender_bits = bits("1001");
        let receiver_bits = bits("1101");
        let corrected = block_parity_correction(&sender_bits, &receiver_bits, 4).unwrap();
        // The last bit is flipped even though the error sits at index 1.
        assert_eq!(corrected, bits("1100"));
        assert_eq!(calculate_parity(&corrected), calculate_parity(&sender_bits));
        assert_ne!(corrected, sender_bits);
    }

    #[test]
    fn test_two_errors_in_one_block_go_unnoticed() {
        let sender_bits = bits("1100");
        let receiver_bits = bits("0101");
        let corrected = block_parity_correction(&sender_bits, &receiver_bits, 4).unwrap();
        assert_eq!(corrected, receiver_bits);
    }

    #[test]
    fn test_all_bits_flipped() {
        let sender_bits = bits("111");
        let receiver_bits = bits("000");
        let corrected = block_parity_correction(&sender_bits, &receiver_bits, 4).unwrap();
        assert_eq!(corrected, bits("001"));
    }

    #[test]
    fn test_short_trailing_block() {
        let sender_bits = bits("000010");
        let receiver_bits = bits("000000");
        let corrected = block_parity_correction(&sender_bits, &receiver_bits, 4).unwrap();
        assert_eq!(corrected, bits("000001"));
        assert_eq!(corrected.len(), receiver_bits.len());
    }

    #[test]
    fn test_empty_input() {
        let corrected = block_parity_correction(&[], &[], 4).unwrap();
        assert!(corrected.is_empty());
    }

    #[test]
    fn test_zero_block_size_is_rejected() {
        assert_eq!(
            block_parity_correction(&[true], &[true], 0),
            Err(ProtocolError::InvalidBlockSize(0))
        );
    }

    #[test]
    fn test_unequal_lengths_are_rejected() {
        assert!(matches!(
            block_parity_correction(&[true, false], &[true], 4),
            Err(ProtocolError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_mismatched_blocks() {
        let sender_bits = bits("10011010");
        let receiver_bits = bits("00011011");
        assert_eq!(mismatched_blocks(&sender_bits, &receiver_bits, 4), 2);
        assert_eq!(mismatched_blocks(&sender_bits, &sender_bits, 4), 0);
    }
}
