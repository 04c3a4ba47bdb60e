//! Basis reconciliation: keep only the positions where sender and receiver
//! measured in the same basis.

use serde::{Deserialize, Serialize};

use crate::bb84_states::{Basis, BitSequence, Exchange};
use crate::errors::{ensure_len, Result};

/// Bits retained after the public basis comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiftedPair {
    pub sender_sifted: BitSequence,
    pub receiver_sifted: BitSequence,
    /// Original channel positions of the retained bits, ascending.
    pub retained_indices: Vec<usize>,
}

impl SiftedPair {
    pub fn len(&self) -> usize {
        self.retained_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retained_indices.is_empty()
    }
}

pub fn sift(
    sender_bits: &[bool],
    sender_bases: &[Basis],
    receiver_bits: &[bool],
    receiver_bases: &[Basis],
) -> Result<SiftedPair> {
    let n = sender_bits.len();
    ensure_len("sender_bases", n, sender_bases.len())?;
    ensure_len("receiver_bits", n, receiver_bits.len())?;
    ensure_len("receiver_bases", n, receiver_bases.len())?;

    let mut sifted = SiftedPair::default();
    for (i, (sender_basis, receiver_basis)) in sender_bases.iter().zip(receiver_bases).enumerate() {
        if sender_basis == receiver_basis {
            sifted.sender_sifted.push(sender_bits[i]);
            sifted.receiver_sifted.push(receiver_bits[i]);
            sifted.retained_indices.push(i);
        }
    }
    Ok(sifted)
}

impl Exchange {
    pub fn sift(&self) -> Result<SiftedPair> {
        sift(
            &self.sender_bits,
            &self.sender_bases,
            &self.receiver_bits,
            &self.receiver_bases,
        )
    }
}
