//! Quantum bit error rate estimation over a sifted pair.

use serde::{Deserialize, Serialize};

use crate::sifting::SiftedPair;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QberReport {
    pub matched_count: usize,
    pub mismatch_count: usize,
    /// Full precision; only `qber_display` rounds.
    pub qber_percent: f64,
    pub loss_fraction: f64,
}

impl QberReport {
    /// Fraction of sifted bits on which both sides agree. Defined as 0.0
    /// for an empty sifted set.
    pub fn fidelity(&self) -> f64 {
        if self.matched_count == 0 {
            return 0.0;
        }
        let agreeing = self.matched_count - self.mismatch_count;
        agreeing as f64 / self.matched_count as f64
    }

    /// Fraction of sifted bits that disagree (`1 - fidelity`), or 1.0 when
    /// nothing survived sifting. Computed from the counts so that it agrees
    /// exactly with `qber_percent`.
    pub fn loss(&self) -> f64 {
        if self.matched_count == 0 {
            return 1.0;
        }
        self.mismatch_count as f64 / self.matched_count as f64
    }

    pub fn qber_display(&self) -> f64 {
        (self.qber_percent * 100.0).round() / 100.0
    }
}

pub fn estimate(sifted: &SiftedPair) -> QberReport {
    let matched_count = sifted.sender_sifted.len();
    let mismatch_count = sifted
        .sender_sifted
        .iter()
        .zip(&sifted.receiver_sifted)
        .filter(|(a, b)| a != b)
        .count();

    // Scale before dividing: one rounding step, so 3 of 20 is exactly 15.0.
    let (qber_percent, loss_fraction) = if matched_count > 0 {
        let n = matched_count as f64;
        ((100 * mismatch_count) as f64 / n, mismatch_count as f64 / n)
    } else {
        (0.0, 0.0)
    };

    QberReport {
        matched_count,
        mismatch_count,
        qber_percent,
        loss_fraction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(sender: Vec<bool>, receiver: Vec<bool>) -> SiftedPair {
        let retained_indices = (0..sender.len()).collect();
        SiftedPair {
            sender_sifted: sender,
            receiver_sifted: receiver,
            retained_indices,
        }
    }

    #[test]
    fn test_identical_keys_have_zero_qber() {
        let report = estimate(&pair(vec![true, false, true], vec![true, false, true]));
        assert_eq!(report.matched_count, 3);
        assert_eq!(report.mismatch_count, 0);
        assert_eq!(report.qber_percent, 0.0);
        assert_eq!(report.fidelity(), 1.0);
        assert_eq!(report.loss(), 0.0);
    }

    #[test]
    fn test_fully_disagreeing_keys() {
        let report = estimate(&pair(vec![true, false], vec![false, true]));
        assert_eq!(report.qber_percent, 100.0);
        assert_eq!(report.loss_fraction, 1.0);
        assert_eq!(report.fidelity(), 0.0);
    }

    #[test]
    fn test_empty_sifted_set() {
        let report = estimate(&SiftedPair::default());
        assert_eq!(report.qber_percent, 0.0);
        assert!(!report.qber_percent.is_nan());
        assert_eq!(report.fidelity(), 0.0);
        assert_eq!(report.loss(), 1.0);
    }

    #[test]
    fn test_precision_is_kept_for_comparisons() {
        let mut receiver = vec![false; 9];
        receiver[0] = true;
        let report = estimate(&pair(vec![false; 9], receiver));
        assert!(report.qber_percent > 11.11 && report.qber_percent < 11.12);
        assert_eq!(report.qber_display(), 11.11);
        assert_ne!(report.qber_percent, report.qber_display());
    }

    #[test]
    fn test_boundary_counts_are_exact() {
        let mut receiver = vec![false; 20];
        receiver[..3].fill(true);
        let report = estimate(&pair(vec![false; 20], receiver));
        assert_eq!(report.qber_percent, 15.0);
        assert_eq!(report.loss() * 100.0, 15.0);

        let mut receiver = vec![false; 100];
        receiver[..11].fill(true);
        let report = estimate(&pair(vec![false; 100], receiver));
        assert_eq!(report.qber_percent, 11.0);
    }
}
