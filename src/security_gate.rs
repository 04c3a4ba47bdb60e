use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};
use crate::qber::QberReport;

/// Default QBER threshold for the eavesdropping-aware run.
pub const DEFAULT_QBER_THRESHOLD: f64 = 11.0;
/// Loss threshold used by the intercept-resend run.
pub const DEFAULT_LOSS_THRESHOLD: f64 = 15.0;

/// Which statistic the gate compares against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMetric {
    /// `qber_percent`; an empty sifted set reads as 0% and passes.
    Qber,
    /// Disagreeing share of the sifted bits, in percent; an empty sifted set
    /// reads as 100% and aborts.
    Loss,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SecurityGate {
    pub metric: GateMetric,
    pub threshold_percent: f64,
}

impl SecurityGate {
    pub fn qber(threshold_percent: f64) -> Self {
        Self {
            metric: GateMetric::Qber,
            threshold_percent,
        }
    }

    pub fn loss(threshold_percent: f64) -> Self {
        Self {
            metric: GateMetric::Loss,
            threshold_percent,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let t = self.threshold_percent;
        if !t.is_finite() || !(0.0..=100.0).contains(&t) {
            return Err(ProtocolError::InvalidThreshold(t));
        }
        Ok(())
    }

    /// The percentage this gate looks at, at full precision.
    pub fn observed_percent(&self, report: &QberReport) -> f64 {
        match self.metric {
            GateMetric::Qber => report.qber_percent,
            GateMetric::Loss if report.matched_count == 0 => 100.0,
            GateMetric::Loss => report.qber_percent,
        }
    }

    pub fn evaluate(&self, report: &QberReport) -> Option<String> {
        should_abort(self.observed_percent(report), self.threshold_percent)
    }
}

impl Default for SecurityGate {
    fn default() -> Self {
        Self::qber(DEFAULT_QBER_THRESHOLD)
    }
}

/// Returns an abort reason iff `observed_percent` is strictly above the
/// threshold.
pub fn should_abort(observed_percent: f64, threshold_percent: f64) -> Option<String> {
    if observed_percent > threshold_percent {
        Some(format!(
            "Error too high! Key generation aborted ({:.2}% > {:.2}% threshold).",
            observed_percent, threshold_percent
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_is_exclusive() {
        assert_eq!(should_abort(11.0, 11.0), None);
        assert!(should_abort(11.000001, 11.0).is_some());
        assert_eq!(should_abort(0.0, 11.0), None);
    }

    #[test]
    fn test_reason_is_human_readable() {
        let reason = should_abort(25.0, 15.0).unwrap();
        assert!(reason.starts_with("Error too high!"));
        assert!(reason.contains("25.00%"));
    }

    #[test]
    fn test_empty_sifted_set_per_metric() {
        let empty = QberReport::default();
        assert_eq!(SecurityGate::qber(11.0).evaluate(&empty), None);
        assert!(SecurityGate::loss(15.0).evaluate(&empty).is_some());
    }

    #[test]
    fn test_loss_metric_reads_disagreement() {
        let report = QberReport {
            matched_count: 10,
            mismatch_count: 2,
            qber_percent: 20.0,
            loss_fraction: 0.2,
        };
        let gate = SecurityGate::loss(15.0);
        assert!((gate.observed_percent(&report) - 20.0).abs() < 1e-9);
        assert!(gate.evaluate(&report).is_some());
        assert_eq!(SecurityGate::qber(25.0).evaluate(&report), None);
    }

    #[test]
    fn test_loss_exactly_at_threshold_passes() {
        let report = QberReport {
            matched_count: 20,
            mismatch_count: 3,
            qber_percent: 15.0,
            loss_fraction: 0.15,
        };
        assert_eq!(SecurityGate::loss(15.0).observed_percent(&report), 15.0);
        assert_eq!(SecurityGate::loss(15.0).evaluate(&report), None);
    }

    #[test]
    fn test_threshold_validation() {
        assert!(SecurityGate::qber(11.0).validate().is_ok());
        assert_eq!(
            SecurityGate::qber(-1.0).validate(),
            Err(ProtocolError::InvalidThreshold(-1.0))
        );
        assert!(SecurityGate::loss(f64::NAN).validate().is_err());
    }
}
