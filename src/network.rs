//! Trusted-node relay model for one sender and several receivers.
//!
//! A long link is split into hops of at most `link_length_km`; every hop
//! runs its own exchange and a trusted node relays the key. The figures
//! here are closed-form estimates, rounded to two decimals at every
//! stage, not a simulation of the hops.

use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Hardware figures shared by every hop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkParameters {
    pub detector_efficiency_percent: f64,
    pub dark_count_probability: f64,
    pub misalignment_percent: f64,
}

impl Default for LinkParameters {
    fn default() -> Self {
        Self {
            detector_efficiency_percent: 90.0,
            dark_count_probability: 0.001,
            misalignment_percent: 2.0,
        }
    }
}

impl LinkParameters {
    pub fn validate(&self) -> Result<()> {
        check_range("detector efficiency", self.detector_efficiency_percent, 100.0)?;
        check_range("dark count probability", self.dark_count_probability, 1.0)?;
        check_range("misalignment", self.misalignment_percent, 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub link_length_km: f64,
    pub session_key_bits: usize,
    pub relay_latency_ms: f64,
    /// Key rate of a hop with zero errors, in kbps.
    pub base_rate_kbps: f64,
    pub link: LinkParameters,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            link_length_km: 100.0,
            session_key_bits: 128,
            relay_latency_ms: 5.0,
            base_rate_kbps: 50.0,
            link: LinkParameters::default(),
        }
    }
}

impl NetworkConfig {
    pub fn with_link_length(mut self, km: f64) -> Self {
        self.link_length_km = km;
        self
    }

    pub fn with_session_key_bits(mut self, bits: usize) -> Self {
        self.session_key_bits = bits;
        self
    }

    pub fn with_link(mut self, link: LinkParameters) -> Self {
        self.link = link;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_positive("link length", self.link_length_km)?;
        check_positive("base rate", self.base_rate_kbps)?;
        if !self.relay_latency_ms.is_finite() || self.relay_latency_ms < 0.0 {
            return Err(ProtocolError::Config(format!(
                "relay latency must be non-negative, got {}",
                self.relay_latency_ms
            )));
        }
        if self.session_key_bits == 0 {
            return Err(ProtocolError::Config(
                "session key length must be at least 1 bit".to_owned(),
            ));
        }
        self.link.validate()
    }
}

fn check_range(what: &str, value: f64, max: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=max).contains(&value) {
        return Err(ProtocolError::Config(format!(
            "{what} must be within 0..={max}, got {value}"
        )));
    }
    Ok(())
}

fn check_positive(what: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ProtocolError::Config(format!(
            "{what} must be positive, got {value}"
        )));
    }
    Ok(())
}

/// Number of hops (trusted segments) needed to cover `distance_km`.
pub fn trusted_nodes(distance_km: f64, link_length_km: f64) -> Result<usize> {
    check_positive("distance", distance_km)?;
    check_positive("link length", link_length_km)?;
    Ok((distance_km / link_length_km).ceil() as usize)
}

/// Per-hop QBER in percent, capped at 100.
pub fn per_link_qber(link: &LinkParameters) -> f64 {
    let qber = (100.0 - link.detector_efficiency_percent) * 0.01
        + link.dark_count_probability * 100.0
        + link.misalignment_percent;
    round2(qber.min(100.0))
}

/// QBER accumulated over `hops` independent hops: `1 - (1 - q)^n`.
pub fn end_to_end_qber(per_link_qber: f64, hops: usize) -> f64 {
    let survive = (1.0 - per_link_qber / 100.0).powi(hops as i32);
    round2((1.0 - survive) * 100.0)
}

pub fn key_rate(end_to_end_qber: f64, base_rate_kbps: f64) -> f64 {
    round2(base_rate_kbps * (1.0 - end_to_end_qber / 100.0))
}

/// Seconds to accumulate `session_key_bits` plus the relay latency of every
/// hop. `None` when the key rate is zero.
pub fn time_to_form_key(
    session_key_bits: usize,
    key_rate_kbps: f64,
    hops: usize,
    relay_latency_ms: f64,
) -> Option<f64> {
    if key_rate_kbps <= 0.0 {
        return None;
    }
    let seconds = session_key_bits as f64 / key_rate_kbps + hops as f64 * relay_latency_ms / 1000.0;
    Some(round2(seconds))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiverReport {
    pub receiver: String,
    pub distance_km: f64,
    pub trusted_nodes: usize,
    pub per_link_qber: f64,
    pub end_to_end_qber: f64,
    pub key_rate_kbps: f64,
    pub session_formed: bool,
    pub time_to_form_key_s: Option<f64>,
    pub session_key_bits: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkSummary {
    pub average_end_to_end_qber: f64,
    pub total_key_rate_kbps: f64,
    pub successful_sessions: usize,
    pub failed_sessions: usize,
    /// Receivers served one after another; failed sessions add nothing.
    pub total_time_s: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkReport {
    pub receivers: Vec<ReceiverReport>,
    pub summary: NetworkSummary,
}

pub fn evaluate_receiver(
    config: &NetworkConfig,
    receiver: impl Into<String>,
    distance_km: f64,
) -> Result<ReceiverReport> {
    let hops = trusted_nodes(distance_km, config.link_length_km)?;
    let per_link = per_link_qber(&config.link);
    let end_to_end = end_to_end_qber(per_link, hops);
    let rate = key_rate(end_to_end, config.base_rate_kbps);
    let time = time_to_form_key(config.session_key_bits, rate, hops, config.relay_latency_ms);
    Ok(ReceiverReport {
        receiver: receiver.into(),
        distance_km,
        trusted_nodes: hops,
        per_link_qber: per_link,
        end_to_end_qber: end_to_end,
        key_rate_kbps: rate,
        session_formed: rate > 0.0,
        time_to_form_key_s: time,
        session_key_bits: config.session_key_bits,
    })
}

/// Evaluates one receiver per entry of `distances_km`, named `Bob1`,
/// `Bob2`, ... in order.
pub fn simulate_network(config: &NetworkConfig, distances_km: &[f64]) -> Result<NetworkReport> {
    config.validate()?;
    if distances_km.is_empty() {
        return Err(ProtocolError::Config(
            "at least one receiver is required".to_owned(),
        ));
    }
    let receivers = distances_km
        .iter()
        .enumerate()
        .map(|(i, &d)| evaluate_receiver(config, format!("Bob{}", i + 1), d))
        .collect::<Result<Vec<_>>>()?;

    let n = receivers.len() as f64;
    let successful_sessions = receivers.iter().filter(|r| r.session_formed).count();
    let summary = NetworkSummary {
        average_end_to_end_qber: round2(receivers.iter().map(|r| r.end_to_end_qber).sum::<f64>() / n),
        total_key_rate_kbps: round2(receivers.iter().map(|r| r.key_rate_kbps).sum()),
        successful_sessions,
        failed_sessions: receivers.len() - successful_sessions,
        total_time_s: round2(receivers.iter().filter_map(|r| r.time_to_form_key_s).sum()),
    };
    Ok(NetworkReport { receivers, summary })
}
