//! Run configuration.
//!
//! The four protocol variants share one pipeline; they only differ in the
//! presets below. Configurations round-trip through JSON so a host can
//! keep them in a file.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error_correction::DEFAULT_BLOCK_SIZE;
use crate::errors::{ProtocolError, Result};
use crate::privacy_amplification::FULL_DIGEST_HEX_LEN;
use crate::security_gate::{SecurityGate, DEFAULT_LOSS_THRESHOLD, DEFAULT_QBER_THRESHOLD};

pub const DEFAULT_MESSAGE: &str = "QKD demo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// No eavesdropper, ideal channel.
    Ideal,
    /// No eavesdropper, noisy hardware-modelled channel.
    Noisy,
    /// Eavesdropper measures and resends every symbol.
    InterceptResend,
    /// Eavesdropper measures every other symbol and forwards a reset qubit.
    PartialIntercept,
}

impl Variant {
    pub const ALL: [Variant; 4] = [
        Variant::Ideal,
        Variant::Noisy,
        Variant::InterceptResend,
        Variant::PartialIntercept,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Variant::Ideal => "ideal",
            Variant::Noisy => "noisy",
            Variant::InterceptResend => "intercept_resend",
            Variant::PartialIntercept => "partial_intercept",
        }
    }

    pub fn has_eavesdropper(self) -> bool {
        matches!(self, Variant::InterceptResend | Variant::PartialIntercept)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Variant::ALL
            .into_iter()
            .find(|v| v.name() == s)
            .ok_or_else(|| ProtocolError::Config(format!("unknown variant {s:?}")))
    }
}

/// Key material fed to the cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// The sender's sifted bits encrypt, the receiver's sifted bits decrypt.
    Sifted,
    /// Both sides use the corrected key; falls back to the sender's sifted
    /// bits when no corrected key exists.
    Corrected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub variant: Variant,
    pub error_correction: bool,
    pub block_size: usize,
    /// `None` skips the abort decision entirely.
    pub gate: Option<SecurityGate>,
    /// Key used on a fresh run.
    pub cipher_key: KeySource,
    /// Key used when a finished run encrypts another message.
    pub reentry_cipher_key: KeySource,
    /// Length of the derived secret, in hex characters.
    pub secret_key_hex_len: usize,
    /// Encrypt the default message on a fresh run when none is supplied.
    pub encrypt_on_run: bool,
    pub default_message: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self::for_variant(Variant::Ideal)
    }
}

impl ProtocolConfig {
    pub fn for_variant(variant: Variant) -> Self {
        let base = Self {
            variant,
            error_correction: true,
            block_size: DEFAULT_BLOCK_SIZE,
            gate: None,
            cipher_key: KeySource::Sifted,
            reentry_cipher_key: KeySource::Sifted,
            secret_key_hex_len: FULL_DIGEST_HEX_LEN,
            encrypt_on_run: true,
            default_message: DEFAULT_MESSAGE.to_owned(),
        };
        match variant {
            Variant::Ideal => base,
            Variant::Noisy => Self {
                reentry_cipher_key: KeySource::Corrected,
                ..base
            },
            Variant::InterceptResend => Self {
                error_correction: false,
                gate: Some(SecurityGate::loss(DEFAULT_LOSS_THRESHOLD)),
                encrypt_on_run: false,
                ..base
            },
            Variant::PartialIntercept => Self {
                error_correction: false,
                gate: Some(SecurityGate::qber(DEFAULT_QBER_THRESHOLD)),
                encrypt_on_run: false,
                ..base
            },
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_gate(mut self, gate: Option<SecurityGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_error_correction(mut self, enabled: bool) -> Self {
        self.error_correction = enabled;
        self
    }

    pub fn with_cipher_key(mut self, source: KeySource) -> Self {
        self.cipher_key = source;
        self
    }

    pub fn with_reentry_cipher_key(mut self, source: KeySource) -> Self {
        self.reentry_cipher_key = source;
        self
    }

    pub fn with_secret_key_hex_len(mut self, len: usize) -> Self {
        self.secret_key_hex_len = len;
        self
    }

    pub fn with_encrypt_on_run(mut self, enabled: bool) -> Self {
        self.encrypt_on_run = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(ProtocolError::InvalidBlockSize(self.block_size));
        }
        if self.secret_key_hex_len == 0 || self.secret_key_hex_len > FULL_DIGEST_HEX_LEN {
            return Err(ProtocolError::InvalidDigestLength(self.secret_key_hex_len));
        }
        if let Some(gate) = &self.gate {
            gate.validate()?;
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Parameters for the classical channel stand-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub qubits: usize,
    /// Per-symbol bit-flip probability on the noisy channel.
    pub noise_probability: f64,
    pub seed: Option<u64>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            qubits: 20,
            noise_probability: 0.05,
            seed: None,
        }
    }
}

impl ChannelConfig {
    pub fn with_qubits(mut self, qubits: usize) -> Self {
        self.qubits = qubits;
        self
    }

    pub fn with_noise(mut self, probability: f64) -> Self {
        self.noise_probability = probability;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        let p = self.noise_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(ProtocolError::Config(format!(
                "noise probability must be within 0..=1, got {p}"
            )));
        }
        Ok(())
    }
}
