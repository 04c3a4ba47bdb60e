//! Protocol orchestrator.
//!
//! A [`ProtocolRun`] walks one exchange through
//! `Start -> Sifted -> RateEstimated -> {Aborted | Corrected} -> KeyDerived -> Cipherable`.
//! Every step checks that it is legal from the current state, so stages
//! cannot be skipped or repeated. [`encrypt_with_existing_key`] re-enters
//! directly at `Cipherable` from a finished [`ExchangeResult`].

use std::fmt;

use log::{debug, info, warn};
use serde::Serialize;

use crate::bb84_states::{bits_from_str, bits_to_string, Basis, Exchange, ExchangeId};
use crate::cipher::{run_cipher, CipherResult};
use crate::config::{KeySource, ProtocolConfig, Variant};
use crate::error_correction::{block_parity_correction, mismatched_blocks};
use crate::errors::{ProtocolError, Result};
use crate::privacy_amplification::derive_secret_key;
use crate::qber::{estimate, QberReport};
use crate::sifting::SiftedPair;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolState {
    Start,
    Sifted,
    RateEstimated,
    Aborted,
    Corrected,
    KeyDerived,
    Cipherable,
}

impl ProtocolState {
    fn can_advance_to(self, next: ProtocolState) -> bool {
        use ProtocolState::*;
        matches!(
            (self, next),
            (Start, Sifted)
                | (Sifted, RateEstimated)
                | (RateEstimated, Aborted)
                | (RateEstimated, Corrected)
                | (Corrected, KeyDerived)
                | (KeyDerived, Cipherable)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ProtocolState::Aborted | ProtocolState::Cipherable)
    }
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolState::Start => "Start",
            ProtocolState::Sifted => "Sifted",
            ProtocolState::RateEstimated => "RateEstimated",
            ProtocolState::Aborted => "Aborted",
            ProtocolState::Corrected => "Corrected",
            ProtocolState::KeyDerived => "KeyDerived",
            ProtocolState::Cipherable => "Cipherable",
        };
        f.write_str(name)
    }
}

/// Terminal value of one run.
///
/// When the run aborted, every bit array that could rebuild the key (raw
/// and sifted bits, the eavesdropper's outcomes) is left empty, as are the
/// corrected key and secret. Only the bases, the error statistics and the
/// reason are reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeResult {
    pub exchange_id: ExchangeId,
    pub variant: Variant,
    pub state: ProtocolState,
    pub key_source: KeySource,
    pub reentry_key_source: KeySource,
    pub sender_bits: Vec<bool>,
    pub sender_bases: Vec<Basis>,
    pub receiver_bases: Vec<Basis>,
    pub receiver_bits: Vec<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eavesdropper_bases: Option<Vec<Option<Basis>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eavesdropper_bits: Option<Vec<Option<bool>>>,
    pub sifted_indices: Vec<usize>,
    pub sender_sifted: Vec<bool>,
    pub receiver_sifted: Vec<bool>,
    #[serde(flatten)]
    pub qber: QberReport,
    pub fidelity: f64,
    pub loss: f64,
    pub error_corrected_key: Option<String>,
    pub final_secret_key: Option<String>,
    #[serde(flatten)]
    pub cipher: Option<CipherResult>,
    pub abort_reason: Option<String>,
}

impl ExchangeResult {
    pub fn is_aborted(&self) -> bool {
        self.state == ProtocolState::Aborted
    }

    pub fn has_key_material(&self) -> bool {
        self.state == ProtocolState::Cipherable
    }
}

/// Cipher fields returned by the re-entry path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReentryResult {
    #[serde(flatten)]
    pub cipher: CipherResult,
    pub error_corrected_key: Option<String>,
    pub final_secret_key: Option<String>,
}

pub struct ProtocolRun {
    config: ProtocolConfig,
    exchange: Exchange,
    current_state: ProtocolState,
    sifted: SiftedPair,
    qber: QberReport,
    abort_reason: Option<String>,
    corrected_key: Vec<bool>,
    secret_key: Option<String>,
    cipher: Option<CipherResult>,
}

impl ProtocolRun {
    pub fn new(exchange: Exchange, config: ProtocolConfig) -> Result<Self> {
        config.validate()?;
        exchange.validate()?;
        Ok(Self {
            config,
            exchange,
            current_state: ProtocolState::Start,
            sifted: SiftedPair::default(),
            qber: QberReport::default(),
            abort_reason: None,
            corrected_key: Vec::new(),
            secret_key: None,
            cipher: None,
        })
    }

    pub fn current_state(&self) -> ProtocolState {
        self.current_state
    }

    pub fn sifted(&self) -> &SiftedPair {
        &self.sifted
    }

    pub fn qber(&self) -> &QberReport {
        &self.qber
    }

    pub fn abort_reason(&self) -> Option<&str> {
        self.abort_reason.as_deref()
    }

    fn ensure_can_advance(&self, next: ProtocolState) -> Result<()> {
        if !self.current_state.can_advance_to(next) {
            return Err(ProtocolError::InvalidTransition {
                from: self.current_state,
                to: next,
            });
        }
        Ok(())
    }

    fn set_state(&mut self, next: ProtocolState) {
        debug!(
            "exchange {}: {} -> {}",
            self.exchange.id, self.current_state, next
        );
        self.current_state = next;
    }

    pub fn sift(&mut self) -> Result<&SiftedPair> {
        self.ensure_can_advance(ProtocolState::Sifted)?;
        self.sifted = self.exchange.sift()?;
        debug!(
            "exchange {}: kept {} of {} symbols",
            self.exchange.id,
            self.sifted.len(),
            self.exchange.len()
        );
        self.set_state(ProtocolState::Sifted);
        Ok(&self.sifted)
    }

    pub fn estimate(&mut self) -> Result<&QberReport> {
        self.ensure_can_advance(ProtocolState::RateEstimated)?;
        self.qber = estimate(&self.sifted);
        debug!(
            "exchange {}: qber {:.2}% ({} of {} sifted bits differ)",
            self.exchange.id,
            self.qber.qber_percent,
            self.qber.mismatch_count,
            self.qber.matched_count
        );
        self.set_state(ProtocolState::RateEstimated);
        Ok(&self.qber)
    }

    /// Runs the configured security gate. Returns the abort reason when the
    /// run was aborted; with no gate configured this never aborts.
    pub fn apply_gate(&mut self) -> Result<Option<&str>> {
        if self.current_state != ProtocolState::RateEstimated {
            return Err(ProtocolError::InvalidTransition {
                from: self.current_state,
                to: ProtocolState::Aborted,
            });
        }
        let Some(gate) = self.config.gate else {
            return Ok(None);
        };
        if let Some(reason) = gate.evaluate(&self.qber) {
            warn!("exchange {}: {}", self.exchange.id, reason);
            self.abort_reason = Some(reason);
            self.set_state(ProtocolState::Aborted);
        }
        Ok(self.abort_reason.as_deref())
    }

    pub fn correct(&mut self) -> Result<&[bool]> {
        self.ensure_can_advance(ProtocolState::Corrected)?;
        let sender = &self.sifted.sender_sifted;
        let receiver = &self.sifted.receiver_sifted;
        self.corrected_key = if self.config.error_correction {
            let block_size = self.config.block_size;
            debug!(
                "exchange {}: {} of {} blocks disagree on parity",
                self.exchange.id,
                mismatched_blocks(sender, receiver, block_size),
                receiver.len().div_ceil(block_size)
            );
            block_parity_correction(sender, receiver, block_size)?
        } else {
            receiver.clone()
        };
        self.set_state(ProtocolState::Corrected);
        Ok(&self.corrected_key)
    }

    pub fn derive_key(&mut self) -> Result<&str> {
        self.ensure_can_advance(ProtocolState::KeyDerived)?;
        let secret_key = derive_secret_key(&self.corrected_key, self.config.secret_key_hex_len)?;
        self.set_state(ProtocolState::KeyDerived);
        Ok(self.secret_key.insert(secret_key).as_str())
    }

    pub fn finish(&mut self) -> Result<()> {
        self.ensure_can_advance(ProtocolState::Cipherable)?;
        self.set_state(ProtocolState::Cipherable);
        Ok(())
    }

    /// Encrypts one message with the run's key material. Allowed once, and
    /// only after the run reached `Cipherable`.
    pub fn encrypt(&mut self, message: &str) -> Result<&CipherResult> {
        if self.current_state != ProtocolState::Cipherable {
            return Err(ProtocolError::InvalidTransition {
                from: self.current_state,
                to: ProtocolState::Cipherable,
            });
        }
        if self.cipher.is_some() {
            return Err(ProtocolError::CipherAlreadyUsed);
        }
        let corrected = self
            .config
            .error_correction
            .then(|| bits_to_string(&self.corrected_key));
        let (sender_key, receiver_key) = cipher_keys(
            self.config.cipher_key,
            &self.sifted,
            corrected.as_deref(),
        )?;
        let result = run_cipher(message, &sender_key, &receiver_key);
        if !result.success {
            warn!(
                "exchange {}: message did not survive the cipher ({} key bits)",
                self.exchange.id,
                sender_key.len()
            );
        }
        Ok(&*self.cipher.insert(result))
    }

    pub fn into_result(self) -> ExchangeResult {
        let aborted = self.current_state == ProtocolState::Aborted;
        let keyed = self.current_state == ProtocolState::Cipherable;
        let Exchange {
            id,
            sender_bits,
            sender_bases,
            receiver_bases,
            receiver_bits,
            eavesdropper,
        } = self.exchange;
        let (eavesdropper_bases, eavesdropper_bits) = match eavesdropper {
            Some(eve) => (Some(eve.bases), (!aborted).then_some(eve.bits)),
            None => (None, None),
        };
        let (sender_bits, receiver_bits, sifted) = if aborted {
            (Vec::new(), Vec::new(), SiftedPair::default())
        } else {
            (sender_bits, receiver_bits, self.sifted)
        };
        let error_corrected_key = (keyed && self.config.error_correction)
            .then(|| bits_to_string(&self.corrected_key));

        ExchangeResult {
            exchange_id: id,
            variant: self.config.variant,
            state: self.current_state,
            key_source: self.config.cipher_key,
            reentry_key_source: self.config.reentry_cipher_key,
            sender_bits,
            sender_bases,
            receiver_bases,
            receiver_bits,
            eavesdropper_bases,
            eavesdropper_bits,
            sifted_indices: sifted.retained_indices,
            sender_sifted: sifted.sender_sifted,
            receiver_sifted: sifted.receiver_sifted,
            fidelity: self.qber.fidelity(),
            loss: self.qber.loss(),
            qber: self.qber,
            error_corrected_key,
            final_secret_key: if keyed { self.secret_key } else { None },
            cipher: self.cipher,
            abort_reason: self.abort_reason,
        }
    }
}

/// Picks the sender-side and receiver-side cipher keys.
fn cipher_keys(
    source: KeySource,
    sifted: &SiftedPair,
    error_corrected_key: Option<&str>,
) -> Result<(Vec<bool>, Vec<bool>)> {
    match (source, error_corrected_key) {
        (KeySource::Corrected, Some(corrected)) if !corrected.is_empty() => {
            let key = bits_from_str(corrected)?;
            Ok((key.clone(), key))
        }
        (KeySource::Corrected, _) => Ok((
            sifted.sender_sifted.clone(),
            sifted.sender_sifted.clone(),
        )),
        (KeySource::Sifted, _) => Ok((
            sifted.sender_sifted.clone(),
            sifted.receiver_sifted.clone(),
        )),
    }
}

/// Runs a fresh exchange from raw measurements to a cipherable key.
///
/// `message` is encrypted once the key is derived; when it is `None` the
/// configured default message is used if `encrypt_on_run` is set.
pub fn run_exchange(
    exchange: Exchange,
    config: &ProtocolConfig,
    message: Option<&str>,
) -> Result<ExchangeResult> {
    info!(
        "exchange {}: starting {} run over {} symbols",
        exchange.id,
        config.variant,
        exchange.len()
    );
    let mut run = ProtocolRun::new(exchange, config.clone())?;
    run.sift()?;
    run.estimate()?;
    if run.apply_gate()?.is_some() {
        return Ok(run.into_result());
    }
    run.correct()?;
    run.derive_key()?;
    run.finish()?;

    let message = match message {
        Some(m) => Some(m.to_owned()),
        None if config.encrypt_on_run => Some(config.default_message.clone()),
        None => None,
    };
    if let Some(message) = message {
        run.encrypt(&message)?;
    }

    let result = run.into_result();
    info!(
        "exchange {}: {} with {} sifted bits, qber {:.2}%",
        result.exchange_id,
        result.state,
        result.qber.matched_count,
        result.qber.qber_display()
    );
    Ok(result)
}

/// Encrypts a new message with key material from a completed run, without
/// repeating sifting, estimation, correction or derivation.
pub fn encrypt_with_existing_key(previous: &ExchangeResult, message: &str) -> Result<ReentryResult> {
    if !previous.has_key_material() {
        return Err(ProtocolError::NoKeyMaterial);
    }
    let sifted = SiftedPair {
        sender_sifted: previous.sender_sifted.clone(),
        receiver_sifted: previous.receiver_sifted.clone(),
        retained_indices: previous.sifted_indices.clone(),
    };
    let (sender_key, receiver_key) = cipher_keys(
        previous.reentry_key_source,
        &sifted,
        previous.error_corrected_key.as_deref(),
    )?;
    debug!(
        "exchange {}: re-encrypting with {} stored key bits",
        previous.exchange_id,
        sender_key.len()
    );
    Ok(ReentryResult {
        cipher: run_cipher(message, &sender_key, &receiver_key),
        error_corrected_key: previous.error_corrected_key.clone(),
        final_secret_key: previous.final_secret_key.clone(),
    })
}
