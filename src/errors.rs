use thiserror::Error;

use crate::bb84_states::ExchangeId;
use crate::protocol::ProtocolState;

/// Contract violations raised by the pipeline stages.
///
/// Outcomes that are part of the protocol (an empty sifted set, a key too
/// short to encrypt with, a failed UTF-8 decode, a security abort) are not
/// errors and are reported in the result structures instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("{what}: expected length {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Block size must be at least 1, got {0}")]
    InvalidBlockSize(usize),

    #[error("Abort threshold must be a percentage in 0..=100, got {0}")]
    InvalidThreshold(f64),

    #[error("Secret key length must be 1..=64 hex characters, got {0}")]
    InvalidDigestLength(usize),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: ProtocolState,
        to: ProtocolState,
    },

    #[error("This run has already encrypted a message")]
    CipherAlreadyUsed,

    #[error("Exchange has no key material (aborted or never completed)")]
    NoKeyMaterial,

    #[error("Unknown exchange {0}")]
    UnknownExchange(ExchangeId),

    #[error("Session store lock was poisoned")]
    SessionPoisoned,

    #[error("Invalid symbol {0:?}")]
    InvalidSymbol(char),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(value: std::io::Error) -> Self {
        Self::Config(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Checks that a position-wise compared sequence has the expected length.
pub(crate) fn ensure_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(ProtocolError::LengthMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}
