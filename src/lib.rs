//! # bb84_pipeline
//!
//! Classical post-measurement half of a BB84 key exchange: sifting, QBER
//! estimation, block parity correction, privacy amplification, the
//! security abort decision, and an XOR cipher keyed by the shared bits.
//!
//! Raw measurements come from outside (see [`channel`] for a classical
//! stand-in); everything downstream is a pure function of them, sequenced
//! by [`protocol::ProtocolRun`]. [`network`] estimates how a key fares
//! when relayed across trusted nodes to several receivers.

pub mod bb84_states;
pub mod channel;
pub mod cipher;
pub mod config;
pub mod error_correction;
pub mod errors;
pub mod network;
pub mod privacy_amplification;
pub mod protocol;
pub mod qber;
pub mod security_gate;
pub mod session;
pub mod sifting;

pub use bb84_states::{Basis, Eavesdropper, Exchange, ExchangeId};
pub use config::{ChannelConfig, KeySource, ProtocolConfig, Variant};
pub use errors::{ProtocolError, Result};
pub use protocol::{
    encrypt_with_existing_key, run_exchange, ExchangeResult, ProtocolRun, ProtocolState,
    ReentryResult,
};
pub use session::SessionStore;

pub mod prelude {
    pub use crate::bb84_states::*;
    pub use crate::channel::ChannelSimulator;
    pub use crate::cipher::{decrypt, encrypt, run_cipher, CipherResult};
    pub use crate::config::*;
    pub use crate::error_correction::block_parity_correction;
    pub use crate::errors::{ProtocolError, Result};
    pub use crate::network::{simulate_network, NetworkConfig, NetworkReport};
    pub use crate::privacy_amplification::derive_secret_key;
    pub use crate::protocol::*;
    pub use crate::qber::{estimate, QberReport};
    pub use crate::security_gate::{should_abort, GateMetric, SecurityGate};
    pub use crate::session::SessionStore;
    pub use crate::sifting::{sift, SiftedPair};
}
