//! Classical stand-in for the quantum channel.
//!
//! Produces the raw measurement record the pipeline consumes. Each symbol is
//! tracked as one of the four BB84 states; measuring in the conjugate basis
//! yields a fair coin.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bb84_states::{random_bit, BB84State, Basis, Eavesdropper, Exchange, ExchangeId};
use crate::config::{ChannelConfig, Variant};
use crate::errors::Result;

pub fn generate_bb84_state(bit: bool, basis: Basis) -> BB84State {
    match (basis, bit) {
        (Basis::Rectilinear, false) => BB84State::QubitZero,
        (Basis::Rectilinear, true) => BB84State::QubitOne,
        (Basis::Diagonal, false) => BB84State::QubitMinus,
        (Basis::Diagonal, true) => BB84State::QubitPlus,
    }
}

pub fn measure_bb84_state<R: Rng + ?Sized>(state: BB84State, basis: Basis, rng: &mut R) -> bool {
    match (state, basis) {
        (BB84State::QubitZero, Basis::Rectilinear) => false,
        (BB84State::QubitOne, Basis::Rectilinear) => true,
        (BB84State::QubitPlus, Basis::Diagonal) => true,
        (BB84State::QubitMinus, Basis::Diagonal) => false,
        // Conjugate basis: outcome is uniformly random.
        _ => rng.gen(),
    }
}

pub fn flip_state(state: BB84State) -> BB84State {
    match state {
        BB84State::QubitZero => BB84State::QubitOne,
        BB84State::QubitOne => BB84State::QubitZero,
        BB84State::QubitPlus => BB84State::QubitMinus,
        BB84State::QubitMinus => BB84State::QubitPlus,
    }
}

pub struct ChannelSimulator {
    config: ChannelConfig,
    rng: StdRng,
    next_id: u64,
}

impl ChannelSimulator {
    pub fn new(config: ChannelConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            config,
            rng,
            next_id: 1,
        })
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Runs one exchange of `config.qubits` symbols under `variant`.
    pub fn transmit(&mut self, variant: Variant) -> Exchange {
        let n = self.config.qubits;
        let id = ExchangeId(self.next_id);
        self.next_id += 1;

        let sender_bits: Vec<bool> = (0..n).map(|_| random_bit(&mut self.rng)).collect();
        let sender_bases: Vec<Basis> = (0..n).map(|_| Basis::random(&mut self.rng)).collect();
        let receiver_bases: Vec<Basis> = (0..n).map(|_| Basis::random(&mut self.rng)).collect();

        let mut receiver_bits = Vec::with_capacity(n);
        let mut eve = Eavesdropper::default();

        for i in 0..n {
            let mut state = generate_bb84_state(sender_bits[i], sender_bases[i]);

            match variant {
                Variant::Ideal | Variant::Noisy => {}
                Variant::InterceptResend => {
                    let eve_basis = Basis::random(&mut self.rng);
                    let eve_bit = measure_bb84_state(state, eve_basis, &mut self.rng);
                    state = generate_bb84_state(eve_bit, eve_basis);
                    eve.bases.push(Some(eve_basis));
                    eve.bits.push(Some(eve_bit));
                }
                Variant::PartialIntercept if i % 2 == 0 => {
                    let eve_basis = Basis::random(&mut self.rng);
                    let eve_bit = measure_bb84_state(state, eve_basis, &mut self.rng);
                    // The measured qubit is reset and a random bit is
                    // re-prepared in the sender's basis.
                    state = generate_bb84_state(random_bit(&mut self.rng), sender_bases[i]);
                    eve.bases.push(Some(eve_basis));
                    eve.bits.push(Some(eve_bit));
                }
                Variant::PartialIntercept => {
                    eve.bases.push(None);
                    eve.bits.push(None);
                }
            }

            if variant == Variant::Noisy && self.rng.gen::<f64>() < self.config.noise_probability {
                state = flip_state(state);
            }

            receiver_bits.push(measure_bb84_state(state, receiver_bases[i], &mut self.rng));
        }

        debug!("channel {}: {} symbols over {} channel", id, n, variant);

        let exchange = Exchange::new(id, sender_bits, sender_bases, receiver_bases, receiver_bits);
        if variant.has_eavesdropper() {
            exchange.with_eavesdropper(eve)
        } else {
            exchange
        }
    }
}
