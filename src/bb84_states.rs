use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{ensure_len, ProtocolError, Result};

/// Prepared single-qubit states used by the BB84 encoding.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BB84State {
    QubitZero,
    QubitOne,
    QubitPlus,  // |+>
    QubitMinus, // |->
}

/// The two conjugate measurement bases.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Basis {
    #[serde(rename = "+")]
    Rectilinear,
    #[serde(rename = "x")]
    Diagonal,
}

impl Basis {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen() {
            Basis::Diagonal
        } else {
            Basis::Rectilinear
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Basis::Rectilinear => '+',
            Basis::Diagonal => 'x',
        }
    }
}

impl fmt::Display for Basis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl TryFrom<char> for Basis {
    type Error = ProtocolError;

    fn try_from(c: char) -> Result<Self> {
        match c {
            '+' | '0' | 'z' | 'Z' => Ok(Basis::Rectilinear),
            'x' | 'X' | '1' => Ok(Basis::Diagonal),
            other => Err(ProtocolError::InvalidSymbol(other)),
        }
    }
}

pub type BitSequence = Vec<bool>;
pub type BasisSequence = Vec<Basis>;

pub fn random_bit<R: Rng + ?Sized>(rng: &mut R) -> bool {
    rng.gen()
}

/// Parses a string of `0`/`1` characters, ignoring whitespace.
pub fn bits_from_str(s: &str) -> Result<BitSequence> {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '0' => Ok(false),
            '1' => Ok(true),
            other => Err(ProtocolError::InvalidSymbol(other)),
        })
        .collect()
}

/// Parses a string of basis symbols (`+`/`x`), ignoring whitespace.
pub fn bases_from_str(s: &str) -> Result<BasisSequence> {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .map(Basis::try_from)
        .collect()
}

/// Renders bits as decimal digit characters in sequence order.
pub fn bits_to_string(bits: &[bool]) -> String {
    bits.iter().map(|&b| if b { '1' } else { '0' }).collect()
}

/// Identity of one protocol run, used to look up cached key material.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeId(pub u64);

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for ExchangeId {
    fn from(value: u64) -> Self {
        ExchangeId(value)
    }
}

/// What a third party recorded on the channel. `None` marks symbols that
/// were not intercepted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Eavesdropper {
    pub bases: Vec<Option<Basis>>,
    pub bits: Vec<Option<bool>>,
}

impl Eavesdropper {
    pub fn intercepted_count(&self) -> usize {
        self.bits.iter().filter(|b| b.is_some()).count()
    }
}

/// Raw measurement record of one exchange, as delivered by the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub id: ExchangeId,
    pub sender_bits: BitSequence,
    pub sender_bases: BasisSequence,
    pub receiver_bases: BasisSequence,
    pub receiver_bits: BitSequence,
    pub eavesdropper: Option<Eavesdropper>,
}

impl Exchange {
    pub fn new(
        id: impl Into<ExchangeId>,
        sender_bits: BitSequence,
        sender_bases: BasisSequence,
        receiver_bases: BasisSequence,
        receiver_bits: BitSequence,
    ) -> Self {
        Self {
            id: id.into(),
            sender_bits,
            sender_bases,
            receiver_bases,
            receiver_bits,
            eavesdropper: None,
        }
    }

    pub fn with_eavesdropper(mut self, eavesdropper: Eavesdropper) -> Self {
        self.eavesdropper = Some(eavesdropper);
        self
    }

    /// Number of channel uses.
    pub fn len(&self) -> usize {
        self.sender_bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sender_bits.is_empty()
    }

    /// Every sequence must be parallel-indexed to `sender_bits`.
    pub fn validate(&self) -> Result<()> {
        let n = self.len();
        ensure_len("sender_bases", n, self.sender_bases.len())?;
        ensure_len("receiver_bases", n, self.receiver_bases.len())?;
        ensure_len("receiver_bits", n, self.receiver_bits.len())?;
        if let Some(eve) = &self.eavesdropper {
            ensure_len("eavesdropper_bases", n, eve.bases.len())?;
            ensure_len("eavesdropper_bits", n, eve.bits.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_basis_symbols() {
        assert_eq!(Basis::try_from('+').unwrap(), Basis::Rectilinear);
        assert_eq!(Basis::try_from('x').unwrap(), Basis::Diagonal);
        assert_eq!(Basis::try_from('1').unwrap(), Basis::Diagonal);
        assert_eq!(
            Basis::try_from('?'),
            Err(ProtocolError::InvalidSymbol('?'))
        );
        assert_eq!(Basis::Diagonal.to_string(), "x");
    }

    #[test]
    fn test_bits_string_conversion() {
        let bits = bits_from_str("10 11").unwrap();
        assert_eq!(bits, vec![true, false, true, true]);
        assert_eq!(bits_to_string(&bits), "1011");
        assert!(bits_from_str("102").is_err());
        assert_eq!(bits_to_string(&[]), "");
    }

    #[test]
    fn test_random_basis_generation_consistency() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut rectilinear = 0;
        let mut diagonal = 0;
        for _ in 0..100 {
            match Basis::random(&mut rng) {
                Basis::Rectilinear => rectilinear += 1,
                Basis::Diagonal => diagonal += 1,
            }
        }
        assert!(rectilinear > 0 && diagonal > 0);
    }

    #[test]
    fn test_exchange_validation() {
        let exchange = Exchange::new(
            1,
            bits_from_str("1011").unwrap(),
            bases_from_str("++xx").unwrap(),
            bases_from_str("+x+").unwrap(),
            bits_from_str("1110").unwrap(),
        );
        assert_eq!(
            exchange.validate(),
            Err(ProtocolError::LengthMismatch {
                what: "receiver_bases",
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn test_eavesdropper_length_is_checked() {
        let exchange = Exchange::new(
            2,
            vec![true, false],
            vec![Basis::Rectilinear; 2],
            vec![Basis::Rectilinear; 2],
            vec![true, false],
        )
        .with_eavesdropper(Eavesdropper {
            bases: vec![Some(Basis::Diagonal)],
            bits: vec![Some(true), None],
        });
        assert!(matches!(
            exchange.validate(),
            Err(ProtocolError::LengthMismatch {
                what: "eavesdropper_bases",
                ..
            })
        ));
    }
}
