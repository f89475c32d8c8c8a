use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Polarization basis a photon is prepared or measured in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Basis {
    /// `+`: horizontal / vertical
    Rectilinear,
    /// `x`: +45° / -45°
    Diagonal,
    /// `o`: left / right circular (six-state and custom protocols)
    Circular,
}

impl Basis {
    pub const BB84: [Basis; 2] = [Basis::Rectilinear, Basis::Diagonal];
    pub const SIX_STATE: [Basis; 3] = [Basis::Rectilinear, Basis::Diagonal, Basis::Circular];

    /// Uniform draw from `set`.
    pub fn random<R: Rng + ?Sized>(set: &[Basis], rng: &mut R) -> Self {
        set[rng.gen_range(0..set.len())]
    }

    pub fn symbol(self) -> char {
        match self {
            Basis::Rectilinear => '+',
            Basis::Diagonal => 'x',
            Basis::Circular => 'o',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '+' => Some(Basis::Rectilinear),
            'x' | 'X' | '×' => Some(Basis::Diagonal),
            'o' | 'O' => Some(Basis::Circular),
            _ => None,
        }
    }

    /// The basis a SARG04 receiver uses for the conclusive outcome.
    pub fn complementary(self) -> Self {
        match self {
            Basis::Rectilinear => Basis::Diagonal,
            Basis::Diagonal => Basis::Rectilinear,
            Basis::Circular => Basis::Rectilinear,
        }
    }
}

/// Pulse intensity class used by the decoy-state protocol.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Signal,
    Decoy,
    Vacuum,
}

/// A single transmitted symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photon {
    pub bit: bool,
    pub basis: Basis,
    pub polarization_degrees: f64,
    pub intensity: Intensity,
    /// Cleared once the photon is lost in the channel or split off by Eve.
    pub detected: bool,
    /// Set when Eve tampered with the photon.
    pub corrupted: bool,
}

impl Photon {
    pub fn new(bit: bool, basis: Basis, polarization_degrees: f64) -> Self {
        Photon {
            bit,
            basis,
            polarization_degrees,
            intensity: Intensity::Signal,
            detected: true,
            corrupted: false,
        }
    }

    pub fn with_intensity(mut self, intensity: Intensity) -> Self {
        self.intensity = intensity;
        self
    }

    /// Bit flip: |0> <-> |1>, |+> <-> |->, |L> <-> |R>.
    pub fn flip(&mut self) {
        self.bit = !self.bit;
        self.polarization_degrees = nominal_polarization(self.bit, self.basis);
    }

    pub fn lose(&mut self) {
        self.detected = false;
    }
}

/// Ideal polarization angle for `bit` prepared in `basis`.
pub fn nominal_polarization(bit: bool, basis: Basis) -> f64 {
    match (basis, bit) {
        (Basis::Rectilinear, false) => 0.0,
        (Basis::Rectilinear, true) => 90.0,
        (Basis::Diagonal, false) => 45.0,
        (Basis::Diagonal, true) => 135.0,
        // left / right circular, drawn on the same half-turn scale
        (Basis::Circular, false) => 0.0,
        (Basis::Circular, true) => 180.0,
    }
}

/// What Bob's detector reports for one time slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Symbol {
    Bit(bool),
    Undetected,
}

impl Symbol {
    pub const UNDETECTED: char = '?';

    pub fn bit(self) -> Option<bool> {
        match self {
            Symbol::Bit(b) => Some(b),
            Symbol::Undetected => None,
        }
    }

    pub fn is_detected(self) -> bool {
        matches!(self, Symbol::Bit(_))
    }

    pub fn as_char(self) -> char {
        match self {
            Symbol::Bit(false) => '0',
            Symbol::Bit(true) => '1',
            Symbol::Undetected => Self::UNDETECTED,
        }
    }
}

impl From<bool> for Symbol {
    fn from(bit: bool) -> Self {
        Symbol::Bit(bit)
    }
}

pub fn random_bit<R: Rng + ?Sized>(rng: &mut R) -> bool {
    rng.gen()
}

pub fn parse_bits(text: &str) -> Result<Vec<bool>> {
    text.chars()
        .enumerate()
        .map(|(position, symbol)| match symbol {
            '0' => Ok(false),
            '1' => Ok(true),
            _ => Err(ProtocolError::InvalidBit { symbol, position }),
        })
        .collect()
}

/// Like [`parse_bits`] but also accepts the undetected sentinel `?`.
pub fn parse_symbols(text: &str) -> Result<Vec<Symbol>> {
    text.chars()
        .enumerate()
        .map(|(position, symbol)| match symbol {
            '0' => Ok(Symbol::Bit(false)),
            '1' => Ok(Symbol::Bit(true)),
            Symbol::UNDETECTED => Ok(Symbol::Undetected),
            _ => Err(ProtocolError::InvalidBit { symbol, position }),
        })
        .collect()
}

pub fn parse_bases(text: &str) -> Result<Vec<Basis>> {
    text.chars()
        .enumerate()
        .map(|(position, symbol)| {
            Basis::from_symbol(symbol).ok_or(ProtocolError::InvalidBasis { symbol, position })
        })
        .collect()
}

pub fn format_bits(bits: &[bool]) -> String {
    bits.iter().map(|&b| if b { '1' } else { '0' }).collect()
}

pub fn format_symbols(symbols: &[Symbol]) -> String {
    symbols.iter().map(|s| s.as_char()).collect()
}

pub fn format_bases(bases: &[Basis]) -> String {
    bases.iter().map(|b| b.symbol()).collect()
}

/// Number of positions where the two keys disagree.
pub fn count_mismatches(a: &[bool], b: &[bool]) -> usize {
    a.iter().zip(b.iter()).filter(|(x, y)| x != y).count()
}
