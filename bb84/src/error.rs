use thiserror::Error;

use crate::bb84_states::Basis;

/// Errors raised by the protocol primitives.
///
/// Only malformed input produces an error here. Insecure keys, empty sifted
/// keys and entropy fallbacks are ordinary outcomes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("{left} has {left_len} symbols but {right} has {right_len}")]
    LengthMismatch {
        left: &'static str,
        left_len: usize,
        right: &'static str,
        right_len: usize,
    },

    #[error("invalid bit symbol {symbol:?} at position {position} (expected '0' or '1')")]
    InvalidBit { symbol: char, position: usize },

    #[error("invalid basis symbol {symbol:?} at position {position} (expected '+', 'x' or 'o')")]
    InvalidBasis { symbol: char, position: usize },

    #[error("basis {basis:?} at position {position} is not used by the {protocol} protocol")]
    UnsupportedBasis {
        basis: Basis,
        position: usize,
        protocol: &'static str,
    },

    #[error("custom protocol supports 2, 3 or 4 bases, got {0}")]
    InvalidBasisCount(usize),

    #[error("{name} must lie in [{min}, {max}], got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Failures of an entropy backend. These are recovered by falling back to the
/// next tier and never reach the caller unless the top tier was required.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntropyError {
    #[error("entropy backend {0} is unavailable")]
    Unavailable(String),

    #[error("no hardware credential configured for {0}")]
    MissingCredential(String),

    #[error("job on {backend} timed out after {seconds}s")]
    Timeout { backend: String, seconds: u64 },

    #[error("malformed result from {backend}: {detail}")]
    MalformedResult { backend: String, detail: String },
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
