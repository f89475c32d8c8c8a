//! # bb84
//!
//! Protocol primitives for the BB84 family of quantum key distribution
//! schemes: standard BB84, SARG04, decoy-state, six-state and a custom
//! variant.
//!
//! Photons are modelled classically (bit, basis, polarization angle, pulse
//! intensity) and every quantum effect is a closed-form probability:
//!
//! - **Channel**: fiber loss of 0.184 dB/km plus a noise term, loss capped at 85%
//! - **Eve**: intercept-resend, beam splitting, photon-number splitting, trojan horse
//! - **Post-processing**: sifting, QBER, Cascade / Winnow / LDPC reconciliation,
//!   standard / universal / Toeplitz privacy amplification
//!
//! All randomness flows through caller-supplied generators so a fixed seed
//! reproduces a run exactly.

pub mod bb84_protocol;
pub mod bb84_states;
pub mod channel;
pub mod eavesdropper;
pub mod error;
pub mod error_correction;
pub mod privacy_amplification;
pub mod random_source;
pub mod sifting;


pub use error::{EntropyError, ProtocolError};

pub mod prelude {
    pub use crate::bb84_protocol::*;
    pub use crate::bb84_states::*;
    pub use crate::channel::*;
    pub use crate::eavesdropper::*;
    pub use crate::error::{EntropyError, ProtocolError};
    pub use crate::error_correction::*;
    pub use crate::privacy_amplification::*;
    pub use crate::random_source::*;
    pub use crate::sifting::*;
}
