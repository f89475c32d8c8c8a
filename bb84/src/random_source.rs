//! Bit and basis generation with tiered entropy backends.
//!
//! The classical pseudo-random generator is always present and terminates the
//! fallback chain, so generation itself never fails. Higher tiers (a simulated
//! QRNG, an injected hardware client) are tried first, highest tier first.

use log::{debug, error, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::bb84_states::Basis;
use crate::error::EntropyError;

/// Where a batch of random bits came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntropyTier {
    Classical,
    Simulator,
    Hardware,
}

/// A pluggable randomness backend.
pub trait EntropySource: Send {
    fn name(&self) -> &str;
    fn tier(&self) -> EntropyTier;
    fn generate(&mut self, n: usize) -> Result<Vec<bool>, EntropyError>;
}

/// Seeded pseudo-random bits.
pub struct ClassicalSource {
    rng: StdRng,
}

impl ClassicalSource {
    pub fn seeded(seed: u64) -> Self {
        ClassicalSource {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        ClassicalSource {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn draw(&mut self, n: usize) -> Vec<bool> {
        (0..n).map(|_| self.rng.gen()).collect()
    }
}

impl EntropySource for ClassicalSource {
    fn name(&self) -> &str {
        "classical-prng"
    }

    fn tier(&self) -> EntropyTier {
        EntropyTier::Classical
    }

    fn generate(&mut self, n: usize) -> Result<Vec<bool>, EntropyError> {
        Ok(self.draw(n))
    }
}

/// Simulated quantum RNG: a register of qubits is put through Hadamard gates
/// and measured, one shot per register readout, until enough bits exist.
pub struct SimulatedQrng {
    rng: StdRng,
    register_width: usize,
}

impl SimulatedQrng {
    pub fn new(seed: u64, register_width: usize) -> Self {
        SimulatedQrng {
            rng: StdRng::seed_from_u64(seed),
            register_width: register_width.max(1),
        }
    }

    fn shot(&mut self) -> Vec<bool> {
        // H|0> = (|0> + |1>)/√2, so P(1) = |1/√2|² for every qubit.
        let p_one = std::f64::consts::FRAC_1_SQRT_2.powi(2);
        (0..self.register_width)
            .map(|_| self.rng.gen::<f64>() < p_one)
            .collect()
    }
}

impl EntropySource for SimulatedQrng {
    fn name(&self) -> &str {
        "simulated-qrng"
    }

    fn tier(&self) -> EntropyTier {
        EntropyTier::Simulator
    }

    fn generate(&mut self, n: usize) -> Result<Vec<bool>, EntropyError> {
        let shots = (n + self.register_width - 1) / self.register_width;
        let mut bits: Vec<bool> = (0..shots).flat_map(|_| self.shot()).collect();
        bits.truncate(n);
        Ok(bits)
    }
}

/// Hardware slot used when no device client has been linked in. It only
/// distinguishes "no credential" from "credential but nothing to talk to".
pub struct UnlinkedHardware {
    credential: Option<String>,
}

impl UnlinkedHardware {
    pub fn new(credential: Option<String>) -> Self {
        UnlinkedHardware { credential }
    }
}

impl EntropySource for UnlinkedHardware {
    fn name(&self) -> &str {
        "quantum-hardware"
    }

    fn tier(&self) -> EntropyTier {
        EntropyTier::Hardware
    }

    fn generate(&mut self, _n: usize) -> Result<Vec<bool>, EntropyError> {
        match self.credential.as_deref() {
            None | Some("") => Err(EntropyError::MissingCredential(self.name().to_string())),
            Some(_) => Err(EntropyError::Unavailable(format!(
                "{} (no device client linked)",
                self.name()
            ))),
        }
    }
}

/// A backend failure that was recovered by dropping to the next tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackEvent {
    pub source: String,
    pub tier: EntropyTier,
    pub error: EntropyError,
}

/// Bits plus the provenance the result record needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub bits: Vec<bool>,
    pub tier: EntropyTier,
    pub source: String,
    pub fallbacks: Vec<FallbackEvent>,
}

impl Generated {
    pub fn quantum_bits_generated(&self) -> bool {
        self.tier == EntropyTier::Hardware
    }
}

/// Random bits and bases for one simulation run.
///
/// The classical tier ends the chain. Its generator is also lent out to the
/// rest of the pipeline so that a fixed seed reproduces the whole run.
pub struct RandomSource {
    backends: Vec<Box<dyn EntropySource>>,
    classical: ClassicalSource,
}

impl RandomSource {
    pub fn classical(seed: u64) -> Self {
        RandomSource {
            backends: Vec::new(),
            classical: ClassicalSource::seeded(seed),
        }
    }

    pub fn from_entropy() -> Self {
        RandomSource {
            backends: Vec::new(),
            classical: ClassicalSource::from_entropy(),
        }
    }

    /// Adds a backend ahead of the classical fallback. Backends are kept
    /// sorted so higher tiers are tried first.
    pub fn with_backend(mut self, backend: Box<dyn EntropySource>) -> Self {
        self.backends.push(backend);
        self.backends.sort_by(|a, b| b.tier().cmp(&a.tier()));
        self
    }

    pub fn highest_tier(&self) -> EntropyTier {
        self.backends
            .first()
            .map(|b| b.tier())
            .unwrap_or(EntropyTier::Classical)
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.classical.rng
    }

    /// `n` bits from the best backend that answers.
    pub fn bits(&mut self, n: usize) -> Generated {
        let mut fallbacks = Vec::new();

        for backend in self.backends.iter_mut() {
            match backend.generate(n) {
                Ok(bits) if bits.len() == n => {
                    debug!("{} bits from {}", n, backend.name());
                    return Generated {
                        bits,
                        tier: backend.tier(),
                        source: backend.name().to_string(),
                        fallbacks,
                    };
                }
                Ok(bits) => {
                    fallbacks.push(FallbackEvent {
                        source: backend.name().to_string(),
                        tier: backend.tier(),
                        error: EntropyError::MalformedResult {
                            backend: backend.name().to_string(),
                            detail: format!("expected {} bits, got {}", n, bits.len()),
                        },
                    });
                }
                Err(err) => {
                    fallbacks.push(FallbackEvent {
                        source: backend.name().to_string(),
                        tier: backend.tier(),
                        error: err,
                    });
                }
            }
            let event = &fallbacks[fallbacks.len() - 1];
            if fallbacks.len() == 1 {
                warn!("{} failed, falling back: {}", event.source, event.error);
            } else {
                error!("{} failed, falling back: {}", event.source, event.error);
            }
        }

        Generated {
            bits: self.classical.draw(n),
            tier: self.classical.tier(),
            source: self.classical.name().to_string(),
            fallbacks,
        }
    }

    /// Like [`bits`](Self::bits) but fails when `required` could not be
    /// reached.
    pub fn try_bits(&mut self, n: usize, required: EntropyTier) -> Result<Generated, EntropyError> {
        let generated = self.bits(n);
        if generated.tier >= required {
            return Ok(generated);
        }
        let cause = generated
            .fallbacks
            .into_iter()
            .find(|f| f.tier >= required)
            .map(|f| f.error)
            .unwrap_or_else(|| EntropyError::Unavailable(format!("{:?} tier", required)));
        Err(cause)
    }

    /// `n` bases drawn uniformly from `set`.
    pub fn bases(&mut self, n: usize, set: &[Basis]) -> Vec<Basis> {
        (0..n).map(|_| Basis::random(set, &mut self.classical.rng)).collect()
    }
}
