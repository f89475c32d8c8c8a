//! Run configuration.
//!
//! Every struct deserializes with `#[serde(default)]`, so a TOML file or JSON
//! request only needs the fields it changes. `validate` runs before any
//! simulation state is touched.

use std::path::Path;

use bb84::prelude::{
    parse_bases, parse_bits, AttackType, CustomProtocolConfig, ErrorCorrectionMethod,
    PrivacyAmplificationMethod, ProtocolKind, SecurityGate, DEFAULT_AMPLIFICATION_FACTOR,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Largest auto-mode run accepted.
pub const MAX_QUBITS: usize = 1_000_000;
/// Auto-mode qubit cap on real hardware.
pub const REAL_QUANTUM_MAX_QUBITS: usize = 4;

/// Where the run nominally executes. Only the metrics model and the entropy
/// tier differ; the protocol itself is always simulated.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    Classical,
    #[serde(alias = "qiskit")]
    Simulator,
    RealQuantum,
}

impl Backend {
    pub fn label(self) -> &'static str {
        match self {
            Backend::Classical => "classical",
            Backend::Simulator => "simulator",
            Backend::RealQuantum => "real_quantum",
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RngType {
    #[default]
    Classical,
    Quantum,
}

/// What to do once the security gate fails.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsecurePolicy {
    /// Finish reconciliation and amplification and report `is_secure = false`.
    #[default]
    Continue,
    /// Stop after the security check with an empty final key.
    Abort,
}

/// Physical and protocol parameters of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParameters {
    /// Source repetition rate (MHz)
    pub photon_rate_mhz: f64,
    /// Fiber length (m)
    pub distance_m: f64,
    /// Per-photon flip probability, also drives the atmospheric loss term
    pub channel_noise: f64,
    /// QBER at or above which the key is rejected
    pub qber_threshold: f64,
    pub eve_attack: AttackType,
    pub error_correction: ErrorCorrectionMethod,
    pub privacy_amplification: PrivacyAmplificationMethod,
    /// Retained fraction for standard and Toeplitz amplification
    pub amplification_factor: f64,
    pub protocol_variant: ProtocolKind,
    pub backend: Backend,
    pub insecure_policy: InsecurePolicy,
    /// Only read when `protocol_variant` is `custom`
    pub custom: CustomProtocolConfig,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            photon_rate_mhz: 100.0,
            distance_m: 1_000.0,
            channel_noise: 0.01,
            qber_threshold: SecurityGate::DEFAULT_THRESHOLD,
            eve_attack: AttackType::None,
            error_correction: ErrorCorrectionMethod::Cascade,
            privacy_amplification: PrivacyAmplificationMethod::Standard,
            amplification_factor: DEFAULT_AMPLIFICATION_FACTOR,
            protocol_variant: ProtocolKind::Bb84,
            backend: Backend::Classical,
            insecure_policy: InsecurePolicy::Continue,
            custom: CustomProtocolConfig::default(),
        }
    }
}

impl SimulationParameters {
    pub fn distance_km(&self) -> f64 {
        self.distance_m / 1000.0
    }

    pub fn validate(&self) -> Result<()> {
        positive("photon_rate_mhz", self.photon_rate_mhz)?;
        if !(self.distance_m >= 0.0) || !self.distance_m.is_finite() {
            return Err(SimError::invalid(format!(
                "distance_m must be a finite non-negative length, got {}",
                self.distance_m
            )));
        }
        within("channel_noise", self.channel_noise, 0.0, 1.0)?;
        if !(self.qber_threshold > 0.0 && self.qber_threshold <= 1.0) {
            return Err(SimError::invalid(format!(
                "qber_threshold must lie in (0, 1], got {}",
                self.qber_threshold
            )));
        }
        if !(self.amplification_factor > 0.0 && self.amplification_factor <= 1.0) {
            return Err(SimError::invalid(format!(
                "amplification_factor must lie in (0, 1], got {}",
                self.amplification_factor
            )));
        }
        if self.protocol_variant == ProtocolKind::Custom {
            self.custom.validate()?;
        }
        Ok(())
    }
}

/// How Alice's qubits are chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Scenario {
    /// Bits `0/1` and bases `+/x/o` typed by the user. Bob's bases are
    /// random unless given.
    Manual {
        alice_bits: String,
        alice_bases: String,
        #[serde(default)]
        bob_bases: Option<String>,
    },
    /// Bits and bases drawn from the random source.
    Auto { num_qubits: usize },
}

impl Default for Scenario {
    fn default() -> Self {
        Scenario::Auto { num_qubits: 16 }
    }
}

/// Everything the orchestrator needs for a single run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationRequest {
    pub scenario: Scenario,
    pub rng: RngType,
    /// Fail instead of falling back when hardware entropy is unreachable
    pub require_true_randomness: bool,
    /// Opaque token handed to a hardware entropy client
    pub credential: Option<String>,
    /// Seed for every random draw of the run; fresh entropy when absent
    pub seed: Option<u64>,
    pub parameters: SimulationParameters,
}

impl SimulationRequest {
    pub fn manual(alice_bits: &str, alice_bases: &str) -> Self {
        SimulationRequest {
            scenario: Scenario::Manual {
                alice_bits: alice_bits.to_string(),
                alice_bases: alice_bases.to_string(),
                bob_bases: None,
            },
            ..Default::default()
        }
    }

    pub fn auto(num_qubits: usize) -> Self {
        SimulationRequest {
            scenario: Scenario::Auto { num_qubits },
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_parameters(mut self, parameters: SimulationParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Checks ranges and the manual strings. Whether the bases belong to the
    /// selected variant is checked once the strategy exists.
    pub fn validate(&self) -> Result<()> {
        self.parameters.validate()?;
        match &self.scenario {
            Scenario::Manual {
                alice_bits,
                alice_bases,
                bob_bases,
            } => {
                let bits = parse_bits(alice_bits)?;
                let bases = parse_bases(alice_bases)?;
                if bits.is_empty() {
                    return Err(SimError::invalid("manual input needs at least one qubit"));
                }
                if bits.len() != bases.len() {
                    return Err(SimError::invalid(format!(
                        "bits and bases must have the same length ({} vs {})",
                        bits.len(),
                        bases.len()
                    )));
                }
                if let Some(bob) = bob_bases {
                    let bob = parse_bases(bob)?;
                    if bob.len() != bits.len() {
                        return Err(SimError::invalid(format!(
                            "bob_bases has {} symbols for {} qubits",
                            bob.len(),
                            bits.len()
                        )));
                    }
                }
            }
            Scenario::Auto { num_qubits } => {
                if *num_qubits == 0 || *num_qubits > MAX_QUBITS {
                    return Err(SimError::invalid(format!(
                        "num_qubits must lie in 1..={}, got {}",
                        MAX_QUBITS, num_qubits
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Per-photon lab model parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabParameters {
    /// Source repetition rate (MHz)
    pub photon_rate_mhz: f64,
    /// Total channel attenuation (dB)
    pub channel_loss_db: f64,
    /// Probability of the rectilinear basis for standard BB84
    pub basis_selection_probability: f64,
    /// Abort threshold (%)
    pub qber_threshold_percent: f64,
    /// Fraction of photons Eve targets, in [0, 1]
    pub eve_interception_rate: f64,
    pub attack_strategy: AttackType,
    /// Detector quantum efficiency (%)
    pub detector_efficiency_percent: f64,
    /// Detector dark count rate (Hz)
    pub dark_count_rate_hz: f64,
    /// Half-width of the uniform polarization drift (degrees)
    pub polarization_drift_degrees: f64,
    /// Fiber length used by the decoherence and timing metrics (km)
    pub distance_km: f64,
    pub protocol_variant: ProtocolKind,
    pub custom: CustomProtocolConfig,
}

impl Default for LabParameters {
    fn default() -> Self {
        // Cooled InGaAs APD on G.652.D fiber
        Self {
            photon_rate_mhz: 200.0,
            channel_loss_db: 0.184,
            basis_selection_probability: 0.5,
            qber_threshold_percent: 8.5,
            eve_interception_rate: 0.0,
            attack_strategy: AttackType::None,
            detector_efficiency_percent: 23.7,
            dark_count_rate_hz: 280.0,
            polarization_drift_degrees: 0.05,
            distance_km: 10.0,
            protocol_variant: ProtocolKind::Bb84,
            custom: CustomProtocolConfig::default(),
        }
    }
}

impl LabParameters {
    pub fn validate(&self) -> Result<()> {
        positive("photon_rate_mhz", self.photon_rate_mhz)?;
        within("channel_loss_db", self.channel_loss_db, 0.0, f64::MAX)?;
        within("basis_selection_probability", self.basis_selection_probability, 0.0, 1.0)?;
        within("qber_threshold_percent", self.qber_threshold_percent, 0.0, 100.0)?;
        within("eve_interception_rate", self.eve_interception_rate, 0.0, 1.0)?;
        within("detector_efficiency_percent", self.detector_efficiency_percent, 0.0, 100.0)?;
        within("dark_count_rate_hz", self.dark_count_rate_hz, 0.0, f64::MAX)?;
        within("polarization_drift_degrees", self.polarization_drift_degrees, 0.0, 180.0)?;
        within("distance_km", self.distance_km, 0.0, f64::MAX)?;
        if self.protocol_variant == ProtocolKind::Custom {
            self.custom.validate()?;
        }
        Ok(())
    }
}

/// Continuous mode timing and history sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuousConfig {
    /// Interval between batches (ms)
    pub tick_interval_ms: u64,
    /// Samples kept per rolling history
    pub history_capacity: usize,
    /// Samples returned per poll
    pub poll_window: usize,
    /// Upper bound on photons per batch
    pub max_batch: usize,
}

impl Default for ContinuousConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 500,
            history_capacity: 100,
            poll_window: 20,
            max_batch: 100,
        }
    }
}

impl ContinuousConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 || self.history_capacity == 0 || self.max_batch == 0 {
            return Err(SimError::invalid(
                "tick_interval_ms, history_capacity and max_batch must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub simulation: SimulationRequest,
    pub lab: LabParameters,
    /// Photons per lab run
    pub lab_photons: usize,
    pub continuous: ContinuousConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationRequest::default(),
            lab: LabParameters::default(),
            lab_photons: 10_000,
            continuous: ContinuousConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SimError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.simulation.validate()?;
        self.lab.validate()?;
        self.continuous.validate()
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0) || !value.is_finite() {
        return Err(SimError::invalid(format!("{} must be positive, got {}", name, value)));
    }
    Ok(())
}

fn within(name: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_nan() || value < min || value > max {
        return Err(SimError::invalid(format!(
            "{} must lie in [{}, {}], got {}",
            name, min, max, value
        )));
    }
    Ok(())
}
