//! Single-run orchestration of the BB84 pipeline.
//!
//! ```text
//! Idle → Preparing → Transmitting → Sifting → SecurityCheck
//!                                                 ├─ Aborted            (insecure + abort policy)
//!                                                 └─ Correcting → Amplifying → Complete
//! ```
//!
//! One seed drives every draw of a run (entropy fallback, basis choices,
//! channel, Eve, Bob and the Toeplitz matrix), so a seeded request always
//! reproduces the same result.

use bb84::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{Backend, InsecurePolicy, RngType, Scenario, SimulationRequest, REAL_QUANTUM_MAX_QUBITS};
use crate::error::{Result, SimError};
use crate::metrics::{self, Metrics};
use crate::sim_log::{LogEntry, SimulationLog};
use crate::wire;

/// Qubits per shot of the simulated QRNG register.
pub const QRNG_REGISTER_WIDTH: usize = 8;
const QRNG_SEED_SALT: u64 = 0x5152_4e47;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Preparing,
    Transmitting,
    Sifting,
    SecurityCheck,
    Aborted,
    Correcting,
    Amplifying,
    Complete,
}

/// Everything a run produced, serialized as one flat record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub protocol_variant: ProtocolKind,
    pub protocol_description: String,
    pub backend: Backend,
    pub rng_tier: EntropyTier,
    pub entropy_source: String,
    pub quantum_bits_generated: bool,
    pub seed: u64,
    pub photon_rate_mhz: f64,
    pub distance_m: f64,
    pub channel_noise: f64,
    pub qber_threshold: f64,
    /// Bits as prepared. Decoy vacuum pulses read 0 even when manual input
    /// asked for 1; the run log counts them.
    #[serde(with = "wire::bits")]
    pub alice_bits: Vec<bool>,
    #[serde(with = "wire::bases")]
    pub alice_bases: Vec<Basis>,
    #[serde(with = "wire::symbols")]
    pub bob_bits: Vec<Symbol>,
    #[serde(with = "wire::bases")]
    pub bob_bases: Vec<Basis>,
    /// Empty unless Eve ran intercept-resend.
    #[serde(with = "wire::bases")]
    pub eve_bases: Vec<Basis>,
    #[serde(with = "wire::bits")]
    pub alice_sifted: Vec<bool>,
    #[serde(with = "wire::bits")]
    pub bob_sifted: Vec<bool>,
    #[serde(with = "wire::bits")]
    pub final_key: Vec<bool>,
    /// Before the variant's adjustment.
    pub raw_qber: f64,
    pub qber: f64,
    pub is_secure: bool,
    pub verdict: SecurityVerdict,
    /// States visited, in order.
    pub states: Vec<RunState>,
    pub errors_corrected: usize,
    pub leaked_bits: usize,
    /// Whether Bob's amplified key equals Alice's.
    pub keys_match: bool,
    pub photons_lost: usize,
    pub channel_error_rate: f64,
    pub eve_detection_probability: f64,
    pub metrics: Metrics,
    pub logs: Vec<LogEntry>,
}

impl SimulationResult {
    pub fn final_state(&self) -> RunState {
        self.states.last().copied().unwrap_or(RunState::Idle)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Builds the hardware entropy client for a run from the caller's credential.
pub type HardwareFactory = Box<dyn Fn(Option<&str>) -> Box<dyn EntropySource> + Send + Sync>;

pub struct SimulationOrchestrator {
    hardware: HardwareFactory,
}

impl Default for SimulationOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationOrchestrator {
    /// No device client is linked: hardware requests fall back to the
    /// simulated QRNG.
    pub fn new() -> Self {
        SimulationOrchestrator {
            hardware: Box::new(|credential: Option<&str>| -> Box<dyn EntropySource> {
                Box::new(UnlinkedHardware::new(credential.map(str::to_string)))
            }),
        }
    }

    pub fn with_hardware(hardware: HardwareFactory) -> Self {
        SimulationOrchestrator { hardware }
    }

    /// Runs one simulation synchronously.
    ///
    /// Fails only on invalid input, or when `require_true_randomness` is set
    /// and no hardware tier answered. Nothing is logged before validation
    /// passes.
    pub fn run(&self, request: &SimulationRequest) -> Result<SimulationResult> {
        request.validate()?;
        let params = &request.parameters;
        let variant = params.protocol_variant.strategy(&params.custom)?;

        let mut states = vec![RunState::Idle];
        let seed = request.seed.unwrap_or_else(rand::random::<u64>);
        let mut source = RandomSource::classical(seed);
        let mut log = SimulationLog::new();

        // Preparing
        states.push(RunState::Preparing);
        let (alice_bits, alice_bases, forced_bob_bases, provenance) = match &request.scenario {
            Scenario::Manual {
                alice_bits,
                alice_bases,
                bob_bases,
            } => {
                let bits = parse_bits(alice_bits)?;
                let bases = parse_bases(alice_bases)?;
                variant.validate_bases(&bases)?;
                let forced = match bob_bases {
                    Some(text) => {
                        let bob = parse_bases(text)?;
                        variant.validate_bases(&bob)?;
                        Some(bob)
                    }
                    None => None,
                };
                log.info(format!(
                    "Starting {} simulation with manual input ({} qubits)",
                    variant.name(),
                    bits.len()
                ));
                let provenance = Provenance {
                    tier: EntropyTier::Classical,
                    source: "manual".to_string(),
                };
                (bits, bases, forced, provenance)
            }
            Scenario::Auto { num_qubits } => {
                log.info(format!("Starting {} simulation with {:?} RNG", variant.name(), request.rng));
                let mut n = *num_qubits;
                if params.backend == Backend::RealQuantum && n > REAL_QUANTUM_MAX_QUBITS {
                    n = REAL_QUANTUM_MAX_QUBITS;
                    log.warning(format!("Limited to {} qubits for real quantum device", n));
                }
                let generated = self.generate_bits(request, seed, &mut source, n, &mut log)?;
                let provenance = Provenance {
                    tier: generated.tier,
                    source: generated.source,
                };
                let bases = (0..n).map(|_| variant.choose_basis(source.rng_mut())).collect();
                (generated.bits, bases, None, provenance)
            }
        };

        let rng = source.rng_mut();
        let mut photons: Vec<Photon> = alice_bits
            .iter()
            .zip(&alice_bases)
            .map(|(&bit, &basis)| variant.prepare_in(bit, basis, rng))
            .collect();
        // the vacuum pulses of the decoy protocol carry 0 whatever was asked
        let prepared: Vec<bool> = photons.iter().map(|p| p.bit).collect();
        let rewritten = alice_bits.iter().zip(&prepared).filter(|(asked, sent)| asked != sent).count();
        if rewritten > 0 {
            log.warning(format!(
                "{} vacuum pulses carry bit 0 instead of the requested value",
                rewritten
            ));
        }
        let alice_bits = prepared;
        log.info(format!(
            "Alice prepares {} qubits: {}",
            photons.len(),
            params.protocol_variant.description()
        ));

        // Transmitting
        states.push(RunState::Transmitting);
        let channel = ChannelModel::new(params.distance_m, params.channel_noise);
        let stats = channel.transmit_photons(&mut photons, rng);
        log.info(format!(
            "Channel: {:.1}% loss probability, {} photons lost, {} flipped",
            channel.loss_probability() * 100.0,
            stats.lost,
            stats.flipped
        ));

        let interception = Eavesdropper::new(params.eve_attack, variant.basis_set()).intercept(&mut photons, rng);
        if params.eve_attack.is_active() {
            log.warning(format!(
                "Eve intercepts with {} attack ({} photons tampered)",
                params.eve_attack.label(),
                interception.corrupted + interception.wrong_basis
            ));
        }

        let detector = DetectorModel::ideal();
        let measurements: Vec<Measurement> = match &forced_bob_bases {
            Some(bases) => photons
                .iter()
                .zip(bases)
                .map(|(photon, &basis)| variant.measure_in(photon, basis, &detector, rng))
                .collect(),
            None => photons.iter().map(|photon| variant.measure(photon, &detector, rng)).collect(),
        };
        let bob_bits: Vec<Symbol> = measurements
            .iter()
            .map(|m| if m.detected { Symbol::Bit(m.bit) } else { Symbol::Undetected })
            .collect();
        let bob_bases: Vec<Basis> = measurements.iter().map(|m| m.basis).collect();
        log.info(if forced_bob_bases.is_some() {
            "Bob measures qubits with the given bases"
        } else {
            "Bob measures qubits with random bases"
        });

        // Sifting
        states.push(RunState::Sifting);
        let keys = sift(&alice_bits, &alice_bases, &bob_bits, &bob_bases)?;
        log.info(format!("Key sifting: {} bits retained", keys.len()));

        let raw_qber = qber(&keys.alice, &keys.bob);
        let qber = if keys.is_empty() {
            log.warning("No sifted bits survived; QBER reported as 1.0");
            raw_qber
        } else {
            let adjusted = variant.adjust_qber(raw_qber).clamp(0.0, 1.0);
            if params.protocol_variant != ProtocolKind::Bb84 {
                log.info(format!(
                    "{} QBER adjustment: {:.4} -> {:.4}",
                    variant.name(),
                    raw_qber,
                    adjusted
                ));
            }
            adjusted
        };

        // SecurityCheck
        states.push(RunState::SecurityCheck);
        let gate = SecurityGate::new(params.qber_threshold);
        let verdict = gate.verdict(qber, keys.len());
        let is_secure = gate.is_secure(qber);
        if is_secure {
            log.success(format!(
                "QBER: {:.3} < threshold {} - Secure",
                qber, params.qber_threshold
            ));
        } else {
            log.error(format!(
                "QBER: {:.3} >= threshold {} - Not Secure",
                qber, params.qber_threshold
            ));
        }

        let (final_key, errors_corrected, leaked_bits, keys_match) =
            if !is_secure && params.insecure_policy == InsecurePolicy::Abort {
                states.push(RunState::Aborted);
                log.error("Aborting: key discarded");
                (Vec::new(), 0, 0, true)
            } else {
                // Correcting
                states.push(RunState::Correcting);
                let reconciled = reconcile(params.error_correction, &keys.alice, &keys.bob)?;
                if params.error_correction == ErrorCorrectionMethod::None {
                    log.info("Skipping error correction (none selected)");
                } else {
                    log.info(format!(
                        "{:?} error correction: {} errors corrected, {} bits disclosed",
                        params.error_correction, reconciled.errors_corrected, reconciled.leaked_bits
                    ));
                }

                // Amplifying
                states.push(RunState::Amplifying);
                let method = params.privacy_amplification;
                let factor = params.amplification_factor;
                let alice_key = amplify(method, &reconciled.alice, factor, seed);
                let bob_key = amplify(method, &reconciled.bob, factor, seed);
                if method == PrivacyAmplificationMethod::None {
                    log.info("Skipping privacy amplification (none selected)");
                } else {
                    log.info(format!(
                        "{:?} privacy amplification: key reduced to {} bits",
                        method,
                        alice_key.len()
                    ));
                }
                let keys_match = alice_key == bob_key;
                if !keys_match {
                    log.warning("Bob's final key differs from Alice's");
                }
                states.push(RunState::Complete);
                (alice_key, reconciled.errors_corrected, reconciled.leaked_bits, keys_match)
            };

        let mut result = SimulationResult {
            protocol_variant: params.protocol_variant,
            protocol_description: variant.name().to_string(),
            backend: params.backend,
            rng_tier: provenance.tier,
            entropy_source: provenance.source,
            quantum_bits_generated: provenance.tier == EntropyTier::Hardware,
            seed,
            photon_rate_mhz: params.photon_rate_mhz,
            distance_m: params.distance_m,
            channel_noise: params.channel_noise,
            qber_threshold: params.qber_threshold,
            alice_bits,
            alice_bases,
            bob_bits,
            bob_bases,
            eve_bases: interception.eve_bases,
            alice_sifted: keys.alice,
            bob_sifted: keys.bob,
            final_key,
            raw_qber,
            qber,
            is_secure,
            verdict,
            states,
            errors_corrected,
            leaked_bits,
            keys_match,
            photons_lost: stats.lost + interception.removed,
            channel_error_rate: stats.channel_error_rate(),
            eve_detection_probability: interception.detection_probability,
            metrics: Metrics::default(),
            logs: Vec::new(),
        };
        result.metrics = metrics::compute(&result);
        if result.final_state() == RunState::Complete {
            log.success(format!("Simulation complete: {} key bits", result.final_key.len()));
        }
        result.logs = log.into_entries();
        Ok(result)
    }

    /// Alice's bits for auto mode, walking down the entropy tiers.
    fn generate_bits(
        &self,
        request: &SimulationRequest,
        seed: u64,
        source: &mut RandomSource,
        n: usize,
        log: &mut SimulationLog,
    ) -> Result<Generated> {
        let wants_quantum = request.rng == RngType::Quantum || request.parameters.backend == Backend::RealQuantum;
        if !wants_quantum && !request.require_true_randomness {
            log.info(format!(
                "Using {} for bit generation",
                match request.parameters.backend {
                    Backend::Simulator => "quantum simulator backend",
                    _ => "classical PRNG",
                }
            ));
            return Ok(source.bits(n));
        }

        let mut chained = std::mem::replace(source, RandomSource::classical(seed))
            .with_backend(Box::new(SimulatedQrng::new(seed ^ QRNG_SEED_SALT, QRNG_REGISTER_WIDTH)))
            .with_backend((self.hardware)(request.credential.as_deref()));

        let generated = if request.require_true_randomness {
            chained.try_bits(n, EntropyTier::Hardware).map_err(SimError::from)
        } else {
            Ok(chained.bits(n))
        };
        *source = chained;
        let generated = generated?;

        for (i, fallback) in generated.fallbacks.iter().enumerate() {
            let message = format!("{} unavailable ({}), falling back", fallback.source, fallback.error);
            if i == 0 {
                log.warning(message);
            } else {
                log.error(message);
            }
        }
        match generated.tier {
            EntropyTier::Hardware => log.success("Using real quantum device for bit generation"),
            EntropyTier::Simulator => log.info("Using quantum simulator for bit generation"),
            EntropyTier::Classical => log.warning("Quantum entropy unavailable, using classical PRNG"),
        }
        Ok(generated)
    }
}

struct Provenance {
    tier: EntropyTier,
    source: String,
}

/// Convenience wrapper around a default orchestrator.
pub fn simulate(request: &SimulationRequest) -> Result<SimulationResult> {
    SimulationOrchestrator::new().run(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationParameters;
    use crate::sim_log::LogLevel;

    fn quiet() -> SimulationParameters {
        SimulationParameters {
            distance_m: 0.0,
            channel_noise: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let request = SimulationRequest::auto(64).with_seed(9);
        let a = simulate(&request).unwrap();
        let b = simulate(&request).unwrap();
        assert_eq!(a.alice_bits, b.alice_bits);
        assert_eq!(a.bob_bits, b.bob_bits);
        assert_eq!(a.final_key, b.final_key);
        assert_eq!(a.metrics, b.metrics);
    }

    #[test]
    fn happy_path_visits_every_state() {
        let result = simulate(&SimulationRequest::auto(32).with_seed(1).with_parameters(quiet())).unwrap();
        assert_eq!(
            result.states,
            vec![
                RunState::Idle,
                RunState::Preparing,
                RunState::Transmitting,
                RunState::Sifting,
                RunState::SecurityCheck,
                RunState::Correcting,
                RunState::Amplifying,
                RunState::Complete,
            ]
        );
        assert!(result.keys_match);
        assert_eq!(result.alice_bits.len(), 32);
        assert_eq!(result.bob_bits.len(), 32);
    }

    #[test]
    fn abort_policy_discards_insecure_keys() {
        let params = SimulationParameters {
            eve_attack: AttackType::InterceptResend,
            insecure_policy: InsecurePolicy::Abort,
            ..quiet()
        };
        let result = simulate(&SimulationRequest::auto(2000).with_seed(5).with_parameters(params)).unwrap();
        assert!(!result.is_secure);
        assert_eq!(result.final_state(), RunState::Aborted);
        assert!(result.final_key.is_empty());
        assert_eq!(result.eve_bases.len(), 2000);
    }

    #[test]
    fn eve_bases_are_empty_without_intercept_resend() {
        let params = SimulationParameters {
            eve_attack: AttackType::TrojanHorse,
            ..quiet()
        };
        let result = simulate(&SimulationRequest::auto(100).with_seed(2).with_parameters(params)).unwrap();
        assert!(result.eve_bases.is_empty());
        assert_eq!(result.eve_detection_probability, 0.0);
    }

    #[test]
    fn real_quantum_auto_runs_are_capped() {
        let params = SimulationParameters {
            backend: Backend::RealQuantum,
            ..quiet()
        };
        let result = simulate(&SimulationRequest::auto(50).with_seed(4).with_parameters(params)).unwrap();
        assert_eq!(result.alice_bits.len(), REAL_QUANTUM_MAX_QUBITS);
        // no device client is linked
        assert_eq!(result.rng_tier, EntropyTier::Simulator);
        assert!(!result.quantum_bits_generated);
        assert!(result.logs.iter().any(|e| e.message.contains("Limited to 4 qubits")));
    }

    #[test]
    fn required_hardware_without_client_fails() {
        let mut request = SimulationRequest::auto(8).with_seed(3);
        request.require_true_randomness = true;
        request.credential = Some("token".to_string());
        let err = simulate(&request).unwrap_err();
        assert!(matches!(err, SimError::ExternalHardware(EntropyError::Unavailable(_))));

        request.credential = None;
        let err = simulate(&request).unwrap_err();
        assert!(matches!(err, SimError::ExternalHardware(EntropyError::MissingCredential(_))));
    }

    #[test]
    fn injected_hardware_client_is_used() {
        struct Fixed;
        impl EntropySource for Fixed {
            fn name(&self) -> &str {
                "fixed-device"
            }
            fn tier(&self) -> EntropyTier {
                EntropyTier::Hardware
            }
            fn generate(&mut self, n: usize) -> std::result::Result<Vec<bool>, EntropyError> {
                Ok(vec![true; n])
            }
        }
        let orchestrator = SimulationOrchestrator::with_hardware(Box::new(|_: Option<&str>| -> Box<dyn EntropySource> {
            Box::new(Fixed)
        }));
        let mut request = SimulationRequest::auto(4).with_seed(8).with_parameters(quiet());
        request.rng = RngType::Quantum;
        let result = orchestrator.run(&request).unwrap();
        assert!(result.quantum_bits_generated);
        assert_eq!(result.entropy_source, "fixed-device");
        assert_eq!(result.alice_bits, vec![true; 4]);
    }

    #[test]
    fn foreign_basis_is_rejected_before_running() {
        let request = SimulationRequest::manual("01", "+o");
        assert!(matches!(
            simulate(&request),
            Err(SimError::Protocol(ProtocolError::UnsupportedBasis { position: 1, .. }))
        ));
    }

    #[test]
    fn circular_bases_are_accepted_by_six_state() {
        let mut request = SimulationRequest::manual("011", "+ox").with_seed(1).with_parameters(SimulationParameters {
            protocol_variant: ProtocolKind::SixState,
            ..quiet()
        });
        if let Scenario::Manual { bob_bases, .. } = &mut request.scenario {
            *bob_bases = Some("+ox".into());
        }
        let result = simulate(&request).unwrap();
        assert_eq!(result.alice_sifted.len(), 3);
        assert_eq!(result.qber, 0.0);
    }

    #[test]
    fn decoy_vacuum_rewrites_are_logged() {
        let ones = "1".repeat(1000);
        let bases = "+".repeat(1000);
        let request = SimulationRequest::manual(&ones, &bases).with_seed(6).with_parameters(SimulationParameters {
            protocol_variant: ProtocolKind::Decoy,
            ..quiet()
        });
        let result = simulate(&request).unwrap();

        let zeros = result.alice_bits.iter().filter(|&&b| !b).count();
        assert!(zeros > 0);
        let entry = result
            .logs
            .iter()
            .find(|e| e.message.contains("vacuum pulses"))
            .unwrap();
        assert_eq!(entry.level, LogLevel::Warning);
        assert!(entry.message.starts_with(&format!("{} ", zeros)));
    }

    #[test]
    fn json_is_flat() {
        let result = simulate(&SimulationRequest::manual("0110", "+x+x").with_seed(2)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(value["alice_bits"], "0110");
        assert_eq!(value["alice_bases"], "+x+x");
        assert!(value["bob_bits"].as_str().unwrap().chars().all(|c| "01?".contains(c)));
        assert_eq!(value["eve_bases"], "");
        assert!(value["metrics"]["quantum_state_fidelity"].is_number());
        assert!(value["logs"][0]["timestamp"].is_string());
        let back: SimulationResult = serde_json::from_value(value).unwrap();
        assert_eq!(back.alice_bits, result.alice_bits);
    }
}
