//! Security and performance metrics derived from a finished run.
//!
//! `compute` is a pure function of the result record. The backend fidelity
//! "measurement" is a bounded random draw, seeded from a SHA-256 fingerprint
//! of the record, so the same record always yields the same metrics.

use bb84::prelude::{binary_entropy, format_bases, format_bits, format_symbols, ChannelModel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ring::digest::{Context, SHA256};
use serde::{Deserialize, Serialize};

use crate::config::Backend;
use crate::engine::SimulationResult;
use crate::noise::{self, NoiseParams};
use crate::units::fiber_transit_ns;

/// Target ε of the leftover hash lemma.
pub const SECURITY_EPSILON: f64 = 1e-10;
/// QBER at which BB84 stops producing key (Shor–Preskill).
pub const QBER_SECURITY_LIMIT: f64 = 0.11;
/// Nominal acquisition window one run stands for (s).
pub const ACQUISITION_WINDOW_S: f64 = 1.0;
pub const ENTANGLEMENT_FIDELITY_FACTOR: f64 = 0.9;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub quantum_state_fidelity: f64,
    pub lab_state_fidelity: f64,
    pub entanglement_fidelity: f64,
    pub decoherence_rate_hz: f64,
    pub decoherence_rate_mhz: f64,
    pub coherence_time_ns: f64,
    pub transmission_time_ns: f64,
    pub privacy_amplification_ratio: f64,
    pub pa_compression_factor: f64,
    pub pa_information_leaked_bits: f64,
    pub security_parameter_bits: f64,
    pub secure_key_bound_bits: f64,
    pub pa_efficiency: f64,
    pub qber_entropy: f64,
    /// Final key bits per transmitted photon (%)
    pub channel_efficiency: f64,
    pub key_generation_rate_kbps: f64,
    pub speed_index: f64,
    pub quantum_score: f64,
    pub classical_score: f64,
    pub security_level: f64,
    pub error_rate_percent: f64,
    pub key_accuracy: f64,
    pub channel_error_rate: f64,
    pub eve_detection_probability: f64,
    pub channel_quality_score: f64,
    pub overall_system_efficiency: f64,
}

/// Leftover-hash accounting for one amplification step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrivacyMetrics {
    pub ratio: f64,
    pub compression_factor: f64,
    pub information_leaked_bits: f64,
    pub security_parameter_bits: f64,
    /// `max(0, n − H₂(e)·n − log2(1/ε))`
    pub secure_key_bound_bits: f64,
    pub theoretical_max_ratio: f64,
    /// Achieved ratio over the bound, at most 1
    pub efficiency: f64,
    pub qber_entropy: f64,
}

impl PrivacyMetrics {
    pub fn compute(sifted_len: usize, final_len: usize, qber: f64) -> Self {
        if sifted_len == 0 {
            return Self::default();
        }
        let n = sifted_len as f64;
        let ratio = final_len as f64 / n;
        let qber_entropy = binary_entropy(qber);
        // at 50% and above Eve may know everything
        let information_leaked_bits = if qber < 0.5 { qber_entropy * n } else { n };
        let security_parameter_bits = -SECURITY_EPSILON.log2();
        let secure_key_bound_bits = (n - information_leaked_bits - security_parameter_bits).max(0.0);
        let theoretical_max_ratio = secure_key_bound_bits / n;
        let efficiency = if theoretical_max_ratio > 0.0 {
            (ratio / theoretical_max_ratio).min(1.0)
        } else {
            0.0
        };
        PrivacyMetrics {
            ratio,
            compression_factor: 1.0 - ratio,
            information_leaked_bits,
            security_parameter_bits,
            secure_key_bound_bits,
            theoretical_max_ratio,
            efficiency,
            qber_entropy,
        }
    }
}

/// Headline scores shown next to a run, all in [0, 100].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub quantum_score: f64,
    pub classical_score: f64,
    pub security_level: f64,
    pub speed_index: f64,
    pub channel_efficiency: f64,
}

impl Scores {
    pub fn compute(qber: f64, key_len: usize, photons: usize, elapsed_s: f64) -> Self {
        let key_len = key_len as f64;
        let speed_index = if elapsed_s > 0.0 {
            key_len / elapsed_s / 10.0 * 100.0
        } else {
            0.0
        };
        let channel_efficiency = if photons > 0 {
            key_len / photons as f64 * 100.0
        } else {
            0.0
        };
        Scores {
            quantum_score: percent(100.0 - qber * 10.0),
            classical_score: percent(85.0 - qber * 5.0),
            security_level: percent((1.0 - qber / QBER_SECURITY_LIMIT) * 100.0),
            speed_index: percent(speed_index),
            channel_efficiency: percent(channel_efficiency),
        }
    }
}

fn percent(x: f64) -> f64 {
    x.clamp(0.0, 100.0)
}

/// Fidelity a backend reports for prepared states. Simulators land in
/// 0.95 ± 0.05, hardware in 0.85 ± 0.10.
pub fn backend_fidelity<R: Rng + ?Sized>(backend: Backend, rng: &mut R) -> f64 {
    match backend {
        Backend::Classical => 1.0,
        Backend::Simulator => 0.95 + rng.gen_range(-0.05..=0.05),
        Backend::RealQuantum => 0.85 + rng.gen_range(-0.10..=0.10),
    }
}

/// SHA-256 over the parts of the record the metrics depend on.
pub fn fingerprint(result: &SimulationResult) -> u64 {
    let mut context = Context::new(&SHA256);
    for field in [
        format_bits(&result.alice_bits),
        format_bases(&result.alice_bases),
        format_symbols(&result.bob_bits),
        format_bases(&result.bob_bases),
        format_bits(&result.final_key),
        result.backend.label().to_string(),
    ] {
        context.update(field.as_bytes());
        context.update(b"|");
    }
    context.update(&result.qber.to_le_bytes());
    context.update(&result.seed.to_le_bytes());
    let digest = context.finish();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_ref()[..8]);
    u64::from_le_bytes(head)
}

pub fn compute(result: &SimulationResult) -> Metrics {
    let mut rng = StdRng::seed_from_u64(fingerprint(result));
    let quantum_state_fidelity = backend_fidelity(result.backend, &mut rng);

    let km = result.distance_m / 1000.0;
    let channel = ChannelModel::new(result.distance_m, result.channel_noise);
    let link = NoiseParams::default().with_channel_transmission(channel.transmission_probability());
    let transmission_time_ns = fiber_transit_ns(km);
    let budget = noise::compute_noise_budget(&link, transmission_time_ns, km);
    let measured = noise::measurement_fidelity(
        &result.alice_bits,
        &result.alice_bases,
        &result.bob_bits,
        &result.bob_bases,
    );
    let lab_state_fidelity = noise::lab_state_fidelity(measured, &link);

    let sifted = result.alice_sifted.len();
    let final_len = result.final_key.len();
    let privacy = PrivacyMetrics::compute(sifted, final_len, result.qber);
    let scores = Scores::compute(result.qber, final_len, result.alice_bits.len(), ACQUISITION_WINDOW_S);

    Metrics {
        quantum_state_fidelity,
        lab_state_fidelity,
        entanglement_fidelity: quantum_state_fidelity * ENTANGLEMENT_FIDELITY_FACTOR,
        decoherence_rate_hz: budget.decoherence_rate_hz,
        decoherence_rate_mhz: budget.decoherence_rate_hz / 1e6,
        coherence_time_ns: budget.coherence_time_ns,
        transmission_time_ns,
        privacy_amplification_ratio: privacy.ratio,
        pa_compression_factor: privacy.compression_factor,
        pa_information_leaked_bits: privacy.information_leaked_bits,
        security_parameter_bits: privacy.security_parameter_bits,
        secure_key_bound_bits: privacy.secure_key_bound_bits,
        pa_efficiency: privacy.efficiency,
        qber_entropy: privacy.qber_entropy,
        channel_efficiency: scores.channel_efficiency,
        key_generation_rate_kbps: final_len as f64 * result.photon_rate_mhz / 1000.0,
        speed_index: scores.speed_index,
        quantum_score: scores.quantum_score,
        classical_score: scores.classical_score,
        security_level: scores.security_level,
        error_rate_percent: result.qber * 100.0,
        key_accuracy: if result.qber < 1.0 { 1.0 - result.qber } else { 0.0 },
        channel_error_rate: result.channel_error_rate,
        eve_detection_probability: result.eve_detection_probability,
        channel_quality_score: lab_state_fidelity * (1.0 - result.qber) * privacy.efficiency * 100.0,
        overall_system_efficiency: final_len as f64 / result.alice_bits.len().max(1) as f64
            * lab_state_fidelity
            * 100.0,
    }
}
