//! Noise model of a room-temperature fiber link with an APD receiver.
//!
//! Decoherence is the sum of three channels, scaled to the photon's time of
//! flight:
//!
//! 1. **Environmental**: 1 MHz free-space baseline, ×0.1 inside fiber,
//!    growing 2% per km of channel.
//! 2. **Thermal**: k_B·T/h, scaled down by 10⁻⁹.
//! 3. **Polarization drift**: 100 kHz per 90° of drift.
//!
//! The total is normalized to a 1 µs flight and clamped to [1 kHz, 1 GHz].
//!
//! Fidelity of the received states multiplies the measured agreement on
//! matching bases with channel transmission, detector efficiency, a drift
//! term `1 − drift/180` and a dark-count term `1 / (1 + 100·λ)` where λ is
//! the expected dark counts per gate. It never exceeds 0.95.

use bb84::prelude::{Basis, Symbol};

use crate::config::LabParameters;
use crate::units::*;

/// Free-space environmental decoherence (Hz)
pub const BASELINE_DECOHERENCE_HZ: f64 = 1e6;
/// Suppression of environmental decoherence inside fiber
pub const FIBER_DECOHERENCE_COEFFICIENT: f64 = 0.1;
/// Relative growth of environmental decoherence per km
pub const DECOHERENCE_PER_KM: f64 = 0.02;
pub const MIN_DECOHERENCE_HZ: f64 = 1e3;
pub const MAX_DECOHERENCE_HZ: f64 = 1e9;
/// Ceiling on any reported state fidelity
pub const MAX_LAB_FIDELITY: f64 = 0.95;

/// Parameters for the link noise model.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseParams {
    /// Fiber temperature (K)
    pub temperature: f64,
    /// Half-width of the polarization drift (degrees)
    pub polarization_drift_degrees: f64,
    /// Detector dark count rate (Hz)
    pub dark_count_rate_hz: f64,
    /// Detector gate (s)
    pub detection_window_s: f64,
    /// Detector quantum efficiency in [0, 1]
    pub detector_efficiency: f64,
    /// Probability a photon survives the channel
    pub channel_transmission: f64,
}

impl NoiseParams {
    /// Lab defaults: cooled InGaAs APD, temperature-stabilized fiber.
    pub fn room_temperature_fiber() -> Self {
        Self::from_lab(&LabParameters::default())
    }

    pub fn from_lab(lab: &LabParameters) -> Self {
        Self {
            temperature: ROOM_TEMPERATURE,
            polarization_drift_degrees: lab.polarization_drift_degrees,
            dark_count_rate_hz: lab.dark_count_rate_hz,
            detection_window_s: DETECTION_WINDOW_S,
            detector_efficiency: lab.detector_efficiency_percent / 100.0,
            channel_transmission: db_to_transmission(lab.channel_loss_db),
        }
    }

    pub fn with_channel_transmission(mut self, transmission: f64) -> Self {
        self.channel_transmission = transmission.clamp(0.0, 1.0);
        self
    }

    /// Expected dark counts per detector gate.
    pub fn dark_counts_per_window(&self) -> f64 {
        self.dark_count_rate_hz * self.detection_window_s
    }
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self::room_temperature_fiber()
    }
}

/// Decoherence contributions for one transmission.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseBudget {
    /// Environmental rate after fiber suppression and distance growth (Hz)
    pub environmental_hz: f64,
    pub thermal_hz: f64,
    pub polarization_hz: f64,
    /// Sum of the above before time scaling (Hz)
    pub total_hz: f64,
    /// Reported decoherence rate (Hz)
    pub decoherence_rate_hz: f64,
    /// 1/rate (ns)
    pub coherence_time_ns: f64,
}

pub fn compute_noise_budget(params: &NoiseParams, transmission_time_ns: f64, channel_km: f64) -> NoiseBudget {
    let distance_factor = 1.0 + channel_km.max(0.0) * DECOHERENCE_PER_KM;
    let environmental_hz = BASELINE_DECOHERENCE_HZ * FIBER_DECOHERENCE_COEFFICIENT * distance_factor;
    let thermal_hz = thermal_frequency(params.temperature) * 1e-9;
    let polarization_hz = params.polarization_drift_degrees / 90.0 * 1e5;
    let total_hz = environmental_hz + thermal_hz + polarization_hz;

    // normalized to a 1 µs flight
    let decoherence_rate_hz =
        (total_hz * transmission_time_ns / 1000.0).clamp(MIN_DECOHERENCE_HZ, MAX_DECOHERENCE_HZ);

    NoiseBudget {
        environmental_hz,
        thermal_hz,
        polarization_hz,
        total_hz,
        decoherence_rate_hz,
        coherence_time_ns: 1e9 / decoherence_rate_hz,
    }
}

pub fn decoherence_rate_hz(params: &NoiseParams, transmission_time_ns: f64, channel_km: f64) -> f64 {
    compute_noise_budget(params, transmission_time_ns, channel_km).decoherence_rate_hz
}

pub fn polarization_fidelity(drift_degrees: f64) -> f64 {
    (1.0 - drift_degrees / 180.0).clamp(0.0, 1.0)
}

pub fn dark_count_fidelity(dark_counts_per_window: f64) -> f64 {
    1.0 / (1.0 + dark_counts_per_window.max(0.0) * 100.0)
}

/// Agreement between Alice and Bob over slots measured in the same basis
/// where Bob detected a photon. Zero when there is no such slot.
pub fn measurement_fidelity(
    alice_bits: &[bool],
    alice_bases: &[Basis],
    bob_symbols: &[Symbol],
    bob_bases: &[Basis],
) -> f64 {
    let mut matching = 0usize;
    let mut correct = 0usize;
    for (((&a, &ab), &b), &bb) in alice_bits.iter().zip(alice_bases).zip(bob_symbols).zip(bob_bases) {
        if ab != bb {
            continue;
        }
        if let Some(bit) = b.bit() {
            matching += 1;
            if bit == a {
                correct += 1;
            }
        }
    }
    if matching == 0 {
        0.0
    } else {
        correct as f64 / matching as f64
    }
}

/// Composite fidelity of the received states, capped at [`MAX_LAB_FIDELITY`].
pub fn lab_state_fidelity(measurement_fidelity: f64, params: &NoiseParams) -> f64 {
    let fidelity = measurement_fidelity
        * params.channel_transmission
        * params.detector_efficiency
        * polarization_fidelity(params.polarization_drift_degrees)
        * dark_count_fidelity(params.dark_counts_per_window());
    fidelity.clamp(0.0, MAX_LAB_FIDELITY)
}
