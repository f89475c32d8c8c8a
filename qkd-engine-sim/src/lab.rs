//! Per-photon lab simulator.
//!
//! Unlike the single-run engine, every photon here goes through the lossy
//! link and the noisy detector one at a time: preparation jitter, fiber
//! drift, Eve, attenuation, detector efficiency and dark counts. The sifted
//! key is compressed to the Shannon bound `n·(1 − 2H₂(e))`.

use bb84::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::{LabParameters, MAX_QUBITS};
use crate::error::{Result, SimError};
use crate::metrics::PrivacyMetrics;
use crate::noise::{self, NoiseParams};
use crate::sim_log::{LogEntry, SimulationLog};
use crate::units::{db_to_transmission, fiber_transit_ns, DETECTION_WINDOW_S};

/// Entries kept in a lab report's log.
pub const LAB_LOG_CAPACITY: usize = 50;
/// A progress entry is written every this many photons.
pub const PROGRESS_INTERVAL: usize = 1000;
/// Acquisition window the key rate is reported over (ms).
const KEY_RATE_WINDOW_MS: f64 = 10.0;

/// Physical figures of merit for a lab run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabMetrics {
    pub decoherence_rate_hz: f64,
    pub coherence_time_ns: f64,
    pub transmission_time_ns: f64,
    pub lab_state_fidelity: f64,
    /// `−10·log10(fidelity)`; absent when nothing was measured
    pub fidelity_loss_db: Option<f64>,
    pub privacy: PrivacyMetrics,
    pub channel_quality_score: f64,
    pub overall_system_efficiency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabReport {
    pub protocol_variant: ProtocolKind,
    pub seed: u64,
    pub photons_sent: usize,
    pub photons_received: usize,
    pub basis_matches: usize,
    pub eve_interceptions: usize,
    pub final_key_bits: usize,
    pub qber_percent: f64,
    pub detection_efficiency_percent: f64,
    pub basis_match_rate_percent: f64,
    pub key_rate_kbps: f64,
    pub security_threshold_met: bool,
    pub log: Vec<LogEntry>,
    pub metrics: LabMetrics,
}

pub struct LabSimulator {
    params: LabParameters,
}

impl LabSimulator {
    pub fn new(params: LabParameters) -> Result<Self> {
        params.validate()?;
        Ok(LabSimulator { params })
    }

    pub fn params(&self) -> &LabParameters {
        &self.params
    }

    fn variant(&self) -> Result<Box<dyn ProtocolVariant>> {
        Ok(match self.params.protocol_variant {
            ProtocolKind::Bb84 => Box::new(StandardBb84 {
                rectilinear_probability: self.params.basis_selection_probability,
            }),
            kind => kind.strategy(&self.params.custom)?,
        })
    }

    pub fn run(&self, num_photons: usize, seed: Option<u64>) -> Result<LabReport> {
        if num_photons == 0 || num_photons > MAX_QUBITS {
            return Err(SimError::invalid(format!(
                "num_photons must lie in 1..={}, got {}",
                MAX_QUBITS, num_photons
            )));
        }
        let p = &self.params;
        let variant = self.variant()?;
        let seed = seed.unwrap_or_else(rand::random::<u64>);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut log = SimulationLog::bounded(LAB_LOG_CAPACITY);

        let link = NoiseParams::from_lab(p);
        let transmission = db_to_transmission(p.channel_loss_db);
        let detector = DetectorModel::lab(
            link.detector_efficiency * transmission,
            p.dark_count_rate_hz,
            DETECTION_WINDOW_S,
        );
        let eve = Eavesdropper::new(p.attack_strategy, variant.basis_set());

        log.info(format!(
            "Starting {} lab run: {} photons at {} MHz",
            variant.name(),
            num_photons,
            p.photon_rate_mhz
        ));
        if p.attack_strategy.is_active() && p.eve_interception_rate > 0.0 {
            log.warning(format!(
                "Eve active: {:?} on {:.1}% of photons",
                p.attack_strategy,
                p.eve_interception_rate * 100.0
            ));
        }

        let mut alice_bits = Vec::with_capacity(num_photons);
        let mut alice_bases = Vec::with_capacity(num_photons);
        let mut bob_bits = Vec::with_capacity(num_photons);
        let mut bob_bases = Vec::with_capacity(num_photons);
        let mut eve_interceptions = 0;

        for i in 0..num_photons {
            let bit = rng.gen::<bool>();
            let mut photon = variant.prepare(bit, &mut rng);
            if p.polarization_drift_degrees > 0.0 {
                let drift = p.polarization_drift_degrees;
                photon.polarization_degrees += rng.gen_range(-drift..=drift);
            }
            if eve.tamper(&mut photon, p.eve_interception_rate, &mut rng) {
                eve_interceptions += 1;
            }
            let survives = rng.gen::<f64>() < transmission && !(photon.corrupted && rng.gen::<f64>() < 0.5);
            if !survives {
                photon.lose();
            }

            let measurement = variant.measure(&photon, &detector, &mut rng);
            alice_bits.push(photon.bit);
            alice_bases.push(photon.basis);
            bob_bits.push(if measurement.detected {
                Symbol::Bit(measurement.bit)
            } else {
                Symbol::Undetected
            });
            bob_bases.push(measurement.basis);

            if i > 0 && i % PROGRESS_INTERVAL == 0 {
                log.info(format!("Transmitted {} photons", i));
            }
        }

        let photons_received = bob_bits.iter().filter(|s| s.is_detected()).count();
        let sifted = sift(&alice_bits, &alice_bases, &bob_bits, &bob_bases)?;
        let basis_matches = sifted.len();
        log.info(format!(
            "Bob detected {} photons, {} in matching bases",
            photons_received, basis_matches
        ));

        let raw = qber(&sifted.alice, &sifted.bob);
        let qber = if sifted.is_empty() { raw } else { variant.adjust_qber(raw) };
        let threshold = p.qber_threshold_percent / 100.0;
        let security_threshold_met = qber <= threshold;

        let final_key_bits = if security_threshold_met {
            let bits = shannon_secure_length(basis_matches, qber);
            log.success(format!(
                "QBER {:.2}% within {:.2}%: {} secure bits",
                qber * 100.0,
                p.qber_threshold_percent,
                bits
            ));
            bits
        } else {
            log.error(format!(
                "QBER {:.2}% exceeds {:.2}%: key discarded",
                qber * 100.0,
                p.qber_threshold_percent
            ));
            0
        };

        let measured = noise::measurement_fidelity(&alice_bits, &alice_bases, &bob_bits, &bob_bases);
        let metrics = lab_metrics(p, &link, measured, num_photons, basis_matches, final_key_bits, qber);

        Ok(LabReport {
            protocol_variant: p.protocol_variant,
            seed,
            photons_sent: num_photons,
            photons_received,
            basis_matches,
            eve_interceptions,
            final_key_bits,
            qber_percent: qber * 100.0,
            detection_efficiency_percent: photons_received as f64 / num_photons as f64 * 100.0,
            basis_match_rate_percent: if photons_received > 0 {
                basis_matches as f64 / photons_received as f64 * 100.0
            } else {
                0.0
            },
            key_rate_kbps: final_key_bits as f64 / KEY_RATE_WINDOW_MS,
            security_threshold_met,
            log: log.into_entries(),
            metrics,
        })
    }
}

fn lab_metrics(
    p: &LabParameters,
    link: &NoiseParams,
    measured: f64,
    sent: usize,
    sifted: usize,
    final_bits: usize,
    qber: f64,
) -> LabMetrics {
    let transmission_time_ns = fiber_transit_ns(p.distance_km);
    let budget = noise::compute_noise_budget(link, transmission_time_ns, p.distance_km);
    let fidelity = noise::lab_state_fidelity(measured, link);
    let privacy = PrivacyMetrics::compute(sifted, final_bits, qber);
    LabMetrics {
        decoherence_rate_hz: budget.decoherence_rate_hz,
        coherence_time_ns: budget.coherence_time_ns,
        transmission_time_ns,
        lab_state_fidelity: fidelity,
        fidelity_loss_db: (fidelity > 0.0).then(|| -10.0 * fidelity.log10()),
        channel_quality_score: fidelity * (1.0 - qber) * privacy.efficiency * 100.0,
        overall_system_efficiency: final_bits as f64 / sent.max(1) as f64 * fidelity * 100.0,
        privacy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bright_link() -> LabParameters {
        LabParameters {
            channel_loss_db: 0.0,
            detector_efficiency_percent: 100.0,
            dark_count_rate_hz: 0.0,
            polarization_drift_degrees: 0.0,
            ..LabParameters::default()
        }
    }

    #[test]
    fn zero_photons_are_rejected() {
        let sim = LabSimulator::new(LabParameters::default()).unwrap();
        assert!(sim.run(0, Some(1)).unwrap_err().is_input_error());
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let params = LabParameters {
            detector_efficiency_percent: 120.0,
            ..LabParameters::default()
        };
        assert!(LabSimulator::new(params).is_err());
    }

    #[test]
    fn quiet_link_yields_a_key() {
        let sim = LabSimulator::new(bright_link()).unwrap();
        let report = sim.run(4000, Some(7)).unwrap();
        assert_eq!(report.photons_sent, 4000);
        // every photon arrives and clicks
        assert_eq!(report.photons_received, 4000);
        assert!(report.basis_matches > 1600 && report.basis_matches < 2400);
        assert!(report.qber_percent < 3.0);
        assert!(report.security_threshold_met);
        assert!(report.final_key_bits > 0 && report.final_key_bits <= report.basis_matches);
        assert_eq!(report.eve_interceptions, 0);
        assert!((report.key_rate_kbps - report.final_key_bits as f64 / 10.0).abs() < 1e-9);
    }

    #[test]
    fn full_intercept_resend_aborts() {
        let params = LabParameters {
            eve_interception_rate: 1.0,
            attack_strategy: AttackType::InterceptResend,
            ..bright_link()
        };
        let report = LabSimulator::new(params).unwrap().run(4000, Some(3)).unwrap();
        assert_eq!(report.eve_interceptions, 4000);
        assert!(report.qber_percent > 8.5);
        assert!(!report.security_threshold_met);
        assert_eq!(report.final_key_bits, 0);
        assert_eq!(report.metrics.overall_system_efficiency, 0.0);
    }

    #[test]
    fn default_link_loses_most_photons() {
        let report = LabSimulator::new(LabParameters::default())
            .unwrap()
            .run(10_000, Some(11))
            .unwrap();
        // 23.7% efficiency applied on top of the fiber
        assert!(report.detection_efficiency_percent < 30.0);
        assert!(report.photons_received > 0);
    }

    #[test]
    fn log_is_bounded_with_progress_entries() {
        let report = LabSimulator::new(bright_link()).unwrap().run(60_000, Some(5)).unwrap();
        assert_eq!(report.log.len(), LAB_LOG_CAPACITY);
        assert!(report.log.iter().any(|e| e.message == "Transmitted 59000 photons"));
    }

    #[test]
    fn seeded_runs_repeat() {
        let sim = LabSimulator::new(LabParameters::default()).unwrap();
        let a = sim.run(2000, Some(99)).unwrap();
        let b = sim.run(2000, Some(99)).unwrap();
        assert_eq!(a.photons_received, b.photons_received);
        assert_eq!(a.final_key_bits, b.final_key_bits);
        assert_eq!(a.metrics, b.metrics);
    }

    #[test]
    fn six_state_lab_run() {
        let params = LabParameters {
            protocol_variant: ProtocolKind::SixState,
            ..bright_link()
        };
        let report = LabSimulator::new(params).unwrap().run(3000, Some(2)).unwrap();
        // one basis in three matches
        assert!(report.basis_match_rate_percent > 25.0 && report.basis_match_rate_percent < 42.0);
    }

    #[test]
    fn metrics_follow_the_link() {
        let report = LabSimulator::new(bright_link()).unwrap().run(2000, Some(4)).unwrap();
        let m = &report.metrics;
        assert!((m.transmission_time_ns - 50_000.0).abs() < 1e-6);
        assert!(m.lab_state_fidelity > 0.9 && m.lab_state_fidelity <= 0.95);
        assert!(m.fidelity_loss_db.unwrap() > 0.0);
        assert!(m.privacy.ratio > 0.0);
    }
}
