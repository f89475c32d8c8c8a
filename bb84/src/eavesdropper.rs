//! Eve. Attacks act on prepared photons between the channel and Bob.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::bb84_states::{Basis, Photon};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackType {
    #[default]
    None,
    InterceptResend,
    BeamSplitting,
    PhotonNumberSplitting,
    TrojanHorse,
}

impl AttackType {
    pub const ALL: [AttackType; 5] = [
        AttackType::None,
        AttackType::InterceptResend,
        AttackType::BeamSplitting,
        AttackType::PhotonNumberSplitting,
        AttackType::TrojanHorse,
    ];

    pub fn is_active(self) -> bool {
        self != AttackType::None
    }

    pub fn label(self) -> &'static str {
        match self {
            AttackType::None => "none",
            AttackType::InterceptResend => "intercept_resend",
            AttackType::BeamSplitting => "beam_splitting",
            AttackType::PhotonNumberSplitting => "photon_number_splitting",
            AttackType::TrojanHorse => "trojan_horse",
        }
    }

    /// Probability that a per-photon attack succeeds on a photon it targets.
    pub fn success_probability(self) -> f64 {
        match self {
            AttackType::BeamSplitting => 0.5,
            AttackType::PhotonNumberSplitting => 0.3,
            AttackType::TrojanHorse => 0.2,
            AttackType::None | AttackType::InterceptResend => 0.0,
        }
    }

    /// Textbook probability that one intercepted photon reveals Eve
    /// (wrong basis 1/2, then wrong outcome 1/2).
    pub fn theoretical_detection_probability(self) -> f64 {
        match self {
            AttackType::InterceptResend => 0.25,
            _ => 0.0,
        }
    }
}

/// What Eve did during a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interception {
    /// One basis per time slot for intercept-resend; empty otherwise.
    pub eve_bases: Vec<Basis>,
    pub detection_probability: f64,
    pub wrong_basis: usize,
    pub corrupted: usize,
    pub removed: usize,
}

#[derive(Debug, Clone)]
pub struct Eavesdropper {
    attack: AttackType,
    basis_set: Vec<Basis>,
}

impl Eavesdropper {
    pub fn new(attack: AttackType, basis_set: &[Basis]) -> Self {
        Eavesdropper {
            attack,
            basis_set: basis_set.to_vec(),
        }
    }

    pub fn attack_type(&self) -> AttackType {
        self.attack
    }

    /// Attacks every photon of a run.
    ///
    /// Intercept-resend measures each photon in a basis of Eve's choosing and
    /// resends her result: the correct bit when her basis matched Alice's,
    /// a uniformly random bit otherwise. Photons already lost are skipped but
    /// still get a basis so the bases stay aligned with Alice's.
    pub fn intercept<R: Rng + ?Sized>(&self, photons: &mut [Photon], rng: &mut R) -> Interception {
        let mut report = Interception {
            detection_probability: self.attack.theoretical_detection_probability(),
            ..Default::default()
        };

        match self.attack {
            AttackType::None => {}
            AttackType::InterceptResend => {
                for photon in photons.iter_mut() {
                    let eve_basis = Basis::random(&self.basis_set, rng);
                    report.eve_bases.push(eve_basis);
                    if photon.detected && eve_basis != photon.basis {
                        report.wrong_basis += 1;
                        if rng.gen::<bool>() != photon.bit {
                            photon.flip();
                        }
                    }
                }
            }
            _ => {
                for photon in photons.iter_mut().filter(|p| p.detected) {
                    if self.strike(photon, rng) {
                        report.corrupted += 1;
                        if !photon.detected {
                            report.removed += 1;
                        }
                    }
                }
            }
        }
        report
    }

    /// Lab model: each photon is targeted with `interception_rate`. Returns
    /// whether the photon was touched.
    pub fn tamper<R: Rng + ?Sized>(
        &self,
        photon: &mut Photon,
        interception_rate: f64,
        rng: &mut R,
    ) -> bool {
        if !self.attack.is_active() || rng.gen::<f64>() >= interception_rate {
            return false;
        }
        match self.attack {
            AttackType::InterceptResend => {
                let eve_basis = Basis::random(&self.basis_set, rng);
                if eve_basis != photon.basis {
                    if rng.gen::<bool>() {
                        photon.flip();
                    }
                    photon.corrupted = true;
                }
                true
            }
            _ => self.strike(photon, rng),
        }
    }

    /// Per-photon attacks. Beam splitting also removes the photon.
    fn strike<R: Rng + ?Sized>(&self, photon: &mut Photon, rng: &mut R) -> bool {
        if rng.gen::<f64>() >= self.attack.success_probability() {
            return false;
        }
        photon.corrupted = true;
        if self.attack == AttackType::BeamSplitting {
            photon.lose();
        }
        true
    }
}
