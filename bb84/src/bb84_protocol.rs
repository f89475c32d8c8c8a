//! Protocol variants: how Alice encodes, how Bob measures, and how the raw
//! QBER is corrected for each member of the BB84 family.

use rand::{Rng, RngCore};
use rand_distr::{Distribution, Poisson};
use serde::{Deserialize, Serialize};

use crate::bb84_states::{nominal_polarization, Basis, Intensity, Photon};
use crate::error::{ProtocolError, Result};

/// Extra error on a matching-basis measurement of a photon Eve tampered with.
pub const CORRUPTION_ERROR: f64 = 0.02;
/// Intrinsic matching-basis error of a lab detector.
pub const LAB_MEASUREMENT_ERROR: f64 = 0.01;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolKind {
    #[default]
    Bb84,
    Sarg04,
    Decoy,
    SixState,
    Custom,
}

impl ProtocolKind {
    pub const ALL: [ProtocolKind; 5] = [
        ProtocolKind::Bb84,
        ProtocolKind::Sarg04,
        ProtocolKind::Decoy,
        ProtocolKind::SixState,
        ProtocolKind::Custom,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            ProtocolKind::Bb84 => "Standard BB84",
            ProtocolKind::Sarg04 => "SARG04 Protocol",
            ProtocolKind::Decoy => "Decoy State BB84",
            ProtocolKind::SixState => "Six-State BB84",
            ProtocolKind::Custom => "Custom BB84",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ProtocolKind::Bb84 => "two conjugate bases, four polarization states",
            ProtocolKind::Sarg04 => "four non-orthogonal states, bit read from the complementary basis",
            ProtocolKind::Decoy => "signal, decoy and vacuum pulses to expose photon-number splitting",
            ProtocolKind::SixState => "three mutually unbiased bases including circular polarization",
            ProtocolKind::Custom => "user-defined basis count, noise and error characteristics",
        }
    }

    /// Builds the stateless strategy for this variant.
    pub fn strategy(self, custom: &CustomProtocolConfig) -> Result<Box<dyn ProtocolVariant>> {
        Ok(match self {
            ProtocolKind::Bb84 => Box::new(StandardBb84::default()),
            ProtocolKind::Sarg04 => Box::new(Sarg04),
            ProtocolKind::Decoy => Box::new(DecoyState),
            ProtocolKind::SixState => Box::new(SixState),
            ProtocolKind::Custom => Box::new(CustomProtocol::new(custom.clone())?),
        })
    }
}

/// User-tunable parameters of the custom variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomProtocolConfig {
    /// 2, 3 or 4. The fourth basis is an extended rectilinear basis at 30°/120°.
    pub basis_count: usize,
    /// Probability of the rectilinear basis when `basis_count == 2`.
    pub rectilinear_probability: f64,
    /// Half-width of the uniform polarization jitter, in degrees.
    pub noise_amplitude: f64,
    /// Matching-basis measurement error of a lab detector.
    pub base_error_rate: f64,
    pub qber_multiplier: f64,
}

impl Default for CustomProtocolConfig {
    fn default() -> Self {
        CustomProtocolConfig {
            basis_count: 2,
            rectilinear_probability: 0.5,
            noise_amplitude: 0.5,
            base_error_rate: LAB_MEASUREMENT_ERROR,
            qber_multiplier: 1.0,
        }
    }
}

impl CustomProtocolConfig {
    pub fn validate(&self) -> Result<()> {
        if !(2..=4).contains(&self.basis_count) {
            return Err(ProtocolError::InvalidBasisCount(self.basis_count));
        }
        check_range("rectilinear_probability", self.rectilinear_probability, 0.0, 1.0)?;
        check_range("noise_amplitude", self.noise_amplitude, 0.0, 90.0)?;
        check_range("base_error_rate", self.base_error_rate, 0.0, 0.5)?;
        check_range("qber_multiplier", self.qber_multiplier, 0.0, 10.0)?;
        Ok(())
    }
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_nan() || value < min || value > max {
        return Err(ProtocolError::OutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Bob's detector. The ideal detector clicks on every photon that arrives and
/// only errs on photons Eve tampered with.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorModel {
    pub detection_probability: f64,
    /// Expected dark counts per detection window.
    pub dark_count_mean: f64,
    pub base_error_rate: f64,
    /// Whether intrinsic and intensity-dependent errors apply.
    pub intrinsic_errors: bool,
}

impl DetectorModel {
    pub fn ideal() -> Self {
        DetectorModel {
            detection_probability: 1.0,
            dark_count_mean: 0.0,
            base_error_rate: 0.0,
            intrinsic_errors: false,
        }
    }

    pub fn lab(detection_probability: f64, dark_count_rate_hz: f64, window_s: f64) -> Self {
        DetectorModel {
            detection_probability: detection_probability.clamp(0.0, 1.0),
            dark_count_mean: (dark_count_rate_hz * window_s).max(0.0),
            base_error_rate: LAB_MEASUREMENT_ERROR,
            intrinsic_errors: true,
        }
    }

    pub fn dark_counts<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        match Poisson::new(self.dark_count_mean) {
            Ok(poisson) => poisson.sample(rng) as u64,
            // mean of zero
            Err(_) => 0,
        }
    }
}

impl Default for DetectorModel {
    fn default() -> Self {
        Self::ideal()
    }
}

/// One detector readout.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub bit: bool,
    pub basis: Basis,
    pub detected: bool,
}

/// Capability shared by every protocol variant. Implementations hold
/// configuration only; all randomness comes in through `rng`.
pub trait ProtocolVariant: Send + Sync {
    fn kind(&self) -> ProtocolKind;

    fn name(&self) -> &'static str {
        self.kind().display_name()
    }

    /// Bases Alice and Bob draw from. A basis may appear twice when the
    /// variant weights it.
    fn basis_set(&self) -> &[Basis];

    /// Half-width of the preparation jitter for a signal pulse, in degrees.
    fn polarization_noise(&self) -> f64;

    fn adjust_qber(&self, raw: f64) -> f64;

    fn choose_basis(&self, rng: &mut dyn RngCore) -> Basis {
        Basis::random(self.basis_set(), rng)
    }

    fn prepare_in(&self, bit: bool, basis: Basis, rng: &mut dyn RngCore) -> Photon {
        let polarization = jitter(nominal_polarization(bit, basis), self.polarization_noise(), rng);
        Photon::new(bit, basis, polarization)
    }

    fn prepare(&self, bit: bool, rng: &mut dyn RngCore) -> Photon {
        let basis = self.choose_basis(rng);
        self.prepare_in(bit, basis, rng)
    }

    /// Matching-basis error probability for `photon` under `detector`.
    fn error_probability(&self, photon: &Photon, detector: &DetectorModel) -> f64 {
        let mut p = if photon.corrupted { CORRUPTION_ERROR } else { 0.0 };
        if detector.intrinsic_errors {
            p += detector.base_error_rate;
        }
        p
    }

    /// Whether a dark count in this slot makes Bob discard it.
    fn dark_count_discards(&self, _photon: &Photon) -> bool {
        true
    }

    fn measure_in(
        &self,
        photon: &Photon,
        basis: Basis,
        detector: &DetectorModel,
        rng: &mut dyn RngCore,
    ) -> Measurement {
        let undetected = Measurement {
            bit: false,
            basis,
            detected: false,
        };
        if !photon.detected {
            return undetected;
        }

        let p_detect = detector.detection_probability * intensity_detection_factor(photon.intensity);
        if rng.gen::<f64>() >= p_detect {
            return undetected;
        }
        if detector.dark_counts(rng) > 0 && self.dark_count_discards(photon) {
            return Measurement {
                bit: rng.gen(),
                basis,
                detected: false,
            };
        }

        let bit = if basis == photon.basis {
            if rng.gen::<f64>() < self.error_probability(photon, detector) {
                !photon.bit
            } else {
                photon.bit
            }
        } else {
            // conjugate basis: outcome uniformly random
            rng.gen()
        };
        Measurement {
            bit,
            basis,
            detected: true,
        }
    }

    fn measure(&self, photon: &Photon, detector: &DetectorModel, rng: &mut dyn RngCore) -> Measurement {
        let basis = self.choose_basis(rng);
        self.measure_in(photon, basis, detector, rng)
    }

    /// Rejects bases this variant never uses.
    fn validate_bases(&self, bases: &[Basis]) -> Result<()> {
        for (position, basis) in bases.iter().enumerate() {
            if !self.basis_set().contains(basis) {
                return Err(ProtocolError::UnsupportedBasis {
                    basis: *basis,
                    position,
                    protocol: self.name(),
                });
            }
        }
        Ok(())
    }
}

fn jitter(center: f64, amplitude: f64, rng: &mut dyn RngCore) -> f64 {
    if amplitude > 0.0 {
        center + rng.gen_range(-amplitude..=amplitude)
    } else {
        center
    }
}

fn intensity_detection_factor(intensity: Intensity) -> f64 {
    match intensity {
        Intensity::Signal => 1.0,
        Intensity::Decoy => 0.8,
        Intensity::Vacuum => 0.1,
    }
}

fn intensity_error(intensity: Intensity) -> f64 {
    match intensity {
        Intensity::Signal => 0.0,
        Intensity::Decoy => 0.01,
        Intensity::Vacuum => 0.05,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandardBb84 {
    pub rectilinear_probability: f64,
}

impl Default for StandardBb84 {
    fn default() -> Self {
        StandardBb84 {
            rectilinear_probability: 0.5,
        }
    }
}

impl ProtocolVariant for StandardBb84 {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Bb84
    }

    fn basis_set(&self) -> &[Basis] {
        &Basis::BB84
    }

    fn polarization_noise(&self) -> f64 {
        0.5
    }

    fn adjust_qber(&self, raw: f64) -> f64 {
        raw
    }

    fn choose_basis(&self, rng: &mut dyn RngCore) -> Basis {
        if rng.gen::<f64>() < self.rectilinear_probability {
            Basis::Rectilinear
        } else {
            Basis::Diagonal
        }
    }
}

/// SARG04 uses the BB84 states, but the key bit is announced through a pair
/// of non-orthogonal states and read off the complementary basis.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sarg04;

impl ProtocolVariant for Sarg04 {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Sarg04
    }

    fn basis_set(&self) -> &[Basis] {
        &Basis::BB84
    }

    fn polarization_noise(&self) -> f64 {
        0.3
    }

    fn adjust_qber(&self, raw: f64) -> f64 {
        (raw * 1.1).min(0.5)
    }

    fn prepare(&self, bit: bool, rng: &mut dyn RngCore) -> Photon {
        // one of |0>, |1>, |+>, |->
        let basis = match rng.gen_range(0..4) {
            0 | 1 => Basis::Rectilinear,
            _ => Basis::Diagonal,
        };
        self.prepare_in(bit, basis, rng)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DecoyState;

impl DecoyState {
    pub const SIGNAL_FRACTION: f64 = 0.95;
    pub const DECOY_FRACTION: f64 = 0.04;

    pub fn draw_intensity(rng: &mut dyn RngCore) -> Intensity {
        let x = rng.gen::<f64>();
        if x < Self::SIGNAL_FRACTION {
            Intensity::Signal
        } else if x < Self::SIGNAL_FRACTION + Self::DECOY_FRACTION {
            Intensity::Decoy
        } else {
            Intensity::Vacuum
        }
    }
}

impl ProtocolVariant for DecoyState {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Decoy
    }

    fn basis_set(&self) -> &[Basis] {
        &Basis::BB84
    }

    fn polarization_noise(&self) -> f64 {
        0.5
    }

    fn adjust_qber(&self, raw: f64) -> f64 {
        raw * 0.98
    }

    fn prepare_in(&self, bit: bool, basis: Basis, rng: &mut dyn RngCore) -> Photon {
        let intensity = Self::draw_intensity(rng);
        // an empty pulse carries no bit
        let bit = bit && intensity != Intensity::Vacuum;
        let noise = match intensity {
            Intensity::Signal => 0.5,
            Intensity::Decoy => 0.8,
            Intensity::Vacuum => 1.5,
        };
        let polarization = jitter(nominal_polarization(bit, basis), noise, rng);
        Photon::new(bit, basis, polarization).with_intensity(intensity)
    }

    fn error_probability(&self, photon: &Photon, detector: &DetectorModel) -> f64 {
        let mut p = if photon.corrupted { CORRUPTION_ERROR } else { 0.0 };
        if detector.intrinsic_errors {
            p += detector.base_error_rate + intensity_error(photon.intensity);
        }
        p
    }

    fn dark_count_discards(&self, photon: &Photon) -> bool {
        photon.intensity == Intensity::Vacuum
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SixState;

impl ProtocolVariant for SixState {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::SixState
    }

    fn basis_set(&self) -> &[Basis] {
        &Basis::SIX_STATE
    }

    fn polarization_noise(&self) -> f64 {
        0.4
    }

    fn adjust_qber(&self, raw: f64) -> f64 {
        raw * 0.95
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomProtocol {
    config: CustomProtocolConfig,
    bases: Vec<Basis>,
}

impl CustomProtocol {
    /// Polarization of the extended rectilinear basis (fourth slot).
    const EXTENDED_RECTILINEAR: (f64, f64) = (30.0, 120.0);

    pub fn new(config: CustomProtocolConfig) -> Result<Self> {
        config.validate()?;
        let bases = match config.basis_count {
            2 => Basis::BB84.to_vec(),
            3 => Basis::SIX_STATE.to_vec(),
            _ => vec![
                Basis::Rectilinear,
                Basis::Diagonal,
                Basis::Circular,
                Basis::Rectilinear,
            ],
        };
        Ok(CustomProtocol { config, bases })
    }

    pub fn config(&self) -> &CustomProtocolConfig {
        &self.config
    }
}

impl ProtocolVariant for CustomProtocol {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Custom
    }

    fn basis_set(&self) -> &[Basis] {
        &self.bases
    }

    fn polarization_noise(&self) -> f64 {
        self.config.noise_amplitude
    }

    fn adjust_qber(&self, raw: f64) -> f64 {
        raw * self.config.qber_multiplier
    }

    fn choose_basis(&self, rng: &mut dyn RngCore) -> Basis {
        if self.config.basis_count == 2 {
            if rng.gen::<f64>() < self.config.rectilinear_probability {
                Basis::Rectilinear
            } else {
                Basis::Diagonal
            }
        } else {
            Basis::random(&self.bases, rng)
        }
    }

    fn prepare(&self, bit: bool, rng: &mut dyn RngCore) -> Photon {
        if self.config.basis_count == 4 && rng.gen_range(0..4) == 3 {
            let (zero, one) = Self::EXTENDED_RECTILINEAR;
            let center = if bit { one } else { zero };
            let polarization = jitter(center, self.config.noise_amplitude, rng);
            return Photon::new(bit, Basis::Rectilinear, polarization);
        }
        let basis = match self.config.basis_count {
            2 => self.choose_basis(rng),
            // the remaining three slots are equally likely
            _ => Basis::random(&self.bases[..3], rng),
        };
        self.prepare_in(bit, basis, rng)
    }

    fn error_probability(&self, photon: &Photon, detector: &DetectorModel) -> f64 {
        let mut p = if photon.corrupted { CORRUPTION_ERROR } else { 0.0 };
        if detector.intrinsic_errors {
            p += self.config.base_error_rate;
        }
        p
    }
}
