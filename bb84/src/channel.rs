use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::bb84_states::{Photon, Symbol};

/// Attenuation of standard single-mode fiber (ITU-T G.652.D).
pub const FIBER_LOSS_DB_PER_KM: f64 = 0.184;
/// Coupling / environmental loss per unit of channel noise.
pub const ATMOSPHERIC_LOSS_DB_PER_NOISE: f64 = 0.5;
/// Loss never exceeds this, so some photons always reach Bob.
pub const MAX_LOSS_PROBABILITY: f64 = 0.85;

/// Distance and noise dependent quantum channel.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelModel {
    pub distance_m: f64,
    /// Per-photon bit flip probability in [0, 1].
    pub noise: f64,
}

/// What the channel did to one time slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Disturbance {
    Lost,
    Flipped,
    Clean,
}

/// Result of sending a bit sequence down the channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Transmission {
    pub symbols: Vec<Symbol>,
    pub lost: usize,
    pub flipped: usize,
    pub channel_error_rate: f64,
}

/// Loss / flip counters for a photon batch.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct ChannelStats {
    pub total: usize,
    pub lost: usize,
    pub flipped: usize,
}

impl ChannelStats {
    pub fn channel_error_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.flipped as f64 / self.total as f64
        }
    }
}

impl ChannelModel {
    pub fn new(distance_m: f64, noise: f64) -> Self {
        ChannelModel { distance_m, noise }
    }

    pub fn fiber_loss_db(&self) -> f64 {
        FIBER_LOSS_DB_PER_KM * self.distance_m / 1000.0
    }

    pub fn atmospheric_loss_db(&self) -> f64 {
        self.noise * ATMOSPHERIC_LOSS_DB_PER_NOISE
    }

    pub fn total_loss_db(&self) -> f64 {
        self.fiber_loss_db() + self.atmospheric_loss_db()
    }

    pub fn loss_probability(&self) -> f64 {
        let p = 1.0 - 10f64.powf(-self.total_loss_db() / 10.0);
        p.clamp(0.0, MAX_LOSS_PROBABILITY)
    }

    pub fn transmission_probability(&self) -> f64 {
        1.0 - self.loss_probability()
    }

    /// Loss is decided first; a surviving photon may then be flipped. Two
    /// draws per slot, whatever the outcome.
    pub fn disturb<R: Rng + ?Sized>(&self, rng: &mut R) -> Disturbance {
        let (loss_draw, flip_draw) = (rng.gen::<f64>(), rng.gen::<f64>());
        if loss_draw < self.loss_probability() {
            Disturbance::Lost
        } else if flip_draw < self.noise {
            Disturbance::Flipped
        } else {
            Disturbance::Clean
        }
    }

    pub fn transmit<R: Rng + ?Sized>(&self, bits: &[bool], rng: &mut R) -> Transmission {
        let mut stats = ChannelStats {
            total: bits.len(),
            ..Default::default()
        };
        let symbols = bits
            .iter()
            .map(|&bit| match self.disturb(rng) {
                Disturbance::Lost => {
                    stats.lost += 1;
                    Symbol::Undetected
                }
                Disturbance::Flipped => {
                    stats.flipped += 1;
                    Symbol::Bit(!bit)
                }
                Disturbance::Clean => Symbol::Bit(bit),
            })
            .collect();

        Transmission {
            symbols,
            lost: stats.lost,
            flipped: stats.flipped,
            channel_error_rate: stats.channel_error_rate(),
        }
    }

    /// Same model applied in place to prepared photons.
    pub fn transmit_photons<R: Rng + ?Sized>(
        &self,
        photons: &mut [Photon],
        rng: &mut R,
    ) -> ChannelStats {
        let mut stats = ChannelStats {
            total: photons.len(),
            ..Default::default()
        };
        for photon in photons.iter_mut() {
            match self.disturb(rng) {
                Disturbance::Lost => {
                    photon.lose();
                    stats.lost += 1;
                }
                Disturbance::Flipped => {
                    photon.flip();
                    stats.flipped += 1;
                }
                Disturbance::Clean => {}
            }
        }
        stats
    }
}
