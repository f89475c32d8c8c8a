//! Physical constants in SI units, plus the fixed operating point of the
//! fiber link the lab model assumes.
//!
//! Constants from CODATA 2018 / NIST.

/// Planck constant (J·s)
pub const H: f64 = 6.626_070_15e-34;

/// Boltzmann constant (J/K)
pub const KB: f64 = 1.380_649e-23;

/// Group velocity in silica fiber (km/ns), roughly 2c/3
pub const FIBER_SPEED_KM_PER_NS: f64 = 2.0e-4;

/// Room temperature (K)
pub const ROOM_TEMPERATURE: f64 = 295.0;

/// Single-photon detector gate (s)
pub const DETECTION_WINDOW_S: f64 = 1e-9;

/// Convert temperature to a frequency k_B·T/h (Hz)
pub fn thermal_frequency(t_kelvin: f64) -> f64 {
    KB * t_kelvin / H
}

/// One-way time of flight through `km` of fiber (ns)
pub fn fiber_transit_ns(km: f64) -> f64 {
    km.max(0.0) / FIBER_SPEED_KM_PER_NS
}

/// dB attenuation to a transmission probability
pub fn db_to_transmission(loss_db: f64) -> f64 {
    10f64.powf(-loss_db / 10.0).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_km_takes_fifty_microseconds() {
        assert!((fiber_transit_ns(10.0) - 50_000.0).abs() < 1e-6);
    }

    #[test]
    fn three_db_halves_the_light() {
        assert!((db_to_transmission(3.0103) - 0.5).abs() < 1e-4);
        assert_eq!(db_to_transmission(-1.0), 1.0);
    }

    #[test]
    fn room_temperature_thermal_frequency() {
        // ~6.1 THz
        let f = thermal_frequency(ROOM_TEMPERATURE);
        assert!(f > 6.0e12 && f < 6.3e12);
    }
}
