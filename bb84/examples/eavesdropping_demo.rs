use bb84::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Sends `n` photons through each attack and reports the resulting QBER.
fn simulate_eavesdropping(n: usize) {
    println!("BB84 Eavesdropping Simulation ({} photons per attack)", n);
    let variant = StandardBb84::default();
    let detector = DetectorModel::ideal();
    let gate = SecurityGate::default();

    for attack in AttackType::ALL {
        let mut rng = StdRng::seed_from_u64(1);
        let alice_bits: Vec<bool> = (0..n).map(|_| rng.gen()).collect();
        let mut photons: Vec<Photon> = alice_bits
            .iter()
            .map(|&bit| variant.prepare(bit, &mut rng))
            .collect();
        let alice_bases: Vec<Basis> = photons.iter().map(|p| p.basis).collect();

        let report = Eavesdropper::new(attack, variant.basis_set()).intercept(&mut photons, &mut rng);

        let (bob, bob_bases): (Vec<Symbol>, Vec<Basis>) = photons
            .iter()
            .map(|photon| {
                let m = variant.measure(photon, &detector, &mut rng);
                let symbol = if m.detected { Symbol::Bit(m.bit) } else { Symbol::Undetected };
                (symbol, m.basis)
            })
            .unzip();

        let keys = match sift(&alice_bits, &alice_bases, &bob, &bob_bases) {
            Ok(keys) => keys,
            Err(err) => {
                eprintln!("sifting failed: {}", err);
                return;
            }
        };
        let q = qber(&keys.alice, &keys.bob);
        println!(
            "{:<24} sifted {:>5}  QBER {:.3}  corrupted {:>5}  detected: {}",
            attack.label(),
            keys.len(),
            q,
            report.corrupted,
            !gate.is_secure(q)
        );
    }
}

fn main() {
    simulate_eavesdropping(5_000);
}
