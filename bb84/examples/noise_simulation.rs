use bb84::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn simulate_noise_effect() {
    println!("BB84 Protocol with Noise Simulation");
    let gate = SecurityGate::default();
    let mut rng = StdRng::seed_from_u64(42);
    let bits: Vec<bool> = (0..10_000).map(|_| rng.gen()).collect();

    for distance_km in [0.0, 10.0, 25.0, 50.0] {
        for noise in [0.0, 0.02, 0.05, 0.1] {
            let channel = ChannelModel::new(distance_km * 1000.0, noise);
            let tx = channel.transmit(&bits, &mut StdRng::seed_from_u64(7));
            println!(
                "{:>5.1} km  noise {:.2}  loss {:>5.1}%  lost {:>5}  channel error {:.4}  secure: {}",
                distance_km,
                noise,
                channel.loss_probability() * 100.0,
                tx.lost,
                tx.channel_error_rate,
                gate.is_secure(tx.channel_error_rate)
            );
        }
    }
}

fn main() {
    simulate_noise_effect();
}
