use bb84::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let n = 32;
    let mut source = RandomSource::classical(2024);
    let variant = StandardBb84::default();

    // Alice's bits and bases, Bob's bases
    let alice_bits = source.bits(n).bits;
    let alice_bases = source.bases(n, variant.basis_set());
    let bob_bases = source.bases(n, variant.basis_set());

    let mut rng = StdRng::seed_from_u64(7);
    let mut photons: Vec<Photon> = alice_bits
        .iter()
        .zip(&alice_bases)
        .map(|(&bit, &basis)| variant.prepare_in(bit, basis, &mut rng))
        .collect();

    let channel = ChannelModel::new(5_000.0, 0.02);
    let stats = channel.transmit_photons(&mut photons, &mut rng);

    let detector = DetectorModel::ideal();
    let bob: Vec<Symbol> = photons
        .iter()
        .zip(&bob_bases)
        .map(|(photon, &basis)| {
            let m = variant.measure_in(photon, basis, &detector, &mut rng);
            if m.detected {
                Symbol::Bit(m.bit)
            } else {
                Symbol::Undetected
            }
        })
        .collect();

    println!("Alice's Bits:  {}", format_bits(&alice_bits));
    println!("Alice's Bases: {}", format_bases(&alice_bases));
    println!("Bob's Bases:   {}", format_bases(&bob_bases));
    println!("Bob's Bits:    {}", format_symbols(&bob));
    println!(
        "Channel: {:.1}% loss probability, {} lost, {} flipped",
        channel.loss_probability() * 100.0,
        stats.lost,
        stats.flipped
    );

    // Step 1: sifting
    let keys = sift(&alice_bits, &alice_bases, &bob, &bob_bases)?;
    let q = qber(&keys.alice, &keys.bob);
    let gate = SecurityGate::default();
    println!("Sifted: {} bits, QBER {:.3} ({:?})", keys.len(), q, gate.verdict(q, keys.len()));

    // Step 2: error correction
    let reconciled = reconcile(ErrorCorrectionMethod::Cascade, &keys.alice, &keys.bob)?;
    println!(
        "Cascade corrected {} errors, disclosing {} parities",
        reconciled.errors_corrected, reconciled.leaked_bits
    );

    // Step 3: privacy amplification
    let final_alice_key = amplify(PrivacyAmplificationMethod::Toeplitz, &reconciled.alice, 0.5, 11);
    let final_bob_key = amplify(PrivacyAmplificationMethod::Toeplitz, &reconciled.bob, 0.5, 11);

    println!("Final Alice's Key: {}", format_bits(&final_alice_key));
    println!("Final Bob's Key:   {}", format_bits(&final_bob_key));
    assert_eq!(final_alice_key, final_bob_key);

    Ok(())
}
