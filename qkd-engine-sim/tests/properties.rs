use bb84::prelude::*;
use proptest::prelude::*;
use qkd_engine_sim::config::{SimulationParameters, SimulationRequest};
use qkd_engine_sim::engine::{simulate, RunState};
use qkd_engine_sim::metrics;

fn protocol() -> impl Strategy<Value = ProtocolKind> {
    prop::sample::select(ProtocolKind::ALL.to_vec())
}

fn attack() -> impl Strategy<Value = AttackType> {
    prop::sample::select(AttackType::ALL.to_vec())
}

fn reconciliation() -> impl Strategy<Value = ErrorCorrectionMethod> {
    prop::sample::select(vec![
        ErrorCorrectionMethod::None,
        ErrorCorrectionMethod::Cascade,
        ErrorCorrectionMethod::Winnow,
        ErrorCorrectionMethod::Ldpc,
    ])
}

fn amplification() -> impl Strategy<Value = PrivacyAmplificationMethod> {
    prop::sample::select(vec![
        PrivacyAmplificationMethod::None,
        PrivacyAmplificationMethod::Standard,
        PrivacyAmplificationMethod::Universal,
        PrivacyAmplificationMethod::Toeplitz,
    ])
}

prop_compose! {
    fn parameters()(
        protocol_variant in protocol(),
        eve_attack in attack(),
        error_correction in reconciliation(),
        privacy_amplification in amplification(),
        distance_m in 0.0f64..50_000.0,
        channel_noise in 0.0f64..=0.3,
        qber_threshold in 0.01f64..=1.0,
        amplification_factor in 0.05f64..=1.0,
    ) -> SimulationParameters {
        SimulationParameters {
            protocol_variant,
            eve_attack,
            error_correction,
            privacy_amplification,
            distance_m,
            channel_noise,
            qber_threshold,
            amplification_factor,
            ..SimulationParameters::default()
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn run_invariants(params in parameters(), n in 1usize..300, seed in any::<u64>()) {
        let request = SimulationRequest::auto(n).with_seed(seed).with_parameters(params.clone());
        let result = simulate(&request).unwrap();

        prop_assert_eq!(result.alice_bits.len(), n);
        prop_assert_eq!(result.alice_bases.len(), n);
        prop_assert_eq!(result.bob_bits.len(), n);
        prop_assert_eq!(result.bob_bases.len(), n);
        prop_assert_eq!(result.alice_sifted.len(), result.bob_sifted.len());
        prop_assert!(result.alice_sifted.len() <= n);
        prop_assert!(result.final_key.len() <= result.alice_sifted.len());

        prop_assert!((0.0..=1.0).contains(&result.qber));
        if result.alice_sifted.is_empty() {
            prop_assert_eq!(result.qber, 1.0);
        }
        prop_assert_eq!(result.is_secure, result.qber < params.qber_threshold);
        prop_assert_eq!(result.final_state(), RunState::Complete);

        if params.eve_attack != AttackType::InterceptResend {
            prop_assert!(result.eve_bases.is_empty());
        }
        prop_assert_eq!(metrics::compute(&result), result.metrics);
    }

    #[test]
    fn seeded_runs_reproduce(params in parameters(), n in 1usize..100, seed in any::<u64>()) {
        let request = SimulationRequest::auto(n).with_seed(seed).with_parameters(params);
        let a = simulate(&request).unwrap();
        let b = simulate(&request).unwrap();
        prop_assert_eq!(a.final_key, b.final_key);
        prop_assert_eq!(a.qber, b.qber);
        prop_assert_eq!(a.metrics, b.metrics);
    }

    #[test]
    fn scores_stay_in_range(params in parameters(), seed in any::<u64>()) {
        let result = simulate(&SimulationRequest::auto(64).with_seed(seed).with_parameters(params)).unwrap();
        let m = &result.metrics;
        for score in [m.quantum_score, m.classical_score, m.security_level, m.speed_index, m.channel_efficiency] {
            prop_assert!((0.0..=100.0).contains(&score));
        }
        prop_assert!(m.lab_state_fidelity <= 0.95);
        prop_assert!(m.pa_efficiency <= 1.0);
    }
}
