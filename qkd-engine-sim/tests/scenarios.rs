use bb84::prelude::*;
use qkd_engine_sim::config::{InsecurePolicy, LabParameters, Scenario, SimulationParameters, SimulationRequest};
use qkd_engine_sim::engine::{simulate, RunState, SimulationOrchestrator};
use qkd_engine_sim::lab::LabSimulator;
use qkd_engine_sim::metrics;
use qkd_engine_sim::sim_log::LogLevel;
use qkd_engine_sim::SimError;

fn lossless() -> SimulationParameters {
    SimulationParameters {
        distance_m: 0.0,
        channel_noise: 0.0,
        ..SimulationParameters::default()
    }
}

fn manual(bits: &str, bases: &str, bob: &str, params: SimulationParameters) -> SimulationRequest {
    SimulationRequest {
        scenario: Scenario::Manual {
            alice_bits: bits.into(),
            alice_bases: bases.into(),
            bob_bases: Some(bob.into()),
        },
        seed: Some(2024),
        parameters: params,
        ..SimulationRequest::default()
    }
}

#[test]
fn matching_bases_on_a_perfect_link() {
    let result = simulate(&manual("0110", "+x+x", "+x+x", lossless())).unwrap();

    assert_eq!(result.channel_error_rate, 0.0);
    assert_eq!(result.photons_lost, 0);
    assert_eq!(format_bits(&result.alice_sifted), "0110");
    assert_eq!(result.alice_sifted, result.bob_sifted);
    assert_eq!(result.qber, 0.0);
    assert!(result.is_secure);
    assert_eq!(result.verdict, SecurityVerdict::Secure);
    // standard amplification keeps half
    assert_eq!(result.final_key.len(), 2);
    assert!(result.keys_match);
    assert_eq!(result.final_state(), RunState::Complete);
    assert!(result.logs.iter().any(|e| e.level == LogLevel::Success));
}

#[test]
fn all_bases_mismatched() {
    let result = simulate(&manual("0101", "++++", "xxxx", lossless())).unwrap();

    assert!(result.alice_sifted.is_empty());
    assert_eq!(result.qber, 1.0);
    assert!(result.final_key.is_empty());
    assert!(!result.is_secure);
    assert_eq!(result.verdict, SecurityVerdict::Indeterminate);
    assert_eq!(result.metrics.privacy_amplification_ratio, 0.0);
}

#[test]
fn length_mismatch_is_an_input_error() {
    let err = simulate(&SimulationRequest::manual("0110", "+x+")).unwrap_err();
    assert!(err.is_input_error());
    assert!(matches!(err, SimError::InputValidation(_)));
}

#[test]
fn bad_symbols_are_input_errors() {
    for (bits, bases) in [("01a0", "++++"), ("0101", "++*+"), ("", "")] {
        let err = simulate(&SimulationRequest::manual(bits, bases)).unwrap_err();
        assert!(err.is_input_error(), "{bits:?}/{bases:?} -> {err}");
    }
}

#[test]
fn decoy_adjustment() {
    let decoy = ProtocolKind::Decoy.strategy(&CustomProtocolConfig::default()).unwrap();
    assert!((decoy.adjust_qber(0.10) - 0.098).abs() < 1e-12);
    let sarg = ProtocolKind::Sarg04.strategy(&CustomProtocolConfig::default()).unwrap();
    assert!((sarg.adjust_qber(0.10) - 0.11).abs() < 1e-12);
    assert_eq!(sarg.adjust_qber(0.9), 0.5);
}

#[test]
fn eavesdropper_is_detected() {
    let params = SimulationParameters {
        eve_attack: AttackType::InterceptResend,
        insecure_policy: InsecurePolicy::Abort,
        ..lossless()
    };
    let result = simulate(&SimulationRequest::auto(4000).with_seed(8).with_parameters(params)).unwrap();

    assert!(result.qber > 0.15 && result.qber < 0.35, "qber {}", result.qber);
    assert!(!result.is_secure);
    assert_eq!(result.final_state(), RunState::Aborted);
    assert!(result.final_key.is_empty());
    assert_eq!(result.eve_bases.len(), 4000);
    assert!(result.eve_detection_probability > 0.0);
}

#[test]
fn every_variant_completes_on_a_quiet_link() {
    for kind in ProtocolKind::ALL {
        let params = SimulationParameters {
            protocol_variant: kind,
            ..lossless()
        };
        let result = simulate(&SimulationRequest::auto(512).with_seed(1).with_parameters(params)).unwrap();
        assert_eq!(result.final_state(), RunState::Complete, "{:?}", kind);
        assert!(result.keys_match, "{:?}", kind);
        assert!(!result.alice_sifted.is_empty(), "{:?}", kind);
    }
}

#[test]
fn metrics_are_a_pure_function_of_the_record() {
    let result = simulate(&SimulationRequest::auto(256).with_seed(77)).unwrap();
    assert_eq!(metrics::compute(&result), result.metrics);
    assert_eq!(metrics::compute(&result), metrics::compute(&result));
}

#[test]
fn result_round_trips_through_json() {
    let result = simulate(&SimulationRequest::auto(64).with_seed(5)).unwrap();
    let json = result.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(value["alice_bases"].as_str().unwrap().chars().all(|c| c == '+' || c == 'x'));
    assert!(value["bob_bits"].as_str().unwrap().chars().all(|c| "01?".contains(c)));
    assert!(value["metrics"].is_object());
    assert!(value["logs"].is_array());
}

#[test]
fn requests_deserialize_with_defaults() {
    let request: SimulationRequest = serde_json::from_str(
        r#"{
            "scenario": { "mode": "manual", "alice_bits": "0110", "alice_bases": "+x+x" },
            "seed": 3,
            "parameters": { "protocol_variant": "six-state", "eve_attack": "beam_splitting" }
        }"#,
    )
    .unwrap();
    assert_eq!(request.parameters.protocol_variant, ProtocolKind::SixState);
    assert_eq!(request.parameters.eve_attack, AttackType::BeamSplitting);
    assert_eq!(request.parameters.qber_threshold, 0.085);
    let result = SimulationOrchestrator::new().run(&request).unwrap();
    assert_eq!(result.alice_bits.len(), 4);
}

#[test]
fn lab_run_reports_consistent_counts() {
    let report = LabSimulator::new(LabParameters::default())
        .unwrap()
        .run(5000, Some(12))
        .unwrap();
    assert_eq!(report.photons_sent, 5000);
    assert!(report.photons_received <= report.photons_sent);
    assert!(report.basis_matches <= report.photons_received);
    assert!(report.final_key_bits <= report.basis_matches);
    assert!(report.log.len() <= 50);
    assert_eq!(report.security_threshold_met, report.qber_percent <= 8.5);
}
