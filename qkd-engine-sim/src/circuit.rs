//! Single-qubit circuit descriptions for Alice's encoding and Bob's
//! measurement, in a form a front end can draw step by step.
//!
//! | basis | Alice         | Bob before measuring |
//! |-------|---------------|----------------------|
//! | `+`   | (X)           | nothing              |
//! | `x`   | (X) · H       | H                    |
//! | `o`   | (X) · H · S   | S† · H               |

use bb84::prelude::Basis;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gate {
    Init,
    Input,
    X,
    H,
    S,
    Sdg,
    Barrier,
    Measure,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitKind {
    AliceEncoding,
    BobMeasurement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateOp {
    pub gate: Gate,
    pub qubit: usize,
    pub step: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub step: usize,
    pub operation: String,
    pub description: String,
    pub qubit: usize,
    pub gate: Gate,
    pub state_before: String,
    pub state_after: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub bit: bool,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    #[serde(rename = "type")]
    pub kind: CircuitKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit: Option<bool>,
    pub basis: Basis,
    pub num_qubits: usize,
    pub num_classical_bits: usize,
    pub gates: Vec<GateOp>,
    pub steps: Vec<Step>,
    /// Prepared state; empty for a measurement circuit.
    pub final_state: String,
    pub possible_outcomes: Vec<Outcome>,
    pub description: String,
}

impl Circuit {
    fn new(kind: CircuitKind, bit: Option<bool>, basis: Basis, description: String) -> Self {
        Circuit {
            kind,
            bit,
            basis,
            num_qubits: 1,
            num_classical_bits: 1,
            gates: Vec::new(),
            steps: Vec::new(),
            final_state: String::new(),
            possible_outcomes: Vec::new(),
            description,
        }
    }

    fn apply(&mut self, gate: Gate, operation: &str, description: &str, before: &str, after: &str) {
        let step = self.steps.len();
        if !matches!(gate, Gate::Init | Gate::Input) {
            self.gates.push(GateOp { gate, qubit: 0, step });
        }
        self.steps.push(Step {
            step,
            operation: operation.to_string(),
            description: description.to_string(),
            qubit: 0,
            gate,
            state_before: before.to_string(),
            state_after: after.to_string(),
        });
    }

    fn barrier(&mut self) {
        let step = self.steps.len();
        self.gates.push(GateOp {
            gate: Gate::Barrier,
            qubit: 0,
            step,
        });
    }
}

fn basis_label(basis: Basis) -> &'static str {
    match basis {
        Basis::Rectilinear => "rectilinear (+)",
        Basis::Diagonal => "diagonal (x)",
        Basis::Circular => "circular (o)",
    }
}

/// Ket Alice leaves on the wire for `bit` in `basis`.
pub fn encoded_state(bit: bool, basis: Basis) -> &'static str {
    match (basis, bit) {
        (Basis::Rectilinear, false) => "|0⟩",
        (Basis::Rectilinear, true) => "|1⟩",
        (Basis::Diagonal, false) => "|+⟩",
        (Basis::Diagonal, true) => "|-⟩",
        (Basis::Circular, false) => "|+i⟩",
        (Basis::Circular, true) => "|-i⟩",
    }
}

pub fn alice_encoding_circuit(bit: bool, basis: Basis) -> Circuit {
    let mut circuit = Circuit::new(
        CircuitKind::AliceEncoding,
        Some(bit),
        basis,
        format!("Alice encodes bit '{}' using {} basis", u8::from(bit), basis_label(basis)),
    );
    circuit.apply(Gate::Init, "initialize", "Initialize qubit to |0⟩ state", "|0⟩", "|0⟩");

    let computational = if bit { "|1⟩" } else { "|0⟩" };
    if bit {
        circuit.apply(Gate::X, "bit_flip", "Apply X gate to encode bit 1", "|0⟩", "|1⟩");
    }
    match basis {
        Basis::Rectilinear => {}
        Basis::Diagonal => circuit.apply(
            Gate::H,
            "basis_rotation",
            "Apply Hadamard gate for diagonal basis",
            computational,
            encoded_state(bit, basis),
        ),
        Basis::Circular => {
            let diagonal = encoded_state(bit, Basis::Diagonal);
            circuit.apply(
                Gate::H,
                "basis_rotation",
                "Apply Hadamard gate",
                computational,
                diagonal,
            );
            circuit.apply(
                Gate::S,
                "phase",
                "Apply S gate for circular basis",
                diagonal,
                encoded_state(bit, basis),
            );
        }
    }
    circuit.final_state = encoded_state(bit, basis).to_string();
    circuit.barrier();
    circuit
}

pub fn bob_measurement_circuit(basis: Basis) -> Circuit {
    let mut circuit = Circuit::new(
        CircuitKind::BobMeasurement,
        None,
        basis,
        format!("Bob measures in {} basis", basis_label(basis)),
    );
    circuit.apply(Gate::Input, "receive", "Qubit arrives from the quantum channel", "|ψ⟩", "|ψ⟩");
    match basis {
        Basis::Rectilinear => {}
        Basis::Diagonal => circuit.apply(
            Gate::H,
            "basis_rotation",
            "Apply Hadamard gate to measure in diagonal basis",
            "|ψ⟩",
            "H|ψ⟩",
        ),
        Basis::Circular => {
            circuit.apply(Gate::Sdg, "phase", "Apply S† gate", "|ψ⟩", "S†|ψ⟩");
            circuit.apply(
                Gate::H,
                "basis_rotation",
                "Apply Hadamard gate to measure in circular basis",
                "S†|ψ⟩",
                "HS†|ψ⟩",
            );
        }
    }
    circuit.apply(
        Gate::Measure,
        "measure",
        "Measure in the computational basis",
        "|ψ'⟩",
        "0 or 1",
    );
    circuit.possible_outcomes = vec![
        Outcome {
            bit: false,
            probability: 0.5,
        },
        Outcome {
            bit: true,
            probability: 0.5,
        },
    ];
    circuit
}

/// Outcome distribution when Bob measures Alice's state: certain on a
/// basis match, a fair coin otherwise.
pub fn predicted_outcomes(bit: bool, alice_basis: Basis, bob_basis: Basis) -> [Outcome; 2] {
    let p_one = if alice_basis == bob_basis {
        if bit {
            1.0
        } else {
            0.0
        }
    } else {
        0.5
    };
    [
        Outcome {
            bit: false,
            probability: 1.0 - p_one,
        },
        Outcome {
            bit: true,
            probability: p_one,
        },
    ]
}
