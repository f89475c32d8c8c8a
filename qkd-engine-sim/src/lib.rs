//! # QKD Engine Simulator
//!
//! Simulation engine for the BB84 family of quantum key distribution
//! protocols, built on the [`bb84`] primitives:
//!
//! ```text
//! SimulationRequest
//!   ↓ validate, draw entropy (hardware → simulator → classical)
//! Preparation (variant strategy)
//!   ↓ fiber loss + noise, Eve
//! Measurement + sifting
//!   ↓ QBER → security gate
//! Error correction → privacy amplification
//!   ↓
//! SimulationResult + Metrics
//! ```
//!
//! Three ways to drive it:
//!
//! - [`engine::SimulationOrchestrator`]: one synchronous run, a flat
//!   JSON-serializable record out
//! - [`lab::LabSimulator`]: per-photon model of a lossy link with a real
//!   detector (efficiency, dark counts, drift)
//! - [`sim_worker::ContinuousSimulation`]: background batches on a timer,
//!   polled for rolling QBER and key-rate histories
//!
//! Every run takes an optional seed; a seeded run is reproducible bit for
//! bit, metrics included.

pub mod units;
pub mod error;
pub mod config;
pub mod sim_log;
pub mod wire;
pub mod noise;
pub mod metrics;
pub mod engine;
pub mod lab;
pub mod circuit;
pub mod sim_worker;

pub use error::{Result, SimError};

pub mod prelude {
    pub use crate::circuit::{alice_encoding_circuit, bob_measurement_circuit, Circuit};
    pub use crate::config::{
        Backend, ContinuousConfig, EngineConfig, InsecurePolicy, LabParameters, RngType, Scenario,
        SimulationParameters, SimulationRequest,
    };
    pub use crate::engine::{simulate, RunState, SimulationOrchestrator, SimulationResult};
    pub use crate::error::SimError;
    pub use crate::lab::{LabReport, LabSimulator};
    pub use crate::metrics::Metrics;
    pub use crate::sim_log::{LogEntry, LogLevel};
    pub use crate::sim_worker::{ContinuousSimulation, ContinuousSnapshot, SecurityLabel};
}
