//! Background worker for continuous mode.
//!
//! A thread runs a small engine batch on every tick and folds the result into
//! rolling histories. Callers poll a snapshot at their own pace; the worker
//! never blocks on them. Dropping the stop sender disconnects the channel and
//! ends the loop.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver, Sender};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::{ContinuousConfig, Scenario, SimulationParameters, SimulationRequest};
use crate::engine::SimulationOrchestrator;
use crate::error::Result;
use crate::metrics::{Metrics, QBER_SECURITY_LIMIT};

/// Fraction of photons lost per km in the live estimate.
const LIVE_LOSS_PER_KM: f64 = 0.01;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityLabel {
    High,
    Compromised,
}

impl SecurityLabel {
    pub fn from_qber(qber: f64) -> Self {
        if qber < QBER_SECURITY_LIMIT {
            SecurityLabel::High
        } else {
            SecurityLabel::Compromised
        }
    }
}

/// What a poll returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousSnapshot {
    pub elapsed_s: f64,
    pub batches: u64,
    pub photons_sent: u64,
    pub photons_received: u64,
    pub qber: f64,
    /// Oldest first, at most `poll_window` points
    pub qber_history: Vec<f64>,
    pub key_rate_history: Vec<f64>,
    pub metrics: Option<Metrics>,
    pub security_label: SecurityLabel,
}

struct LiveState {
    running: bool,
    started: Instant,
    parameters: SimulationParameters,
    batches: u64,
    qber_history: VecDeque<f64>,
    key_rate_history: VecDeque<f64>,
    latest: Option<Metrics>,
}

impl LiveState {
    fn new(parameters: SimulationParameters, capacity: usize) -> Self {
        LiveState {
            running: false,
            started: Instant::now(),
            parameters,
            batches: 0,
            qber_history: VecDeque::with_capacity(capacity),
            key_rate_history: VecDeque::with_capacity(capacity),
            latest: None,
        }
    }

    fn record(&mut self, qber: f64, metrics: Metrics, capacity: usize) {
        if self.qber_history.len() == capacity {
            self.qber_history.pop_front();
            self.key_rate_history.pop_front();
        }
        self.qber_history.push_back(qber);
        self.key_rate_history.push_back(metrics.key_generation_rate_kbps);
        self.latest = Some(metrics);
        self.batches += 1;
    }
}

/// Photons per tick for a source running at `photon_rate_mhz`.
pub fn batch_size(photon_rate_mhz: f64, max_batch: usize) -> usize {
    let scaled = (photon_rate_mhz * 0.1).floor();
    if scaled >= max_batch as f64 {
        max_batch
    } else {
        (scaled as usize).max(1)
    }
}

/// Detected photons expected after `sent`, from distance and noise alone.
pub fn estimated_received(sent: u64, distance_km: f64, channel_noise: f64) -> u64 {
    let survival = (1.0 - distance_km * LIVE_LOSS_PER_KM) * (1.0 - channel_noise);
    (sent as f64 * survival).max(0.0) as u64
}

pub struct ContinuousSimulation {
    config: ContinuousConfig,
    state: Arc<Mutex<LiveState>>,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ContinuousSimulation {
    pub fn new(config: ContinuousConfig) -> Result<Self> {
        config.validate()?;
        let state = LiveState::new(SimulationParameters::default(), config.history_capacity);
        Ok(ContinuousSimulation {
            config,
            state: Arc::new(Mutex::new(state)),
            stop_tx: None,
            handle: None,
        })
    }

    fn lock(&self) -> MutexGuard<'_, LiveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a fresh run, replacing any run in progress.
    pub fn start(&mut self, parameters: SimulationParameters, seed: Option<u64>) -> Result<()> {
        parameters.validate()?;
        self.stop();

        let batch = batch_size(parameters.photon_rate_mhz, self.config.max_batch);
        {
            let mut state = self.lock();
            *state = LiveState::new(parameters.clone(), self.config.history_capacity);
            state.running = true;
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let ticker = crossbeam_channel::tick(Duration::from_millis(self.config.tick_interval_ms));
        let state = Arc::clone(&self.state);
        let capacity = self.config.history_capacity;
        let seed = seed.unwrap_or_else(rand::random::<u64>);

        log::info!(
            "continuous mode started: {} photons per {} ms tick",
            batch,
            self.config.tick_interval_ms
        );
        self.handle = Some(thread::spawn(move || {
            worker_loop(parameters, batch, seed, capacity, state, ticker, stop_rx)
        }));
        self.stop_tx = Some(stop_tx);
        Ok(())
    }

    /// Stops the worker and waits for it. Safe to call when idle.
    pub fn stop(&mut self) {
        // disconnects the worker's stop channel
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("continuous worker panicked");
            }
            log::info!("continuous mode stopped");
        }
        self.lock().running = false;
    }

    pub fn is_running(&self) -> bool {
        self.stop_tx.is_some() && self.lock().running
    }

    /// Latest snapshot, or `None` when no run is active.
    pub fn poll(&self) -> Option<ContinuousSnapshot> {
        if self.stop_tx.is_none() {
            return None;
        }
        let state = self.lock();
        if !state.running {
            return None;
        }
        let elapsed_s = state.started.elapsed().as_secs_f64();
        let params = &state.parameters;
        let photons_sent = (params.photon_rate_mhz * 1e6 * elapsed_s) as u64;
        let window = |history: &VecDeque<f64>| -> Vec<f64> {
            let skip = history.len().saturating_sub(self.config.poll_window);
            history.iter().skip(skip).copied().collect()
        };
        let qber = state.qber_history.back().copied().unwrap_or(0.0);
        Some(ContinuousSnapshot {
            elapsed_s,
            batches: state.batches,
            photons_sent,
            photons_received: estimated_received(photons_sent, params.distance_km(), params.channel_noise),
            qber,
            qber_history: window(&state.qber_history),
            key_rate_history: window(&state.key_rate_history),
            metrics: state.latest.clone(),
            security_label: SecurityLabel::from_qber(qber),
        })
    }
}

impl Drop for ContinuousSimulation {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(
    parameters: SimulationParameters,
    batch: usize,
    seed: u64,
    capacity: usize,
    state: Arc<Mutex<LiveState>>,
    ticker: Receiver<Instant>,
    stop_rx: Receiver<()>,
) {
    let orchestrator = SimulationOrchestrator::new();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut request = SimulationRequest {
        scenario: Scenario::Auto { num_qubits: batch },
        parameters,
        ..SimulationRequest::default()
    };

    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(ticker) -> _ => {
                request.seed = Some(rng.gen());
                match orchestrator.run(&request) {
                    Ok(result) => {
                        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                        state.record(result.qber, result.metrics, capacity);
                    }
                    Err(e) => {
                        log::error!("continuous batch failed: {}", e);
                        state.lock().unwrap_or_else(PoisonError::into_inner).running = false;
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> ContinuousConfig {
        ContinuousConfig {
            tick_interval_ms: 10,
            ..ContinuousConfig::default()
        }
    }

    #[test]
    fn batch_size_bounds() {
        assert_eq!(batch_size(100.0, 100), 10);
        assert_eq!(batch_size(5000.0, 100), 100);
        assert_eq!(batch_size(1.0, 100), 1);
    }

    #[test]
    fn received_estimate_never_negative() {
        assert_eq!(estimated_received(1000, 200.0, 0.0), 0);
        assert_eq!(estimated_received(1000, 10.0, 0.5), 450);
    }

    #[test]
    fn labels() {
        assert_eq!(SecurityLabel::from_qber(0.05), SecurityLabel::High);
        assert_eq!(SecurityLabel::from_qber(0.11), SecurityLabel::Compromised);
    }

    #[test]
    fn idle_simulation_polls_nothing() {
        let mut sim = ContinuousSimulation::new(fast()).unwrap();
        assert!(!sim.is_running());
        assert!(sim.poll().is_none());
        sim.stop();
        sim.stop();
        assert!(!sim.is_running());
    }

    #[test]
    fn start_poll_stop() {
        let mut sim = ContinuousSimulation::new(fast()).unwrap();
        sim.start(SimulationParameters::default(), Some(1)).unwrap();
        assert!(sim.is_running());
        thread::sleep(Duration::from_millis(200));

        let snapshot = sim.poll().unwrap();
        assert!(snapshot.batches > 0);
        assert!(snapshot.qber_history.len() <= 20);
        assert_eq!(snapshot.qber_history.len(), snapshot.key_rate_history.len());
        assert!(snapshot.metrics.is_some());
        assert!(snapshot.photons_received <= snapshot.photons_sent);

        sim.stop();
        assert!(!sim.is_running());
        assert!(sim.poll().is_none());
    }

    #[test]
    fn restart_resets_history() {
        let mut sim = ContinuousSimulation::new(fast()).unwrap();
        sim.start(SimulationParameters::default(), Some(2)).unwrap();
        thread::sleep(Duration::from_millis(300));
        let before = sim.poll().unwrap();
        sim.start(SimulationParameters::default(), Some(3)).unwrap();
        let after = sim.poll().unwrap();
        assert!(after.elapsed_s < before.elapsed_s);
        assert!(after.batches < before.batches);
    }

    #[test]
    fn invalid_parameters_do_not_start() {
        let mut sim = ContinuousSimulation::new(fast()).unwrap();
        let params = SimulationParameters {
            channel_noise: 2.0,
            ..SimulationParameters::default()
        };
        assert!(sim.start(params, None).is_err());
        assert!(!sim.is_running());
    }
}
