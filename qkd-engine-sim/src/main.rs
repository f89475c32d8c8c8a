//! QKD Engine Simulator command line.
//!
//! ```text
//! qkd-engine-sim run --qubits 64 --protocol six-state --attack intercept_resend
//! qkd-engine-sim run --bits 0110 --bases +x+x --bob-bases +x+x
//! qkd-engine-sim lab --photons 20000 --interception-rate 0.3
//! qkd-engine-sim stream --seconds 5
//! ```
//!
//! `run` and `lab` print one JSON record to stdout. `stream` prints a line per
//! poll. Logs go to stderr; `RUST_LOG` controls verbosity.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;

use bb84::prelude::{AttackType, ProtocolKind};
use qkd_engine_sim::prelude::*;
use qkd_engine_sim::Result;

#[derive(Parser, Debug)]
#[command(name = "qkd-engine-sim", version, about = "BB84-family QKD simulation engine")]
struct Cli {
    /// TOML configuration; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One synchronous run, JSON to stdout
    Run(RunArgs),
    /// Per-photon lab run, JSON to stdout
    Lab(LabArgs),
    /// Continuous mode, one line per poll
    Stream(StreamArgs),
}

#[derive(Args, Debug)]
struct LinkArgs {
    #[arg(long, value_parser = wire_enum::<ProtocolKind>)]
    protocol: Option<ProtocolKind>,
    #[arg(long, value_parser = wire_enum::<AttackType>)]
    attack: Option<AttackType>,
    /// Fiber length (m)
    #[arg(long)]
    distance_m: Option<f64>,
    #[arg(long)]
    noise: Option<f64>,
    #[arg(long)]
    threshold: Option<f64>,
    #[arg(long)]
    photon_rate_mhz: Option<f64>,
    #[arg(long, value_parser = wire_enum::<Backend>)]
    backend: Option<Backend>,
    #[arg(long)]
    seed: Option<u64>,
}

impl LinkArgs {
    fn apply(&self, params: &mut SimulationParameters) {
        if let Some(protocol) = self.protocol {
            params.protocol_variant = protocol;
        }
        if let Some(attack) = self.attack {
            params.eve_attack = attack;
        }
        if let Some(distance) = self.distance_m {
            params.distance_m = distance;
        }
        if let Some(noise) = self.noise {
            params.channel_noise = noise;
        }
        if let Some(threshold) = self.threshold {
            params.qber_threshold = threshold;
        }
        if let Some(rate) = self.photon_rate_mhz {
            params.photon_rate_mhz = rate;
        }
        if let Some(backend) = self.backend {
            params.backend = backend;
        }
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Alice's bits (manual mode, with --bases)
    #[arg(long, requires = "bases")]
    bits: Option<String>,
    /// Alice's bases, `+`, `x` or `o`
    #[arg(long, requires = "bits")]
    bases: Option<String>,
    /// Force Bob's bases in manual mode
    #[arg(long, requires = "bits")]
    bob_bases: Option<String>,
    /// Random qubit count (auto mode)
    #[arg(long, conflicts_with = "bits")]
    qubits: Option<usize>,
    #[arg(long, value_parser = wire_enum::<RngType>)]
    rng: Option<RngType>,
    /// Fail rather than fall back when hardware entropy is unavailable
    #[arg(long)]
    require_hardware: bool,
    /// Token for the hardware entropy client
    #[arg(long)]
    credential: Option<String>,
    #[command(flatten)]
    link: LinkArgs,
}

#[derive(Args, Debug)]
struct LabArgs {
    #[arg(long)]
    photons: Option<usize>,
    #[arg(long, value_parser = wire_enum::<ProtocolKind>)]
    protocol: Option<ProtocolKind>,
    #[arg(long, value_parser = wire_enum::<AttackType>)]
    attack: Option<AttackType>,
    #[arg(long)]
    interception_rate: Option<f64>,
    /// Total channel loss (dB)
    #[arg(long)]
    loss_db: Option<f64>,
    #[arg(long)]
    distance_km: Option<f64>,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct StreamArgs {
    #[arg(long, default_value_t = 5)]
    seconds: u64,
    #[command(flatten)]
    link: LinkArgs,
}

/// Parses a flag through the type's serde wire name (`six-state`,
/// `intercept_resend`, ...).
fn wire_enum<T: DeserializeOwned>(text: &str) -> std::result::Result<T, String> {
    serde_json::from_value(serde_json::Value::String(text.to_string())).map_err(|e| e.to_string())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    if let Err(e) = execute(cli) {
        log::error!("{}", e);
        std::process::exit(if e.is_input_error() { 2 } else { 1 });
    }
}

fn execute(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_toml_file(path)?,
        None => EngineConfig::default(),
    };
    match cli.command {
        Command::Run(args) => run(&mut config, args),
        Command::Lab(args) => lab(&mut config, args),
        Command::Stream(args) => stream(&mut config, args),
    }
}

fn run(config: &mut EngineConfig, args: RunArgs) -> Result<()> {
    let request = &mut config.simulation;
    if let (Some(bits), Some(bases)) = (args.bits, args.bases) {
        request.scenario = Scenario::Manual {
            alice_bits: bits,
            alice_bases: bases,
            bob_bases: args.bob_bases,
        };
    } else if let Some(n) = args.qubits {
        request.scenario = Scenario::Auto { num_qubits: n };
    }
    if let Some(rng) = args.rng {
        request.rng = rng;
    }
    request.require_true_randomness |= args.require_hardware;
    if args.credential.is_some() {
        request.credential = args.credential;
    }
    if args.link.seed.is_some() {
        request.seed = args.link.seed;
    }
    args.link.apply(&mut request.parameters);

    let result = simulate(request)?;
    log::info!(
        "{}: qber {:.4}, {} secure bits, {:?}",
        result.protocol_variant.display_name(),
        result.qber,
        result.final_key.len(),
        result.final_state()
    );
    println!("{}", result.to_json()?);
    Ok(())
}

fn lab(config: &mut EngineConfig, args: LabArgs) -> Result<()> {
    let params = &mut config.lab;
    if let Some(protocol) = args.protocol {
        params.protocol_variant = protocol;
    }
    if let Some(attack) = args.attack {
        params.attack_strategy = attack;
    }
    if let Some(rate) = args.interception_rate {
        params.eve_interception_rate = rate;
    }
    if let Some(loss) = args.loss_db {
        params.channel_loss_db = loss;
    }
    if let Some(km) = args.distance_km {
        params.distance_km = km;
    }
    let photons = args.photons.unwrap_or(config.lab_photons);

    let report = LabSimulator::new(params.clone())?.run(photons, args.seed)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn stream(config: &mut EngineConfig, args: StreamArgs) -> Result<()> {
    let mut params = config.simulation.parameters.clone();
    args.link.apply(&mut params);
    let poll_every = Duration::from_millis(config.continuous.tick_interval_ms);

    let mut sim = ContinuousSimulation::new(config.continuous.clone())?;
    sim.start(params, args.link.seed)?;

    println!("{:>8}  {:>8}  {:>14}  {:>14}  {:>8}  {:>12}", "t (s)", "batches", "sent", "received", "QBER", "security");
    println!("{:─>8}  {:─>8}  {:─>14}  {:─>14}  {:─>8}  {:─>12}", "", "", "", "", "", "");
    let deadline = Instant::now() + Duration::from_secs(args.seconds);
    while Instant::now() < deadline {
        thread::sleep(poll_every);
        match sim.poll() {
            Some(s) => println!(
                "{:>8.1}  {:>8}  {:>14}  {:>14}  {:>8.4}  {:>12}",
                s.elapsed_s,
                s.batches,
                s.photons_sent,
                s.photons_received,
                s.qber,
                format!("{:?}", s.security_label)
            ),
            None => {
                log::warn!("continuous worker stopped early");
                break;
            }
        }
    }
    sim.stop();
    Ok(())
}
