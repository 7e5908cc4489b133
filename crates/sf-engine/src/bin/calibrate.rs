use rayon::prelude::*;
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sf_engine::{CalibrationConfig, ChannelHost, CostFrame, HostEnvironment, OptimizationManager};
use sf_optimizer::{OptimizerKind, SwarmConfig};
use sf_types::{RunId, SfResult, SlotHandle};

const DT: f64 = 0.05;
const STEPS: usize = 240;
const MASS: f64 = 1.0;
const TRUE_STIFFNESS: f64 = 4.0;
const TRUE_DAMPING: f64 = 0.4;

/// Unit force for the first two seconds, then free oscillation.
fn forcing(step: usize) -> f64 {
    if (step as f64) * DT < 2.0 {
        1.0
    } else {
        0.0
    }
}

/// Semi-implicit Euler step of `m x'' = F - c x' - k x`.
fn step(state: (f64, f64), force: f64, stiffness: f64, damping: f64) -> (f64, f64) {
    let (x, v) = state;
    let v = v + DT * (force - damping * v - stiffness * x) / MASS;
    (x + DT * v, v)
}

/// Displacement recorded with the true coefficients.
fn reference_trajectory() -> Vec<f64> {
    let mut state = (0.0, 0.0);
    (0..STEPS)
        .map(|i| {
            state = step(state, forcing(i), TRUE_STIFFNESS, TRUE_DAMPING);
            state.0
        })
        .collect()
}

struct Bindings {
    stiffness: SlotHandle,
    damping: SlotHandle,
    force: SlotHandle,
    position: SlotHandle,
    peak: SlotHandle,
}

/// Register the oscillator's parameters, driver and targets. Both roles
/// describe the model identically.
fn describe<H: HostEnvironment>(
    manager: &mut OptimizationManager<H>,
    reference: &[f64],
) -> SfResult<Bindings> {
    let slots = manager.slots_mut();
    let bindings = Bindings {
        stiffness: slots.register("stiffness"),
        damping: slots.register("damping"),
        force: slots.register("force"),
        position: slots.register("position"),
        peak: slots.register("peak"),
    };

    manager.add_parameter("stiffness", bindings.stiffness, 0.5, 10.0, Vec::new())?;
    manager.add_parameter("damping", bindings.damping, 0.05, 2.0, Vec::new())?;
    manager.add_driver(bindings.force)?;
    manager.add_target("position", bindings.position, None, 1.0)?;

    let peak = reference.iter().copied().fold(f64::MIN, f64::max);
    manager.add_target("peak", bindings.peak, Some(peak), 0.5)?;

    for (i, x) in reference.iter().enumerate() {
        let time = i as f64 * DT;
        manager.add_target_trajectory_row(&format!("{time}, {x}"))?;
        manager.add_driver_trajectory_row(&format!("{time}, {}", forcing(i)))?;
    }
    Ok(bindings)
}

/// Run the model for one proposal as evaluator `id`.
fn evaluate(
    id: u32,
    sender: crossbeam_channel::Sender<CostFrame>,
    reference: &[f64],
    run_id: RunId,
    values: &[f64],
) -> SfResult<f64> {
    let mut evaluator = OptimizationManager::new(ChannelHost::evaluator(id, sender));
    let bindings = describe(&mut evaluator, reference)?;
    evaluator.load_parameters(values)?;
    evaluator.begin_evaluation(run_id)?;

    let stiffness = evaluator.slots().get(bindings.stiffness)?;
    let damping = evaluator.slots().get(bindings.damping)?;
    let mut state = (0.0, 0.0);
    let mut peak = f64::MIN;
    for _ in 0..STEPS {
        evaluator.apply_drivers()?;
        let force = evaluator.slots().get(bindings.force)?;
        state = step(state, force, stiffness, damping);
        peak = peak.max(state.0);
        evaluator.slots_mut().set(bindings.position, state.0)?;
        evaluator.accumulate_step()?;
    }
    evaluator.slots_mut().set(bindings.peak, peak)?;
    evaluator.finish_evaluation()
}

fn load_config() -> anyhow::Result<CalibrationConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SIMFIT_CONFIG").ok());
    match path {
        Some(path) => Ok(CalibrationConfig::from_json_file(Path::new(&path))?),
        None => {
            info!("No configuration given, using the built-in particle swarm setup");
            Ok(CalibrationConfig::new(
                "damped_oscillator",
                OptimizerKind::ParticleSwarm(SwarmConfig::new(16, 30)),
            ))
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    let reference = reference_trajectory();

    let (host, sender) = ChannelHost::link();
    let mut proposer = OptimizationManager::new(host).with_config(&config)?;
    describe(&mut proposer, &reference)?;
    proposer.initialize()?;

    let total = proposer.num_runs_needed()?;
    let per_epoch = proposer.runs_per_epoch()?;
    info!(
        "Fitting stiffness and damping over {} runs, {} evaluated in parallel per epoch",
        total, per_epoch
    );

    let mut dispatched = 0;
    while dispatched < total {
        let batch = per_epoch.min(total - dispatched);
        let mut proposals = Vec::with_capacity(batch as usize);
        for _ in 0..batch {
            let run_id = proposer.propose()?;
            proposals.push((run_id, proposer.parameter_values()?));
        }

        proposals
            .par_iter()
            .enumerate()
            .try_for_each(|(worker, (run_id, values))| {
                evaluate(worker as u32, sender.clone(), &reference, *run_id, values).map(|_| ())
            })?;

        // Costs arrive in completion order.
        for _ in 0..batch {
            proposer.ingest_result()?;
        }
        dispatched += batch;
    }

    let report = proposer.finish()?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    println!("true stiffness {TRUE_STIFFNESS}, true damping {TRUE_DAMPING}");
    Ok(())
}
