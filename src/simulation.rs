use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info};

/// Simulated time advanced per step; steps run in real time.
pub const SIM_STEP_MS: u64 = 100;

pub const SUMMARY_FILE: &str = "simulation.json";

/// Contract shared by every simulation environment, including the no-op one.
pub trait SimulationEnvironment: Send {
    fn start(&mut self, duration_s: f64) -> Result<(), SimulationError>;
    fn stop(&mut self, output_dir: &Path) -> Result<(), SimulationError>;
    fn is_running(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationKind {
    SingleSatellite,
    Formation,
}

impl SimulationKind {
    pub fn from_flag(single_sat_sim: bool) -> Self {
        if single_sat_sim {
            SimulationKind::SingleSatellite
        } else {
            SimulationKind::Formation
        }
    }

    pub fn entity_count(&self, devices: usize) -> usize {
        match self {
            SimulationKind::SingleSatellite => 1,
            SimulationKind::Formation => devices.max(2),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub kind: SimulationKind,
    pub seed: i64,
    pub duration_s: f64,
    pub elapsed_s: f64,
    pub steps: u64,
    pub entities: usize,
    pub devices: Vec<String>,
}

#[derive(Debug, Default)]
struct StepState {
    running: AtomicBool,
    steps: AtomicU64,
}

pub struct Simulation {
    kind: SimulationKind,
    seed: i64,
    devices: Vec<String>,
    duration_s: Option<f64>,
    state: Arc<StepState>,
    task: Option<JoinHandle<()>>,
}

impl Simulation {
    pub fn new(kind: SimulationKind, seed: i64, devices: Vec<String>) -> Self {
        Self {
            kind,
            seed,
            devices,
            duration_s: None,
            state: Arc::new(StepState::default()),
            task: None,
        }
    }

    pub fn steps(&self) -> u64 {
        self.state.steps.load(Ordering::SeqCst)
    }

    pub fn summary(&self) -> SimulationSummary {
        let steps = self.steps();
        SimulationSummary {
            kind: self.kind,
            seed: self.seed,
            duration_s: self.duration_s.unwrap_or_default(),
            elapsed_s: steps as f64 * SIM_STEP_MS as f64 / 1000.0,
            steps,
            entities: self.kind.entity_count(self.devices.len()),
            devices: self.devices.clone(),
        }
    }
}

impl SimulationEnvironment for Simulation {
    fn start(&mut self, duration_s: f64) -> Result<(), SimulationError> {
        if self.task.is_some() {
            return Err(SimulationError::AlreadyStarted);
        }
        if !duration_s.is_finite() || duration_s <= 0.0 {
            return Err(SimulationError::InvalidDuration(duration_s));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SimulationError::NoRuntime)?;

        let total_steps = (duration_s * 1000.0 / SIM_STEP_MS as f64).ceil() as u64;
        self.duration_s = Some(duration_s);
        self.state.running.store(true, Ordering::SeqCst);

        let state = Arc::clone(&self.state);
        self.task = Some(runtime.spawn(async move {
            let mut interval = time::interval(Duration::from_millis(SIM_STEP_MS));
            // First tick completes immediately
            interval.tick().await;
            while state.running.load(Ordering::SeqCst) {
                interval.tick().await;
                let step = state.steps.fetch_add(1, Ordering::SeqCst) + 1;
                if step >= total_steps {
                    state.running.store(false, Ordering::SeqCst);
                    debug!("Simulation reached its {} step horizon", total_steps);
                }
            }
        }));

        info!(
            "🛰️  {:?} simulation started for {:.1}s (seed {}, {} entities)",
            self.kind,
            duration_s,
            self.seed,
            self.kind.entity_count(self.devices.len())
        );
        Ok(())
    }

    fn stop(&mut self, output_dir: &Path) -> Result<(), SimulationError> {
        let task = self.task.take().ok_or(SimulationError::NotStarted)?;
        self.state.running.store(false, Ordering::SeqCst);
        task.abort();

        let summary = self.summary();
        let json = serde_json::to_string_pretty(&summary)?;
        fs::write(output_dir.join(SUMMARY_FILE), json)?;

        info!("Simulation stopped after {:.1}s of simulated time", summary.elapsed_s);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }
}

/// Stand-in used when no simulation duration is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSimulation;

impl SimulationEnvironment for NoSimulation {
    fn start(&mut self, _duration_s: f64) -> Result<(), SimulationError> {
        Ok(())
    }

    fn stop(&mut self, _output_dir: &Path) -> Result<(), SimulationError> {
        Ok(())
    }

    fn is_running(&self) -> bool {
        false
    }
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Simulation was never started")]
    NotStarted,
    #[error("Simulation is already running")]
    AlreadyStarted,
    #[error("Invalid simulation duration {0}")]
    InvalidDuration(f64),
    #[error("No async runtime available to drive the simulation")]
    NoRuntime,
    #[error("Could not write simulation summary: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not encode simulation summary: {0}")]
    Encode(#[from] serde_json::Error),
}
