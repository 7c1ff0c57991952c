use crate::binary::{Binary, BinaryError};
use crate::config::{Config, RadioCredentials};
use crate::console::{CommandSession, Outcome, PROMPT};
use crate::device::{Device, LinkStatus, Radio, RunMode, NATIVE_BAUD_RATE};
use crate::monitor::{BinaryMonitor, ExitReport, SharedBinaries};
use crate::session::{Backend, SessionError};
use crate::simulation::{NoSimulation, SimulationEnvironment, SimulationError, SimulationKind};
use chrono::Local;
use colored::*;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, warn};

/// Upper bound on how long shutdown waits for the binary monitor to exit.
pub const MONITOR_JOIN_TIMEOUT: Duration = Duration::from_millis(2000);

/// The run's single running flag.
///
/// It goes true once when setup begins and false once when shutdown begins;
/// only the call that performs the true→false transition runs shutdown.
#[derive(Debug, Default)]
pub struct RunState {
    running: AtomicBool,
    stopped: Notify,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clears the flag, returning whether this call was the one that cleared it.
    pub fn stop(&self) -> bool {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        if was_running {
            self.stopped.notify_one();
        }
        was_running
    }

    /// Resolves once [`RunState::stop`] has cleared the flag.
    pub async fn stopped(&self) {
        self.stopped.notified().await;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReason {
    pub message: String,
    pub is_error: bool,
}

impl StopReason {
    pub fn normal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: true,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_error {
            write!(f, "Error: {}", self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShutdownReport {
    pub reason: StopReason,
    pub radios_disconnected: usize,
    pub devices_disconnected: usize,
    pub binaries_terminated: usize,
    pub exits: Vec<ExitReport>,
}

pub struct Orchestrator {
    config: Config,
    credentials: Option<RadioCredentials>,
    backend: Box<dyn Backend>,
    run_dir: PathBuf,

    devices: BTreeMap<String, Device>,
    radios: BTreeMap<String, Radio>,
    binaries: SharedBinaries,
    simulation: Box<dyn SimulationEnvironment>,

    run: Arc<RunState>,
    monitor: Option<BinaryMonitor>,
}

impl Orchestrator {
    /// Creates `<data_dir>/<timestamp>` for the run's output.
    pub fn new(
        config: Config,
        credentials: Option<RadioCredentials>,
        data_dir: &Path,
        backend: Box<dyn Backend>,
    ) -> Result<Self, SetupError> {
        let run_dir = data_dir.join(Local::now().format("%Y%m%d-%H%M%S").to_string());
        fs::create_dir_all(&run_dir).map_err(|source| SetupError::RunDir {
            path: run_dir.display().to_string(),
            source,
        })?;

        Ok(Self {
            config,
            credentials,
            backend,
            run_dir,
            devices: BTreeMap::new(),
            radios: BTreeMap::new(),
            binaries: Arc::new(Mutex::new(Vec::new())),
            simulation: Box::new(NoSimulation),
            run: Arc::new(RunState::new()),
            monitor: None,
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn is_running(&self) -> bool {
        self.run.is_running()
    }

    pub fn devices(&self) -> &BTreeMap<String, Device> {
        &self.devices
    }

    pub fn radios(&self) -> &BTreeMap<String, Radio> {
        &self.radios
    }

    pub fn binaries(&self) -> SharedBinaries {
        Arc::clone(&self.binaries)
    }

    pub fn simulation_running(&self) -> bool {
        self.simulation.is_running()
    }

    pub fn monitor_started(&self) -> bool {
        self.monitor.is_some()
    }

    /// Full lifecycle: setup, command loop on `input`, shutdown.
    ///
    /// Returns the shutdown report; the caller is expected to exit the
    /// process afterwards.
    pub async fn start<R>(&mut self, input: R) -> Option<ShutdownReport>
    where
        R: AsyncBufRead + Unpin,
    {
        println!("{}", "🛰️  Flight Software Simulation Run".bright_blue().bold());
        println!("{}", "==================================".bright_blue());
        println!("Run data: {}", self.run_dir.display().to_string().bright_white());

        if let Err(e) = self.setup().await {
            return self.shutdown(StopReason::error(e.to_string())).await;
        }

        let reason = self.command_loop(input).await;
        self.shutdown(reason).await
    }

    /// Devices, then radios, then the simulation. The first failure aborts
    /// setup; whatever was already brought up is left for shutdown.
    pub async fn setup(&mut self) -> Result<(), SetupError> {
        self.run.start();
        self.set_up_devices().await?;
        self.set_up_radios()?;
        self.set_up_simulation()?;

        if self.devices.is_empty() {
            return Err(SetupError::NoDevices);
        }
        Ok(())
    }

    async fn set_up_devices(&mut self) -> Result<(), SetupError> {
        let entries = self.config.devices.clone();
        for entry in entries {
            let name = entry.name.clone().ok_or(SetupError::MissingDeviceName)?;
            let run_mode = entry
                .run_mode
                .as_deref()
                .and_then(RunMode::parse)
                .ok_or_else(|| SetupError::InvalidRunMode {
                    device: name.clone(),
                    mode: entry.run_mode.clone().unwrap_or_default(),
                })?;
            if self.devices.contains_key(&name) {
                return Err(SetupError::DuplicateDevice(name));
            }

            let (port, baud_rate) = match run_mode {
                RunMode::Teensy => {
                    let port = entry.port.clone().ok_or_else(|| SetupError::MissingField {
                        device: name.clone(),
                        field: "port",
                    })?;
                    let baud_rate = entry.baud_rate.ok_or_else(|| SetupError::MissingField {
                        device: name.clone(),
                        field: "baud_rate",
                    })?;
                    (port, baud_rate)
                }
                RunMode::Native => {
                    let binary_path = entry.binary_filepath.clone().ok_or_else(|| SetupError::MissingField {
                        device: name.clone(),
                        field: "binary_filepath",
                    })?;
                    let binary = Binary::spawn(&name, &binary_path)?;
                    let port = binary.slave_path().to_string();
                    self.binaries.lock().await.push(binary);
                    (port, NATIVE_BAUD_RATE)
                }
            };

            let mut session = self.backend.device_session(&name, &self.run_dir);
            session
                .connect(&port, baud_rate)
                .map_err(|source| SetupError::DeviceConnect {
                    device: name.clone(),
                    source,
                })?;

            info!("Device {} ({}) connected on {} at {} baud", name, run_mode, port, baud_rate);
            self.devices.insert(
                name.clone(),
                Device {
                    name,
                    run_mode,
                    port,
                    baud_rate,
                    session,
                    status: LinkStatus::Connected,
                },
            );
        }

        self.monitor = Some(BinaryMonitor::spawn(Arc::clone(&self.binaries), Arc::clone(&self.run)));
        Ok(())
    }

    fn set_up_radios(&mut self) -> Result<(), SetupError> {
        let entries = self.config.radios.clone();
        for entry in entries {
            let device = entry
                .connected_device
                .clone()
                .ok_or(SetupError::MissingConnectedDevice)?;
            let connect = entry
                .connect
                .ok_or_else(|| SetupError::MissingConnectFlag { device: device.clone() })?;
            if !connect {
                debug!("Radio for {} is configured but not requested", device);
                continue;
            }

            let imei = entry
                .imei
                .clone()
                .filter(|imei| !imei.is_empty())
                .ok_or_else(|| SetupError::MissingRadioField {
                    device: device.clone(),
                    field: "imei",
                })?;
            let credentials = self.checked_credentials(&device)?;

            let name = Radio::name_for(&device);
            let mut session = self.backend.radio_session(&name, &self.run_dir);
            session
                .connect(&imei, credentials)
                .map_err(|source| SetupError::RadioConnect {
                    device: device.clone(),
                    source,
                })?;

            info!("{} connected (IMEI {})", name, imei);
            self.radios.insert(
                name.clone(),
                Radio {
                    name,
                    device,
                    session,
                    status: LinkStatus::Connected,
                },
            );
        }
        Ok(())
    }

    fn checked_credentials(&self, device: &str) -> Result<&RadioCredentials, SetupError> {
        let missing = |field: &'static str| SetupError::MissingRadioField {
            device: device.to_string(),
            field,
        };
        let credentials = self.credentials.as_ref().ok_or_else(|| missing("radio keys"))?;
        if credentials.imei.is_none() {
            return Err(missing("imei"));
        }
        if credentials.email_username.is_none() {
            return Err(missing("email_username"));
        }
        if credentials.email_password.is_none() {
            return Err(missing("email_password"));
        }
        Ok(credentials)
    }

    fn set_up_simulation(&mut self) -> Result<(), SetupError> {
        if self.config.sim_duration > 0.0 {
            let kind = SimulationKind::from_flag(self.config.single_sat_sim);
            let devices = self.devices.keys().cloned().collect();
            self.simulation = self.backend.simulation(kind, self.config.seed, devices);
            self.simulation.start(self.config.sim_duration)?;
        } else {
            self.simulation = Box::new(NoSimulation);
        }
        Ok(())
    }

    async fn command_loop<R>(&mut self, input: R) -> StopReason
    where
        R: AsyncBufRead + Unpin,
    {
        let mut session = match CommandSession::new(&mut self.devices) {
            Some(session) => session,
            None => return StopReason::error(SetupError::NoDevices.to_string()),
        };
        println!("Commanding {}. Type 'help' for a list of commands.", session.target().bright_cyan());

        let mut lines = input.lines();
        let mut stdout = std::io::stdout();
        let interrupt = tokio::signal::ctrl_c();
        tokio::pin!(interrupt);
        let mut interrupt_armed = true;

        loop {
            print!("{}", PROMPT);
            let _ = stdout.flush();

            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => match session.execute(&line, &mut stdout) {
                        Ok(Outcome::Continue) => {}
                        Ok(Outcome::Quit) => return StopReason::normal("Exiting command line."),
                        Err(e) => return StopReason::error(format!("Console output failed: {}", e)),
                    },
                    Ok(None) => return StopReason::normal("End of input, exiting command line."),
                    Err(e) => return StopReason::error(format!("Could not read command: {}", e)),
                },
                result = &mut interrupt, if interrupt_armed => match result {
                    Ok(()) => {
                        println!();
                        return StopReason::normal("Exiting due to keyboard interrupt.");
                    }
                    Err(e) => {
                        warn!("Could not listen for interrupts: {}", e);
                        interrupt_armed = false;
                    }
                },
            }
        }
    }

    /// Tears the run down exactly once.
    ///
    /// Returns `None` when the run was already stopped (or never started).
    pub async fn shutdown(&mut self, reason: StopReason) -> Option<ShutdownReport> {
        if !self.run.stop() {
            debug!("Shutdown requested again ({}); already stopped", reason.message);
            return None;
        }

        if reason.is_error {
            error!("{}", reason.message);
            println!("{}", reason.to_string().bright_red());
        } else {
            info!("{}", reason.message);
            println!("{}", reason);
        }

        println!("Stopping binary monitor...");
        let exits = match self.monitor.take() {
            Some(monitor) => monitor.join(MONITOR_JOIN_TIMEOUT).await,
            None => Vec::new(),
        };

        println!("Stopping simulation (please be patient)...");
        if let Err(e) = self.simulation.stop(&self.run_dir) {
            debug!("Simulation stop skipped: {}", e);
        }

        println!("Terminating {} radio connection(s)...", self.radios.len());
        let mut radios_disconnected = 0;
        for radio in self.radios.values_mut() {
            if radio.status == LinkStatus::Connected {
                radio.disconnect();
                radios_disconnected += 1;
            }
        }

        println!("Terminating {} device connection(s)...", self.devices.len());
        let mut devices_disconnected = 0;
        for device in self.devices.values_mut() {
            if device.status == LinkStatus::Connected {
                device.disconnect();
                devices_disconnected += 1;
            }
        }

        let mut binaries = self.binaries.lock().await;
        let mut binaries_terminated = 0;
        for binary in binaries.iter_mut() {
            if !binary.is_terminated() {
                binary.terminate();
                binaries_terminated += 1;
            }
        }

        println!("{}", "🛑 Simulation run stopped".bright_white());
        Some(ShutdownReport {
            reason,
            radios_disconnected,
            devices_disconnected,
            binaries_terminated,
            exits,
        })
    }
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Could not create run directory {path}: {source}")]
    RunDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration file. A device's name was not specified.")]
    MissingDeviceName,
    #[error("Device configuration for {device} is invalid: unsupported run_mode '{mode}'")]
    InvalidRunMode { device: String, mode: String },
    #[error("Device configuration for {device} does not specify {field}")]
    MissingField { device: String, field: &'static str },
    #[error("Device {0} is configured more than once")]
    DuplicateDevice(String),
    #[error(transparent)]
    Binary(#[from] BinaryError),
    #[error("A required device is disconnected: {device}: {source}")]
    DeviceConnect {
        device: String,
        #[source]
        source: SessionError,
    },
    #[error("Invalid configuration file. A radio's connected device was not specified.")]
    MissingConnectedDevice,
    #[error("Configuration for {device} does not specify whether or not to connect to the radio")]
    MissingConnectFlag { device: String },
    #[error("Radio for {device} is missing {field}")]
    MissingRadioField { device: String, field: &'static str },
    #[error("Unable to connect to radio for {device}: {source}")]
    RadioConnect {
        device: String,
        #[source]
        source: SessionError,
    },
    #[error("Could not start simulation: {0}")]
    Simulation(#[from] SimulationError),
    #[error("No devices to command")]
    NoDevices,
}
