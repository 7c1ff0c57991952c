//! Session contracts for devices and radios.
//!
//! The orchestrator never talks to hardware directly; it goes through the
//! traits here. [`HardwareBackend`] wires them to serial ports and the
//! carrier radio link, tests swap in their own [`Backend`].

pub mod radio;
pub mod serial;

pub use radio::CredentialedRadio;
pub use serial::SerialSession;

use crate::config::RadioCredentials;
use crate::simulation::{Simulation, SimulationEnvironment, SimulationKind};
use crate::wire::WireError;
use std::path::Path;
use thiserror::Error;

/// Request/response channel to one device's state fields.
///
/// Calls block until the device answers or the session's own timeout expires.
pub trait DeviceSession: Send {
    fn connect(&mut self, port: &str, baud_rate: u32) -> Result<(), SessionError>;
    fn read_state(&mut self, field: &str) -> Result<String, SessionError>;
    fn write_state(&mut self, field: &str, value: &str) -> Result<(), SessionError>;
    /// Force a simulation-only value that shadows writes until released.
    fn override_state(&mut self, field: &str, value: &str) -> Result<(), SessionError>;
    fn release_override(&mut self, field: &str) -> Result<(), SessionError>;
    fn disconnect(&mut self);
}

pub trait RadioSession: Send {
    fn connect(&mut self, imei: &str, credentials: &RadioCredentials) -> Result<(), SessionError>;
    fn disconnect(&mut self);
}

/// Constructs the external collaborators for a run.
pub trait Backend: Send + Sync {
    fn device_session(&self, device_name: &str, run_dir: &Path) -> Box<dyn DeviceSession>;

    fn radio_session(&self, radio_name: &str, run_dir: &Path) -> Box<dyn RadioSession>;

    fn simulation(
        &self,
        kind: SimulationKind,
        seed: i64,
        devices: Vec<String>,
    ) -> Box<dyn SimulationEnvironment>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HardwareBackend;

impl Backend for HardwareBackend {
    fn device_session(&self, device_name: &str, _run_dir: &Path) -> Box<dyn DeviceSession> {
        Box::new(SerialSession::new(device_name))
    }

    fn radio_session(&self, radio_name: &str, run_dir: &Path) -> Box<dyn RadioSession> {
        Box::new(CredentialedRadio::new(radio_name, run_dir))
    }

    fn simulation(
        &self,
        kind: SimulationKind,
        seed: i64,
        devices: Vec<String>,
    ) -> Box<dyn SimulationEnvironment> {
        Box::new(Simulation::new(kind, seed, devices))
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Could not open {port}: {reason}")]
    Open { port: String, reason: String },
    #[error("Session is not connected")]
    NotConnected,
    #[error("Timed out waiting for a reply about '{0}'")]
    Timeout(String),
    #[error("Device rejected '{field}': {reason}")]
    Rejected { field: String, reason: String },
    #[error("Invalid credentials: {0}")]
    Credentials(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),
}
