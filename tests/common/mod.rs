#![allow(dead_code)]

use simrun::config::{Config, DeviceConfig, RadioConfig, RadioCredentials};
use simrun::session::{Backend, DeviceSession, RadioSession, SessionError};
use simrun::simulation::{SimulationEnvironment, SimulationError, SimulationKind};
use simrun::{Device, LinkStatus, RunMode};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Ordered record of every call the mocks receive.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}

pub struct MockSession {
    name: String,
    log: EventLog,
    fail_connect: bool,
    fields: HashMap<String, String>,
}

impl MockSession {
    pub fn new(name: &str, log: EventLog) -> Self {
        let mut fields = HashMap::new();
        fields.insert("pan.cycle_no".to_string(), "42".to_string());
        Self {
            name: name.to_string(),
            log,
            fail_connect: false,
            fields,
        }
    }
}

impl DeviceSession for MockSession {
    fn connect(&mut self, port: &str, baud_rate: u32) -> Result<(), SessionError> {
        self.log.push(format!("connect:{}:{}:{}", self.name, port, baud_rate));
        if self.fail_connect {
            return Err(SessionError::Open {
                port: port.to_string(),
                reason: "no such device".to_string(),
            });
        }
        Ok(())
    }

    fn read_state(&mut self, field: &str) -> Result<String, SessionError> {
        self.log.push(format!("read:{}:{}", self.name, field));
        self.fields.get(field).cloned().ok_or_else(|| SessionError::Rejected {
            field: field.to_string(),
            reason: "no such field".to_string(),
        })
    }

    fn write_state(&mut self, field: &str, value: &str) -> Result<(), SessionError> {
        self.log.push(format!("write:{}:{}={}", self.name, field, value));
        if field.starts_with("readonly.") {
            return Err(SessionError::Rejected {
                field: field.to_string(),
                reason: "field is read-only".to_string(),
            });
        }
        self.fields.insert(field.to_string(), value.to_string());
        Ok(())
    }

    fn override_state(&mut self, field: &str, value: &str) -> Result<(), SessionError> {
        self.log.push(format!("override:{}:{}={}", self.name, field, value));
        Ok(())
    }

    fn release_override(&mut self, field: &str) -> Result<(), SessionError> {
        self.log.push(format!("release:{}:{}", self.name, field));
        Err(SessionError::Rejected {
            field: field.to_string(),
            reason: "field is not overridden".to_string(),
        })
    }

    fn disconnect(&mut self) {
        self.log.push(format!("disconnect:{}", self.name));
    }
}

pub struct MockRadio {
    name: String,
    log: EventLog,
    fail_connect: bool,
}

impl RadioSession for MockRadio {
    fn connect(&mut self, imei: &str, credentials: &RadioCredentials) -> Result<(), SessionError> {
        self.log.push(format!(
            "radio-connect:{}:{}:{}",
            self.name,
            imei,
            credentials.email_username.clone().unwrap_or_default()
        ));
        if self.fail_connect {
            return Err(SessionError::Credentials("login refused".to_string()));
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        self.log.push(format!("radio-disconnect:{}", self.name));
    }
}

pub struct MockSimulation {
    log: EventLog,
    running: bool,
}

impl SimulationEnvironment for MockSimulation {
    fn start(&mut self, duration_s: f64) -> Result<(), SimulationError> {
        self.log.push(format!("sim-start:{}", duration_s));
        self.running = true;
        Ok(())
    }

    fn stop(&mut self, _output_dir: &Path) -> Result<(), SimulationError> {
        self.log.push("sim-stop");
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    pub log: EventLog,
    pub failing_devices: HashSet<String>,
    pub failing_radios: HashSet<String>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_device(mut self, name: &str) -> Self {
        self.failing_devices.insert(name.to_string());
        self
    }

    pub fn failing_radio(mut self, name: &str) -> Self {
        self.failing_radios.insert(name.to_string());
        self
    }
}

impl Backend for MockBackend {
    fn device_session(&self, device_name: &str, _run_dir: &Path) -> Box<dyn DeviceSession> {
        let mut session = MockSession::new(device_name, self.log.clone());
        session.fail_connect = self.failing_devices.contains(device_name);
        Box::new(session)
    }

    fn radio_session(&self, radio_name: &str, _run_dir: &Path) -> Box<dyn RadioSession> {
        Box::new(MockRadio {
            name: radio_name.to_string(),
            log: self.log.clone(),
            fail_connect: self.failing_radios.contains(radio_name),
        })
    }

    fn simulation(
        &self,
        kind: SimulationKind,
        seed: i64,
        devices: Vec<String>,
    ) -> Box<dyn SimulationEnvironment> {
        self.log
            .push(format!("sim-new:{:?}:{}:{}", kind, seed, devices.join(",")));
        Box::new(MockSimulation {
            log: self.log.clone(),
            running: false,
        })
    }
}

pub fn teensy(name: &str, port: &str) -> DeviceConfig {
    DeviceConfig {
        name: Some(name.to_string()),
        run_mode: Some("teensy".to_string()),
        port: Some(port.to_string()),
        baud_rate: Some(1_152_000),
        binary_filepath: None,
    }
}

pub fn native(name: &str, binary: &str) -> DeviceConfig {
    DeviceConfig {
        name: Some(name.to_string()),
        run_mode: Some("native".to_string()),
        port: None,
        baud_rate: None,
        binary_filepath: Some(binary.to_string()),
    }
}

pub fn radio(device: &str, connect: bool) -> RadioConfig {
    RadioConfig {
        connected_device: Some(device.to_string()),
        imei: Some("300234010753370".to_string()),
        connect: Some(connect),
    }
}

pub fn config(devices: Vec<DeviceConfig>) -> Config {
    Config {
        seed: 42,
        sim_duration: 0.0,
        single_sat_sim: true,
        devices,
        radios: Vec::new(),
    }
}

pub fn credentials() -> RadioCredentials {
    RadioCredentials {
        email_username: Some("pan.ground@example.com".to_string()),
        email_password: Some("hunter2".to_string()),
        imei: Some(300_234_010_753_370),
    }
}

/// A device map built directly from mock sessions, for console tests.
pub fn device_map(names: &[&str], log: &EventLog) -> BTreeMap<String, Device> {
    names
        .iter()
        .map(|name| {
            let device = Device {
                name: name.to_string(),
                run_mode: RunMode::Teensy,
                port: format!("/dev/tty{}", name),
                baud_rate: 1_152_000,
                session: Box::new(MockSession::new(name, log.clone())),
                status: LinkStatus::Connected,
            };
            (name.to_string(), device)
        })
        .collect()
}
