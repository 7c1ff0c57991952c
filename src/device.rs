use crate::session::{DeviceSession, RadioSession};
use std::fmt;

/// Baud rate used for every native binary, whatever the config says.
pub const NATIVE_BAUD_RATE: u32 = 9600;

pub const FLIGHT_CONTROLLER: &str = "FlightController";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Teensy,
    Native,
}

impl RunMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "teensy" => Some(RunMode::Teensy),
            "native" => Some(RunMode::Native),
            _ => None,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Teensy => write!(f, "teensy"),
            RunMode::Native => write!(f, "native"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connected,
    Disconnected,
}

pub struct Device {
    pub name: String,
    pub run_mode: RunMode,
    pub port: String,
    pub baud_rate: u32,
    pub session: Box<dyn DeviceSession>,
    pub status: LinkStatus,
}

impl Device {
    pub fn disconnect(&mut self) {
        if self.status == LinkStatus::Connected {
            self.session.disconnect();
            self.status = LinkStatus::Disconnected;
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("run_mode", &self.run_mode)
            .field("port", &self.port)
            .field("baud_rate", &self.baud_rate)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

pub struct Radio {
    pub name: String,
    /// Name of the device this radio is attached to; the device itself lives
    /// in the orchestrator's device map.
    pub device: String,
    pub session: Box<dyn RadioSession>,
    pub status: LinkStatus,
}

impl Radio {
    pub fn name_for(device: &str) -> String {
        format!("{}Radio", device)
    }

    pub fn disconnect(&mut self) {
        if self.status == LinkStatus::Connected {
            self.session.disconnect();
            self.status = LinkStatus::Disconnected;
        }
    }
}

impl fmt::Debug for Radio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Radio")
            .field("name", &self.name)
            .field("device", &self.device)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
