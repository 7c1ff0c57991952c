use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Run configuration handed to the orchestrator.
///
/// Per-entry fields are optional at the schema level; their presence is
/// checked when the corresponding device or radio is set up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub seed: i64,
    pub sim_duration: f64,
    pub single_sat_sim: bool,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    #[serde(default)]
    pub radios: Vec<RadioConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    pub name: Option<String>,
    pub run_mode: Option<String>,
    pub port: Option<String>,
    pub baud_rate: Option<u32>,
    pub binary_filepath: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RadioConfig {
    pub connected_device: Option<String>,
    pub imei: Option<String>,
    pub connect: Option<bool>,
}

/// Carrier credentials shared by every radio.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RadioCredentials {
    pub email_username: Option<String>,
    pub email_password: Option<String>,
    pub imei: Option<i64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Malformed config file. The following errors were found: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Config = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Schema-level checks that must hold before any connection is attempted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if !self.sim_duration.is_finite() || self.sim_duration < 0.0 {
            errors.push(format!("sim_duration: min value is 0, got {}", self.sim_duration));
        }

        let mut seen = HashSet::new();
        for (index, device) in self.devices.iter().enumerate() {
            let label = device
                .name
                .clone()
                .unwrap_or_else(|| format!("devices[{}]", index));

            if let Some(name) = &device.name {
                if !seen.insert(name.as_str()) {
                    errors.push(format!("{}: duplicate device name", label));
                }
            }

            match device.run_mode.as_deref() {
                None | Some("teensy") | Some("native") => {}
                Some(other) => errors.push(format!("{}: unallowed run_mode '{}'", label, other)),
            }

            let is_native = device.run_mode.as_deref() == Some("native");
            let is_teensy = device.run_mode.as_deref() == Some("teensy");

            if device.binary_filepath.is_some() {
                if !is_native {
                    errors.push(format!("{}: binary_filepath requires run_mode 'native'", label));
                }
                if device.port.is_some() || device.baud_rate.is_some() {
                    errors.push(format!("{}: binary_filepath excludes port and baud_rate", label));
                }
            }
            if device.port.is_some() && !is_teensy {
                errors.push(format!("{}: port requires run_mode 'teensy'", label));
            }
            if device.baud_rate.is_some() && !is_teensy {
                errors.push(format!("{}: baud_rate requires run_mode 'teensy'", label));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

impl RadioCredentials {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        read_json(path.as_ref())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}
