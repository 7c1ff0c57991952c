//! Native flight software binaries wrapped in a pseudo-terminal so that they
//! present the same serial interface as a Teensy.

use std::fmt;
use std::process::{Child, ExitStatus};
use thiserror::Error;
use tracing::{debug, info, warn};

#[cfg(unix)]
use std::os::fd::OwnedFd;

/// How a native binary was last seen to have ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryExit {
    Exited(ExitStatus),
    /// The process could no longer be queried, e.g. it was reaped concurrently.
    Lost,
}

impl fmt::Display for BinaryExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryExit::Exited(status) => match status.code() {
                Some(code) => write!(f, "{}", code),
                None => write!(f, "{}", status),
            },
            BinaryExit::Lost => write!(f, "unknown"),
        }
    }
}

#[cfg(unix)]
struct PtyPair {
    master: OwnedFd,
    slave: OwnedFd,
}

pub struct Binary {
    device_name: String,
    slave_path: String,
    child: Child,
    #[cfg(unix)]
    pty: Option<PtyPair>,
    exit: Option<BinaryExit>,
}

impl Binary {
    /// Spawn `binary_path` with stdin/stdout/stderr on the master side of a
    /// fresh pseudo-terminal. The slave side's path is what the device
    /// session connects to.
    #[cfg(unix)]
    pub fn spawn(device_name: &str, binary_path: &str) -> Result<Self, BinaryError> {
        use nix::pty::openpty;
        use nix::unistd::ttyname;
        use std::process::{Command, Stdio};

        let pty_err = |e: nix::Error| BinaryError::Pty {
            device: device_name.to_string(),
            reason: e.to_string(),
        };
        let spawn_err = |e: std::io::Error| BinaryError::Spawn {
            device: device_name.to_string(),
            path: binary_path.to_string(),
            source: e,
        };

        let pair = openpty(None, None).map_err(pty_err)?;
        let slave_path = ttyname(&pair.slave)
            .map_err(pty_err)?
            .to_string_lossy()
            .into_owned();

        let stdin = pair.master.try_clone().map_err(spawn_err)?;
        let stdout = pair.master.try_clone().map_err(spawn_err)?;
        let stderr = pair.master.try_clone().map_err(spawn_err)?;

        let child = Command::new(binary_path)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(spawn_err)?;

        info!(
            "Spawned native binary for {} (pid {}) on {}",
            device_name,
            child.id(),
            slave_path
        );

        Ok(Self {
            device_name: device_name.to_string(),
            slave_path,
            child,
            pty: Some(PtyPair {
                master: pair.master,
                slave: pair.slave,
            }),
            exit: None,
        })
    }

    #[cfg(not(unix))]
    pub fn spawn(device_name: &str, _binary_path: &str) -> Result<Self, BinaryError> {
        Err(BinaryError::Unsupported {
            device: device_name.to_string(),
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn slave_path(&self) -> &str {
        &self.slave_path
    }

    pub fn exit(&self) -> Option<BinaryExit> {
        self.exit
    }

    /// Returns the exit the first time the process is seen not running, and
    /// `None` on every other call.
    pub fn poll(&mut self) -> Option<BinaryExit> {
        if self.exit.is_some() {
            return None;
        }
        let observed = match self.child.try_wait() {
            Ok(Some(status)) => BinaryExit::Exited(status),
            Ok(None) => return None,
            Err(e) => {
                debug!("{}: try_wait failed: {}", self.device_name, e);
                BinaryExit::Lost
            }
        };
        self.exit = Some(observed);
        Some(observed)
    }

    /// Kill the process and close both pseudo-terminal descriptors.
    pub fn terminate(&mut self) {
        if self.exit.is_none() {
            if let Err(e) = self.child.kill() {
                warn!("{}: kill failed: {}", self.device_name, e);
            }
        }
        match self.child.wait() {
            Ok(status) => {
                self.exit.get_or_insert(BinaryExit::Exited(status));
            }
            Err(e) => debug!("{}: wait after kill failed: {}", self.device_name, e),
        }
        #[cfg(unix)]
        if let Some(pty) = self.pty.take() {
            drop(pty.master);
            drop(pty.slave);
        }
    }

    pub fn is_terminated(&self) -> bool {
        #[cfg(unix)]
        {
            self.pty.is_none()
        }
        #[cfg(not(unix))]
        {
            self.exit.is_some()
        }
    }
}

impl fmt::Debug for Binary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binary")
            .field("device_name", &self.device_name)
            .field("slave_path", &self.slave_path)
            .field("pid", &self.child.id())
            .field("exit", &self.exit)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum BinaryError {
    #[error("Cannot connect to a native binary for device {device}, since this platform has no pseudo-terminals")]
    Unsupported { device: String },
    #[error("Could not open a pseudo-terminal for {device}: {reason}")]
    Pty { device: String, reason: String },
    #[error("Could not start {path} for {device}: {source}")]
    Spawn {
        device: String,
        path: String,
        #[source]
        source: std::io::Error,
    },
}
