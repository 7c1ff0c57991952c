//! # Simulation Run Orchestrator
//!
//! Drives a hardware-in-the-loop test session for flight controller software:
//! connects to controller devices (Teensy boards over serial, or native
//! builds wrapped in a pseudo-terminal), optionally links their radios,
//! runs a simulation environment and exposes an interactive console for
//! reading, writing and overriding on-device state fields.
//!
//! ## Quick Start
//!
//! ```no_run
//! use simrun::{Config, Orchestrator};
//! use simrun::session::HardwareBackend;
//! use std::path::Path;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load("config.json")?;
//! let mut orchestrator =
//!     Orchestrator::new(config, None, Path::new("/tmp/logs"), Box::new(HardwareBackend))?;
//!
//! let stdin = tokio::io::BufReader::new(tokio::io::stdin());
//! if let Some(report) = orchestrator.start(stdin).await {
//!     println!("Stopped: {}", report.reason);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`orchestrator`] - Setup in dependency order and the shutdown coordinator
//! - [`console`] - Command table and dispatch against the targeted device
//! - [`monitor`] - Background watch over native binaries
//! - [`binary`] - Native binaries under a pseudo-terminal
//! - [`session`] - Device and radio session contracts and implementations
//! - [`simulation`] - Simulation environment contract
//! - [`config`] - Run configuration and radio credentials
//! - [`wire`] - Line-delimited JSON frames spoken over the serial link

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod binary;
pub mod config;
pub mod console;
pub mod device;
pub mod monitor;
pub mod orchestrator;
pub mod session;
pub mod simulation;
pub mod wire;

// Re-export main public types for convenience
pub use config::{Config, RadioCredentials};
pub use console::{CommandSession, Outcome};
pub use device::{Device, LinkStatus, Radio, RunMode};
pub use orchestrator::{Orchestrator, SetupError, ShutdownReport, StopReason};
