use crate::binary::{Binary, BinaryExit};
use crate::orchestrator::RunState;
use colored::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

pub const POLL_INTERVAL: Duration = Duration::from_millis(1000);

pub type SharedBinaries = Arc<Mutex<Vec<Binary>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    pub device_name: String,
    pub exit: BinaryExit,
}

/// Background task that surfaces native binaries which stop running.
///
/// It never kills or restarts anything; a crashed binary is reported once
/// and left for the shutdown sequence to clean up.
pub struct BinaryMonitor {
    handle: JoinHandle<Vec<ExitReport>>,
}

impl BinaryMonitor {
    pub fn spawn(binaries: SharedBinaries, run: Arc<RunState>) -> Self {
        Self::with_interval(binaries, run, POLL_INTERVAL)
    }

    pub fn with_interval(binaries: SharedBinaries, run: Arc<RunState>, interval: Duration) -> Self {
        let handle = tokio::spawn(poll_binaries(binaries, run, interval));
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to notice the run has stopped, aborting it if it
    /// takes longer than `timeout`.
    pub async fn join(self, timeout: Duration) -> Vec<ExitReport> {
        let abort = self.handle.abort_handle();
        match time::timeout(timeout, self.handle).await {
            Ok(Ok(reports)) => reports,
            Ok(Err(e)) => {
                warn!("Binary monitor task failed: {}", e);
                Vec::new()
            }
            Err(_) => {
                warn!("Binary monitor did not stop within {:?}, aborting it", timeout);
                abort.abort();
                Vec::new()
            }
        }
    }
}

async fn poll_binaries(binaries: SharedBinaries, run: Arc<RunState>, period: Duration) -> Vec<ExitReport> {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut reports = Vec::new();

    while run.is_running() {
        tokio::select! {
            _ = interval.tick() => {}
            _ = run.stopped() => break,
        }
        if !run.is_running() {
            break;
        }

        let mut binaries = binaries.lock().await;
        for binary in binaries.iter_mut() {
            if let Some(exit) = binary.poll() {
                println!(
                    "{} Device {} exited with status {}.",
                    "⚠️".yellow(),
                    binary.device_name().bright_white(),
                    exit.to_string().bright_red()
                );
                reports.push(ExitReport {
                    device_name: binary.device_name().to_string(),
                    exit,
                });
            }
        }
    }

    debug!("Binary monitor stopped with {} exit report(s)", reports.len());
    reports
}
