//! Port scanner seam — probes a peer's open ports via an external tool.
//!
//! Failures here are never cycle-fatal: a scan that times out, or a
//! scanner binary that is missing, contributes an empty record list for
//! that one sub-scan and the cycle carries on.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use meshwatch_core::peer::PortRecord;
use meshwatch_core::scan::parse_scan_output;

/// Probes open ports on a single target.
#[async_trait]
pub trait PortScanner: Send + Sync {
    /// Full scan against the tool's default port profile.
    async fn scan_host(&self, target: &str) -> Vec<PortRecord>;

    /// Probe one explicitly named port. `port` is passed to the tool
    /// verbatim (config carries port strings, not numbers).
    async fn scan_port(&self, target: &str, port: &str) -> Vec<PortRecord>;
}

/// Production scanner: spawns the configured binary per probe, bounded by
/// a wall-clock timeout. The tool can hang against unresponsive hosts;
/// `kill_on_drop` reaps the child when the timeout fires.
pub struct NmapScanner {
    command: String,
    timeout: Duration,
}

impl NmapScanner {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    async fn run(&self, extra_args: &[&str], target: &str) -> Vec<PortRecord> {
        let mut cmd = Command::new(&self.command);
        cmd.args(extra_args).arg(target).kill_on_drop(true);

        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                tracing::warn!(host = target, timeout_secs = self.timeout.as_secs(), "scan timed out");
                Vec::new()
            }
            Ok(Err(e)) => {
                tracing::warn!(host = target, command = %self.command, error = %e, "scanner failed to run");
                Vec::new()
            }
            Ok(Ok(output)) => {
                if !output.status.success() {
                    tracing::debug!(host = target, status = %output.status, "scanner exited nonzero");
                }
                parse_scan_output(&String::from_utf8_lossy(&output.stdout))
            }
        }
    }
}

#[async_trait]
impl PortScanner for NmapScanner {
    async fn scan_host(&self, target: &str) -> Vec<PortRecord> {
        self.run(&[], target).await
    }

    async fn scan_port(&self, target: &str, port: &str) -> Vec<PortRecord> {
        self.run(&["-p", port], target).await
    }
}
