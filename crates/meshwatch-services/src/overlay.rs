//! Overlay status source — where peer membership and liveness come from.
//!
//! The overlay network is an opaque external system; its CLI is the only
//! status mechanism. The trait seam exists so the engine can run against
//! in-process stubs in tests.

use async_trait::async_trait;
use tokio::process::Command;

use meshwatch_core::status::StatusDocument;

/// A failed snapshot build. Any of these abandons the current cycle;
/// none of them stops the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to run status command `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("status output was not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("failed to parse status document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Source of the overlay's peer membership and liveness.
#[async_trait]
pub trait OverlayStatus: Send + Sync {
    async fn query(&self) -> Result<StatusDocument, BuildError>;
}

/// Production source: runs `<command> status --json` and parses stdout.
pub struct CommandStatus {
    command: String,
}

impl CommandStatus {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl OverlayStatus for CommandStatus {
    async fn query(&self) -> Result<StatusDocument, BuildError> {
        let output = Command::new(&self.command)
            .args(["status", "--json"])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| BuildError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        // stdout is parsed regardless of exit status — the CLI emits a
        // usable document alongside nonzero exits in several states.
        if !output.status.success() {
            tracing::debug!(
                command = %self.command,
                status = %output.status,
                "status command exited nonzero, parsing stdout anyway"
            );
        }

        let raw = String::from_utf8(output.stdout)?;
        Ok(StatusDocument::parse(&raw)?)
    }
}
