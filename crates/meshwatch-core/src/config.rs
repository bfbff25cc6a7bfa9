//! Configuration system for Meshwatch.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $MESHWATCH_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/meshwatch/config.toml
//!   3. ~/.config/meshwatch/config.toml

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshwatchConfig {
    pub poll: PollConfig,
    pub ports: PortsConfig,
    pub tools: ToolsConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between reconciliation cycles.
    pub interval_secs: u64,
    /// Wall-clock bound for one scanner invocation. The scanner can hang
    /// against unresponsive hosts; a timed-out scan contributes nothing.
    pub scan_timeout_secs: u64,
    /// Global bound on concurrent scanner processes.
    pub max_concurrent_scans: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortsConfig {
    /// Ports rendered as https:// links.
    pub https: Vec<u16>,
    /// Ports rendered as http:// links (service-name heuristics apply too).
    pub http: Vec<u16>,
    /// Extra ports to probe per DNS name — services the host scan won't
    /// surface (UDP-tunneled, outside the scanner's default profile).
    /// Values are passed to the scanner verbatim.
    pub additional: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Overlay status binary. Invoked as `<status_command> status --json`.
    pub status_command: String,
    /// Port scanner binary. Invoked as `<scanner_command> [-p <port>] <target>`.
    pub scanner_command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// HTTP API port on 127.0.0.1.
    pub port: u16,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for MeshwatchConfig {
    fn default() -> Self {
        Self {
            poll: PollConfig::default(),
            ports: PortsConfig::default(),
            tools: ToolsConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            scan_timeout_secs: 30,
            max_concurrent_scans: 8,
        }
    }
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            https: vec![443],
            http: Vec::new(),
            additional: HashMap::new(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            status_command: "tailscale".to_string(),
            scanner_command: "nmap".to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 9400 }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("meshwatch")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl MeshwatchConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            MeshwatchConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("MESHWATCH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&MeshwatchConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text)
                .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply MESHWATCH_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MESHWATCH_POLL__INTERVAL_SECS") {
            if let Ok(secs) = v.parse() {
                self.poll.interval_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("MESHWATCH_POLL__SCAN_TIMEOUT_SECS") {
            if let Ok(secs) = v.parse() {
                self.poll.scan_timeout_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("MESHWATCH_POLL__MAX_CONCURRENT_SCANS") {
            if let Ok(n) = v.parse() {
                self.poll.max_concurrent_scans = n;
            }
        }
        if let Ok(v) = std::env::var("MESHWATCH_TOOLS__STATUS_COMMAND") {
            self.tools.status_command = v;
        }
        if let Ok(v) = std::env::var("MESHWATCH_TOOLS__SCANNER_COMMAND") {
            self.tools.scanner_command = v;
        }
        if let Ok(v) = std::env::var("MESHWATCH_API__PORT") {
            if let Ok(p) = v.parse() {
                self.api.port = p;
            }
        }
    }
}
