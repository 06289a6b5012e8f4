use crate::tasks::DEFAULT_MIN_KERNEL;
use anyhow::{Context, Result};
use failover::RpcOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the clusteradm home directory (~/.clusteradm)
pub fn home_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".clusteradm"))
}

/// Default settings file path
pub fn settings_path() -> Result<PathBuf> {
    Ok(home_dir()?.join("clusteradm.toml"))
}

// ============================================================================
// Settings
// ============================================================================

/// User settings from `clusteradm.toml`; every section is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub execution: ExecutionSettings,
    pub ssh: SshSettings,
    pub rpc: RpcSettings,
    pub precheck: PrecheckSettings,
    pub audit: AuditSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Tasks in flight per step; 0 runs every task of a step at once
    pub parallelism: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    pub connect_timeout_secs: u64,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcSettings {
    pub timeout_ms: u64,
    pub retry_times: u32,
    pub retry_delay_ms: u64,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 500,
            retry_times: 3,
            retry_delay_ms: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecheckSettings {
    /// Oldest kernel release hosts may run, e.g. `4.19`
    pub min_kernel: String,
}

impl Default for PrecheckSettings {
    fn default() -> Self {
        Self {
            min_kernel: DEFAULT_MIN_KERNEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    pub enabled: bool,
    pub path: String,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "~/.clusteradm/data/audit.db".to_string(),
        }
    }
}

impl Settings {
    /// Load from `path`, or from the default location; defaults if absent
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => settings_path()?,
        };

        if !path.exists() {
            log::debug!("Settings file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings = Self::parse(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Audit database path with `~` expanded
    pub fn audit_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.audit.path).as_ref())
    }

    pub fn ssh_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh.connect_timeout_secs)
    }

    /// RPC options for the given candidate addresses
    pub fn rpc_options(&self, addresses: Vec<String>) -> RpcOptions {
        RpcOptions::new(addresses)
            .timeout(Duration::from_millis(self.rpc.timeout_ms))
            .retry_times(self.rpc.retry_times)
            .retry_delay(Duration::from_millis(self.rpc.retry_delay_ms))
    }
}

// ============================================================================
// Tests
// ============================================================================
