//! Test environment configuration.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::error::{Result, TestEnvError};

/// One ether in wei.
pub const ETHER: u128 = 1_000_000_000_000_000_000;

/// Foundry's default chain id.
pub const ANVIL_CHAIN_ID: u64 = 31337;

/// Environment variable overriding [`TestEnvConfig::artifacts_dir`].
pub const ARTIFACTS_DIR_ENV: &str = "ALKAHEST_ARTIFACTS_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestEnvConfig {
    /// Executable spawned as the chain process.
    pub anvil_binary: String,
    pub host: String,
    /// Fixed port. An unused port is picked when unset.
    pub port: Option<u16>,
    pub chain_id: u64,
    /// Directory holding the forge JSON artifacts.
    pub artifacts_dir: PathBuf,
    pub startup_timeout_secs: u64,
    /// Upper bound on every RPC round-trip, receipt waits included.
    pub request_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Native balance set on every provisioned account.
    pub funding_wei: U256,
    pub erc20_seed_amount: U256,
    pub erc1155_token_id: U256,
    pub erc1155_seed_amount: U256,
    /// Capture an initial-state snapshot once provisioning finishes.
    pub capture_snapshot: bool,
    /// Teardown additionally kills every process named like `anvil_binary`.
    pub kill_by_name: bool,
    /// Inherit the chain process stdout/stderr instead of discarding them.
    pub anvil_logs: bool,
}

impl Default for TestEnvConfig {
    fn default() -> Self {
        Self {
            anvil_binary: "anvil".to_string(),
            host: "127.0.0.1".to_string(),
            port: None,
            chain_id: ANVIL_CHAIN_ID,
            artifacts_dir: PathBuf::from("contracts/out"),
            startup_timeout_secs: 10,
            request_timeout_secs: 60,
            poll_interval_ms: 1000,
            funding_wei: U256::from(10 * ETHER),
            erc20_seed_amount: U256::from(1000 * ETHER),
            erc1155_token_id: U256::from(1),
            erc1155_seed_amount: U256::from(100),
            capture_snapshot: true,
            kill_by_name: false,
            anvil_logs: false,
        }
    }
}

impl TestEnvConfig {
    /// Load configuration from a TOML file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| TestEnvError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with overrides taken from the process environment.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(ARTIFACTS_DIR_ENV).filter(|dir| !dir.is_empty()) {
            self.artifacts_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.anvil_binary.trim().is_empty() {
            return Err(TestEnvError::Config("anvil_binary must not be empty".into()));
        }
        if self.port == Some(0) {
            return Err(TestEnvError::Config(
                "port 0 is not allowed, leave it unset to pick a free port".into(),
            ));
        }
        if self.startup_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(TestEnvError::Config("timeouts must be non-zero".into()));
        }
        Ok(())
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
