//! Disposable anvil process backing a test environment.

use alloy::providers::{Provider, ProviderBuilder};
use serde::Serialize;
use std::{
    net::TcpListener,
    process::{Child, Command, Stdio},
    time::Duration,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    clients::{Endpoint, Transport},
    config::TestEnvConfig,
    error::{Result, TestEnvError},
};

const READINESS_POLL: Duration = Duration::from_millis(100);

/// Identifies one chain process instance. Snapshots are bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct InstanceId {
    pub pid: u32,
    pub port: u16,
}

/// Anvil process wrapper that kills the process on drop.
#[derive(Debug)]
pub struct ChainProcess {
    child: Option<Child>,
    instance: InstanceId,
    host: String,
    binary: String,
}

impl ChainProcess {
    /// Spawn anvil and wait until it answers `eth_blockNumber`.
    pub async fn spawn(config: &TestEnvConfig) -> Result<Self> {
        let port = match config.port {
            Some(port) => {
                ensure_port_free(&config.host, port)?;
                port
            }
            None => portpicker::pick_unused_port()
                .ok_or_else(|| TestEnvError::Spawn("no available port".into()))?,
        };

        let (stdout, stderr) = if config.anvil_logs {
            (Stdio::inherit(), Stdio::inherit())
        } else {
            (Stdio::null(), Stdio::null())
        };

        let child = Command::new(&config.anvil_binary)
            .args(["--host", &config.host])
            .args(["--port", &port.to_string()])
            .args(["--chain-id", &config.chain_id.to_string()])
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|e| {
                TestEnvError::Spawn(format!(
                    "failed to spawn {}: {e}. Is anvil installed?",
                    config.anvil_binary
                ))
            })?;

        let mut process = Self {
            instance: InstanceId {
                pid: child.id(),
                port,
            },
            child: Some(child),
            host: config.host.clone(),
            binary: config.anvil_binary.clone(),
        };

        process.wait_ready(config.startup_timeout()).await?;
        info!(pid = process.instance.pid, port, "anvil started");

        Ok(process)
    }

    /// Fails if the child exited. An answer from the port only counts while
    /// the child is still alive, otherwise it came from another server.
    fn ensure_alive(&mut self) -> Result<()> {
        let Some(child) = self.child.as_mut() else {
            return Err(TestEnvError::Spawn(format!("{} is not running", self.binary)));
        };
        match child.try_wait() {
            Ok(None) => Ok(()),
            Ok(Some(status)) => {
                self.child = None;
                Err(TestEnvError::Spawn(format!(
                    "{} exited during startup with {status}",
                    self.binary
                )))
            }
            Err(e) => Err(TestEnvError::Spawn(format!("wait pid {}: {e}", self.instance.pid))),
        }
    }

    async fn wait_ready(&mut self, timeout: Duration) -> Result<()> {
        let provider = ProviderBuilder::new().connect_http(self.http_url()?);
        let deadline = Instant::now() + timeout;

        loop {
            self.ensure_alive()?;

            match provider.get_block_number().await {
                Ok(block) => {
                    // The child may have lost the bind race since the last check.
                    tokio::time::sleep(READINESS_POLL).await;
                    self.ensure_alive()?;
                    debug!(block, "chain process is ready");
                    return Ok(());
                }
                Err(e) if Instant::now() >= deadline => {
                    return Err(TestEnvError::Spawn(format!(
                        "not ready after {}s: {e}",
                        timeout.as_secs()
                    )));
                }
                Err(_) => tokio::time::sleep(READINESS_POLL).await,
            }
        }
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn port(&self) -> u16 {
        self.instance.port
    }

    pub fn http_url(&self) -> Result<Url> {
        format!("http://{}:{}", self.host, self.instance.port)
            .parse()
            .map_err(|e| TestEnvError::Config(format!("invalid chain endpoint: {e}")))
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}:{}", self.host, self.instance.port)
    }

    /// Request/response and streaming endpoints, in that order.
    pub fn endpoints(&self) -> Result<[Endpoint; 2]> {
        Ok([
            Endpoint::new(Transport::Http, self.http_url()?.to_string()),
            Endpoint::new(Transport::Ws, self.ws_url()),
        ])
    }

    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Kill the owned process. Stopping an already stopped process succeeds.
    pub fn stop(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if let Ok(Some(_)) = child.try_wait() {
            return Ok(());
        }

        child
            .kill()
            .map_err(|e| TestEnvError::Teardown(format!("kill pid {}: {e}", self.instance.pid)))?;
        child
            .wait()
            .map_err(|e| TestEnvError::Teardown(format!("wait pid {}: {e}", self.instance.pid)))?;

        info!(pid = self.instance.pid, "anvil stopped");
        Ok(())
    }

    pub(crate) fn binary(&self) -> &str {
        &self.binary
    }
}

impl Drop for ChainProcess {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("failed to stop chain process on drop: {e}");
        }
    }
}

/// Kill every process whose name matches `binary`.
///
/// Not scoped to one instance: concurrent environments on the same host are
/// killed too.
pub fn kill_by_name(binary: &str) -> Result<()> {
    let name = std::path::Path::new(binary)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(binary);

    let status = Command::new("pkill")
        .args(["-x", name])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| TestEnvError::Teardown(format!("pkill {name}: {e}")))?;

    // pkill exits with 1 when nothing matched.
    match status.code() {
        Some(0) | Some(1) => Ok(()),
        _ => Err(TestEnvError::Teardown(format!("pkill {name} exited with {status}"))),
    }
}

/// A fixed port must be free before spawning, or readiness checks would be
/// answered by whatever already listens there.
fn ensure_port_free(host: &str, port: u16) -> Result<()> {
    TcpListener::bind((host, port))
        .map(drop)
        .map_err(|e| TestEnvError::Spawn(format!("port {port} on {host} is in use: {e}")))
}

/// Pick an unused port
mod portpicker {
    use std::net::TcpListener;

    pub(super) fn pick_unused_port() -> Option<u16> {
        TcpListener::bind("127.0.0.1:0")
            .ok()
            .and_then(|l| l.local_addr().ok())
            .map(|addr| addr.port())
    }
}
