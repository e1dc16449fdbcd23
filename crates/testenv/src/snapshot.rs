//! Full chain-state snapshots bound to the process that produced them.

use alloy::{
    primitives::Bytes,
    providers::{DynProvider, ext::AnvilApi},
};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::{
    error::{Result, TestEnvError},
    node::InstanceId,
};

/// Opaque state blob from `anvil_dumpState`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainSnapshot {
    instance: InstanceId,
    state: Bytes,
}

impl ChainSnapshot {
    pub(crate) fn new(instance: InstanceId, state: Bytes) -> Self {
        Self { instance, state }
    }

    /// Process instance this snapshot is valid for.
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn state(&self) -> &Bytes {
        &self.state
    }
}

pub async fn capture(
    provider: &DynProvider,
    instance: InstanceId,
    timeout: Duration,
) -> Result<ChainSnapshot> {
    let state = tokio::time::timeout(timeout, provider.anvil_dump_state())
        .await
        .map_err(|_| TestEnvError::Snapshot(format!("dump timed out after {timeout:?}")))?
        .map_err(|e| TestEnvError::Snapshot(format!("chain process unreachable: {e}")))?;

    if state.is_empty() {
        return Err(TestEnvError::Snapshot("chain returned an empty state".into()));
    }

    info!(pid = instance.pid, bytes = state.len(), "state snapshot captured");
    Ok(ChainSnapshot::new(instance, state))
}

/// Load `snapshot` into the chain process identified by `instance`.
pub async fn restore(
    provider: &DynProvider,
    instance: InstanceId,
    snapshot: &ChainSnapshot,
    timeout: Duration,
) -> Result<()> {
    if snapshot.instance != instance {
        return Err(TestEnvError::Snapshot(format!(
            "snapshot was taken on pid {} port {}, cannot restore into pid {} port {}",
            snapshot.instance.pid, snapshot.instance.port, instance.pid, instance.port
        )));
    }

    let loaded = tokio::time::timeout(timeout, provider.anvil_load_state(snapshot.state.clone()))
        .await
        .map_err(|_| TestEnvError::Snapshot(format!("load timed out after {timeout:?}")))?
        .map_err(|e| TestEnvError::Snapshot(e.to_string()))?;

    if !loaded {
        return Err(TestEnvError::Snapshot("chain process rejected the state".into()));
    }

    debug!(pid = instance.pid, "state snapshot restored");
    Ok(())
}
