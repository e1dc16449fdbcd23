use alloy::primitives::Address;
use thiserror::Error;

use crate::graph::PlanError;

/// Errors raised while provisioning or operating a test environment.
///
/// Setup is all-or-nothing: the first error aborts the pipeline and no
/// partially populated environment is handed back.
#[derive(Debug, Error)]
pub enum TestEnvError {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to start chain process: {0}")]
    Spawn(String),

    #[error("failed to provision account {account}: {reason}")]
    Provisioning { account: Address, reason: String },

    #[error("artifact {name}: {reason}")]
    Artifact { name: String, reason: String },

    #[error("invalid deployment plan: {0}")]
    Plan(#[from] PlanError),

    #[error("deployment of {contract} failed: {reason}")]
    Deployment { contract: String, reason: String },

    #[error("distribution of {token} to {recipient} failed: {reason}")]
    Distribution {
        token: String,
        recipient: Address,
        reason: String,
    },

    #[error("client provisioning failed: {0}")]
    Client(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// Only ever logged; the public teardown entry points swallow it.
    #[error("teardown error: {0}")]
    Teardown(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TestEnvError {
    pub(crate) fn deployment(contract: impl Into<String>, reason: impl ToString) -> Self {
        Self::Deployment {
            contract: contract.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn artifact(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Artifact {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TestEnvError>;
