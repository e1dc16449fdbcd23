//! Contract deployment through the deployer account.

use alloy::{
    dyn_abi::DynSolValue,
    network::TransactionBuilder,
    primitives::Address,
    providers::{DynProvider, Provider},
    rpc::types::{TransactionReceipt, TransactionRequest},
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::{
    artifacts::ContractArtifact,
    error::{Result, TestEnvError},
};

/// Deploys one artifact with constructor arguments and returns its address.
///
/// The graph driver only talks to this trait, so it can be exercised without a
/// chain process.
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy(&self, artifact: &ContractArtifact, args: &[DynSolValue]) -> Result<Address>;
}

/// Sends deployment transactions from the deployer's wallet provider and
/// waits for inclusion.
#[derive(Debug, Clone)]
pub struct ChainDeployer {
    provider: DynProvider,
    timeout: Duration,
}

impl ChainDeployer {
    pub fn new(provider: DynProvider, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }
}

#[async_trait]
impl Deployer for ChainDeployer {
    async fn deploy(&self, artifact: &ContractArtifact, args: &[DynSolValue]) -> Result<Address> {
        let code = artifact.deployment_code(args)?;
        let tx = TransactionRequest::default().with_deploy_code(code);

        let receipt = submit(&self.provider, tx, self.timeout)
            .await
            .map_err(|reason| TestEnvError::deployment(&artifact.name, reason))?;

        let address = receipt.contract_address.ok_or_else(|| {
            TestEnvError::deployment(&artifact.name, "no contract address in receipt")
        })?;

        debug!(
            contract = %artifact.name,
            %address,
            gas_used = receipt.gas_used,
            "contract deployed"
        );
        Ok(address)
    }
}

/// Send a transaction and wait for a successful receipt.
///
/// Errors are returned as plain reasons so callers can wrap them in the error
/// kind of their stage.
pub(crate) async fn submit(
    provider: &DynProvider,
    tx: TransactionRequest,
    timeout: Duration,
) -> std::result::Result<TransactionReceipt, String> {
    let pending = tokio::time::timeout(timeout, provider.send_transaction(tx))
        .await
        .map_err(|_| format!("submission timed out after {timeout:?}"))?
        .map_err(|e| format!("rejected: {e}"))?;

    let tx_hash = *pending.tx_hash();
    let receipt = pending
        .with_timeout(Some(timeout))
        .get_receipt()
        .await
        .map_err(|e| format!("transaction {tx_hash} not confirmed: {e}"))?;

    if !receipt.status() {
        return Err(format!("transaction {tx_hash} reverted"));
    }

    Ok(receipt)
}
