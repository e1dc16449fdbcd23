//! Test account creation and native-currency funding.

use alloy::{
    network::EthereumWallet,
    primitives::{Address, U256},
    providers::{DynProvider, Provider, ext::AnvilApi},
    signers::local::PrivateKeySigner,
};
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, TestEnvError};

/// A freshly generated keypair. Never reused across runs.
#[derive(Debug, Clone)]
pub struct Account {
    signer: PrivateKeySigner,
}

impl Account {
    pub fn random() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub fn wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }
}

/// Sets native balances directly on the chain process.
///
/// Funding is a balance override rather than a transfer, so it never depends
/// on a sender's balance.
#[derive(Debug, Clone)]
pub struct AccountProvisioner {
    provider: DynProvider,
    timeout: Duration,
}

impl AccountProvisioner {
    pub fn new(provider: DynProvider, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub async fn create_funded_account(&self, amount: U256) -> Result<Account> {
        let account = Account::random();
        self.fund(account.address(), amount).await?;
        Ok(account)
    }

    pub async fn fund(&self, account: Address, amount: U256) -> Result<()> {
        let provisioning_error = |reason: String| TestEnvError::Provisioning { account, reason };

        tokio::time::timeout(self.timeout, self.provider.anvil_set_balance(account, amount))
            .await
            .map_err(|_| provisioning_error(format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| provisioning_error(e.to_string()))?;

        debug!(%account, %amount, "account funded");
        Ok(())
    }

    /// Native balance of `account`.
    pub async fn balance(&self, account: Address) -> Result<U256> {
        tokio::time::timeout(self.timeout, self.provider.get_balance(account))
            .await
            .map_err(|_| TestEnvError::Rpc(format!("balance timed out after {:?}", self.timeout)))?
            .map_err(|e| TestEnvError::Rpc(e.to_string()))
    }
}
