//! The environment orchestrator.
//!
//! [`setup_test_environment_with`] runs the provisioning pipeline in a single
//! awaited sequence:
//!
//! 1. load artifacts
//! 2. spawn the chain process
//! 3. fund the deployer and both parties
//! 4. deploy the contract graph
//! 5. deploy and distribute the mock tokens
//! 6. build clients
//! 7. capture the initial snapshot
//!
//! Setup is all-or-nothing. On error the partially built state is dropped,
//! which also kills the chain process.

use alloy::{
    primitives::{Address, B256},
    providers::{DynProvider, Provider, ProviderBuilder},
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    accounts::{Account, AccountProvisioner},
    artifacts::ArtifactStore,
    clients::{ClientFactory, Endpoint, NoClients, PartyClients, make_clients},
    config::TestEnvConfig,
    deploy::ChainDeployer,
    error::{Result, TestEnvError},
    graph::{DeploymentPlan, GraphDriver},
    node::{ChainProcess, InstanceId, kill_by_name},
    registry::{AddressRegistry, MockTokenRegistry},
    snapshot::{self, ChainSnapshot},
    tokens::{
        MOCK_ERC20_ARTIFACT, MOCK_ERC721_ARTIFACT, MOCK_ERC1155_ARTIFACT, SeedAmounts,
        TokenDistributor, deploy_mock_tokens,
    },
};

/// A provisioned environment. Owned by the caller.
#[derive(Debug)]
pub struct TestEnvironment<C = ()> {
    pub chain: ChainProcess,
    pub http_endpoint: Endpoint,
    pub ws_endpoint: Endpoint,
    /// Chain state right after provisioning, if captured.
    pub init_state: Option<ChainSnapshot>,
    /// Sender of every deployment and distribution.
    pub deployer: Account,
    /// Wallet provider of the deployer.
    pub test_client: DynProvider,
    pub alice: Account,
    pub bob: Account,
    pub alice_clients: PartyClients<C>,
    pub bob_clients: PartyClients<C>,
    pub addresses: AddressRegistry,
    pub mock_addresses: MockTokenRegistry,
    config: TestEnvConfig,
}

/// Every artifact the pipeline needs, core graph first.
pub fn required_artifacts(plan: &DeploymentPlan) -> Vec<&'static str> {
    plan.steps()
        .iter()
        .map(|step| step.key.artifact_name())
        .chain([MOCK_ERC20_ARTIFACT, MOCK_ERC721_ARTIFACT, MOCK_ERC1155_ARTIFACT])
        .collect()
}

/// Provision with defaults taken from the process environment and no clients.
pub async fn setup_test_environment() -> Result<TestEnvironment> {
    setup_test_environment_with(TestEnvConfig::from_env(), &NoClients).await
}

pub async fn setup_test_environment_with<F: ClientFactory + ?Sized>(
    config: TestEnvConfig,
    factory: &F,
) -> Result<TestEnvironment<F::Client>> {
    config.validate()?;
    let timeout = config.request_timeout();

    let plan = DeploymentPlan::alkahest();
    plan.validate()?;
    // Fail on missing artifacts before a process is spawned.
    let artifacts = ArtifactStore::load(&config.artifacts_dir, required_artifacts(&plan))?;

    let chain = ChainProcess::spawn(&config).await?;
    let [http_endpoint, ws_endpoint] = chain.endpoints()?;

    let deployer = Account::random();
    let test_client = ProviderBuilder::new()
        .wallet(deployer.wallet())
        .connect_http(chain.http_url()?)
        .erased();

    let provisioner = AccountProvisioner::new(test_client.clone(), timeout);
    provisioner.fund(deployer.address(), config.funding_wei).await?;
    let alice = provisioner.create_funded_account(config.funding_wei).await?;
    let bob = provisioner.create_funded_account(config.funding_wei).await?;
    info!(
        deployer = %deployer.address(),
        alice = %alice.address(),
        bob = %bob.address(),
        "accounts funded"
    );

    let engine = ChainDeployer::new(test_client.clone(), timeout);
    let addresses = GraphDriver::new(&plan, &engine, &artifacts)
        .run(AddressRegistry::new())
        .await?;
    if !addresses.is_complete() {
        return Err(TestEnvError::deployment(
            "contract graph",
            format!("unresolved keys: {:?}", addresses.missing()),
        ));
    }

    let mock_addresses = deploy_mock_tokens(&engine, &artifacts).await?;
    TokenDistributor::new(test_client.clone(), timeout, SeedAmounts::from(&config))
        .seed_parties(alice.address(), bob.address(), &mock_addresses)
        .await?;

    let endpoints = [http_endpoint.clone(), ws_endpoint.clone()];
    let poll_interval = config.poll_interval();
    let alice_clients = make_clients(factory, &alice, &endpoints, &addresses, poll_interval).await?;
    let bob_clients = make_clients(factory, &bob, &endpoints, &addresses, poll_interval).await?;

    let init_state = if config.capture_snapshot {
        Some(snapshot::capture(&test_client, chain.instance(), timeout).await?)
    } else {
        None
    };

    info!(
        pid = chain.instance().pid,
        url = %http_endpoint.url,
        contracts = addresses.len(),
        tokens = mock_addresses.len(),
        "test environment ready"
    );

    Ok(TestEnvironment {
        chain,
        http_endpoint,
        ws_endpoint,
        init_state,
        deployer,
        test_client,
        alice,
        bob,
        alice_clients,
        bob_clients,
        addresses,
        mock_addresses,
        config,
    })
}

/// Stop the environment's chain process. Never fails, safe to repeat.
pub fn teardown_test_environment<C>(env: &mut TestEnvironment<C>) {
    env.teardown();
}

impl<C> TestEnvironment<C> {
    pub fn config(&self) -> &TestEnvConfig {
        &self.config
    }

    pub fn instance(&self) -> InstanceId {
        self.chain.instance()
    }

    /// See [`teardown_test_environment`].
    pub fn teardown(&mut self) {
        if let Err(e) = self.chain.stop() {
            warn!("teardown: {e}");
        }
        if self.config.kill_by_name
            && let Err(e) = kill_by_name(self.chain.binary())
        {
            warn!("teardown: {e}");
        }
    }

    /// Load `snapshot` into this environment's chain process.
    pub async fn restore(&self, snapshot: &ChainSnapshot) -> Result<()> {
        snapshot::restore(
            &self.test_client,
            self.chain.instance(),
            snapshot,
            self.config.request_timeout(),
        )
        .await
    }

    /// Return the chain to its post-provisioning state.
    pub async fn reset(&self) -> Result<()> {
        let snapshot = self
            .init_state
            .as_ref()
            .ok_or_else(|| TestEnvError::Snapshot("no initial snapshot was captured".into()))?;
        self.restore(snapshot).await
    }

    pub fn summary(&self) -> EnvironmentSummary {
        EnvironmentSummary {
            instance: self.chain.instance(),
            chain_id: self.config.chain_id,
            http_url: self.http_endpoint.url.clone(),
            ws_url: self.ws_endpoint.url.clone(),
            deployer: AccountSummary::from(&self.deployer),
            alice: AccountSummary::from(&self.alice),
            bob: AccountSummary::from(&self.bob),
            addresses: self.addresses.clone(),
            mock_addresses: self.mock_addresses.clone(),
        }
    }
}

/// Serializable view of an environment, for printing.
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentSummary {
    pub instance: InstanceId,
    pub chain_id: u64,
    pub http_url: String,
    pub ws_url: String,
    pub deployer: AccountSummary,
    pub alice: AccountSummary,
    pub bob: AccountSummary,
    pub addresses: AddressRegistry,
    pub mock_addresses: MockTokenRegistry,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub address: Address,
    /// Throwaway key of a local devnet account.
    pub private_key: B256,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            address: account.address(),
            private_key: account.signer().to_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ContractKey;

    #[test]
    fn required_artifacts_cover_graph_and_tokens() {
        let names = required_artifacts(&DeploymentPlan::alkahest());
        assert_eq!(names.len(), ContractKey::ALL.len() + 3);
        assert_eq!(names[0], "SchemaRegistry");
        assert_eq!(names[1], "EAS");
        assert!(names.contains(&"IntrinsicsArbiter"));
        assert!(names.contains(&"IntrinsicsArbiter2"));
        assert_eq!(&names[names.len() - 3..], ["MockERC20Permit", "MockERC721", "MockERC1155"]);
    }

    #[tokio::test]
    async fn setup_fails_before_spawn_on_missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        // A binary that cannot exist: reaching the spawn step would surface a
        // Spawn error instead.
        let config = TestEnvConfig {
            anvil_binary: "/nonexistent/anvil".into(),
            ..TestEnvConfig::default()
        }
        .with_artifacts_dir(dir.path());

        let err = setup_test_environment_with(config, &NoClients)
            .await
            .unwrap_err();
        match err {
            TestEnvError::Artifact { name, .. } => assert_eq!(name, "SchemaRegistry"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn setup_rejects_invalid_config() {
        let config = TestEnvConfig {
            request_timeout_secs: 0,
            ..TestEnvConfig::default()
        };
        let err = setup_test_environment_with(config, &NoClients)
            .await
            .unwrap_err();
        assert!(matches!(err, TestEnvError::Config(_)));
    }

    #[test]
    fn account_summary_exposes_key() {
        let account = Account::random();
        let summary = AccountSummary::from(&account);
        assert_eq!(summary.address, account.address());
        assert_eq!(summary.private_key, account.signer().to_bytes());
    }
}
