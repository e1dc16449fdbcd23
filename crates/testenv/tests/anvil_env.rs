//! End-to-end provisioning against a live anvil.
//!
//! Needs `anvil` on PATH and the compiled Alkahest artifacts in
//! `contracts/out` (or `ALKAHEST_ARTIFACTS_DIR`).

use alkahest_testenv::{
    AccountProvisioner, ChainDeployer, ContractKey, Deployer, MockTokenKey, NoClients, Pool,
    TestEnvConfig, TestEnvError, TestEnvironment, TokenKind, Transport, WalletClients,
    artifacts::ArtifactStore,
    config::ETHER,
    setup_test_environment_with, teardown_test_environment,
    tokens::{
        Distribution, DistributionAction, MOCK_ERC721_FIRST_ID, SeedAmounts, TokenDistributor,
        attestation_schema_registry, erc20_balance, erc721_balance, erc721_owner,
        erc1155_balance, native_balance, schema_registry_of,
    },
};
use alloy::{
    dyn_abi::DynSolValue,
    network::TransactionBuilder,
    primitives::{Address, U256},
    providers::{Provider, ext::AnvilApi},
    rpc::types::TransactionRequest,
};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("alkahest_testenv=debug")
        .try_init()
        .ok();
}

async fn setup() -> eyre::Result<TestEnvironment> {
    init_tracing();
    Ok(setup_test_environment_with(TestEnvConfig::from_env(), &NoClients).await?)
}

#[tokio::test]
#[ignore = "Requires Anvil binary and forge build artifacts"]
async fn full_setup_populates_every_key() -> eyre::Result<()> {
    let mut env = setup().await?;

    assert!(env.addresses.is_complete(), "missing: {:?}", env.addresses.missing());
    assert_eq!(env.addresses.len(), ContractKey::ALL.len());
    assert_eq!(env.mock_addresses.len(), MockTokenKey::ALL.len());
    assert!(env.init_state.is_some());

    for (key, address) in env.addresses.iter() {
        let code = env.test_client.get_code_at(address).await?;
        assert!(!code.is_empty(), "{key} has no code");
    }

    let intrinsics = env.addresses.require(ContractKey::IntrinsicsArbiter)?;
    let intrinsics_v2 = env.addresses.require(ContractKey::IntrinsicsArbiterV2)?;
    assert_ne!(intrinsics, intrinsics_v2);

    teardown_test_environment(&mut env);
    Ok(())
}

#[tokio::test]
#[ignore = "Requires Anvil binary and forge build artifacts"]
async fn parties_hold_disjoint_pools() -> eyre::Result<()> {
    let mut env = setup().await?;
    let provider = &env.test_client;
    let config = env.config().clone();
    let (alice, bob) = (env.alice.address(), env.bob.address());

    let keys = |pool| {
        [TokenKind::Fungible, TokenKind::NonFungible, TokenKind::SemiFungible]
            .map(|kind| MockTokenKey::new(kind, pool))
    };

    for (owner, other, own_pool, other_pool) in [
        (alice, bob, keys(Pool::A), keys(Pool::B)),
        (bob, alice, keys(Pool::B), keys(Pool::A)),
    ] {
        let [erc20, erc721, erc1155] = own_pool.map(|key| env.mock_addresses.get(key).unwrap());
        assert_eq!(erc20_balance(provider, erc20, owner).await?, config.erc20_seed_amount);
        assert_eq!(erc721_balance(provider, erc721, owner).await?, U256::from(1));
        assert_eq!(
            erc1155_balance(provider, erc1155, owner, config.erc1155_token_id).await?,
            config.erc1155_seed_amount
        );
        assert_eq!(erc20_balance(provider, erc20, other).await?, U256::ZERO);
        assert_eq!(erc721_balance(provider, erc721, other).await?, U256::ZERO);

        let [erc20, erc721, erc1155] = other_pool.map(|key| env.mock_addresses.get(key).unwrap());
        assert_eq!(erc20_balance(provider, erc20, owner).await?, U256::ZERO);
        assert_eq!(erc721_balance(provider, erc721, owner).await?, U256::ZERO);
        assert_eq!(
            erc1155_balance(provider, erc1155, owner, config.erc1155_token_id).await?,
            U256::ZERO
        );
    }

    // Each pool's ERC721 mints exactly once, so both parties hold the first id.
    let nft_a = env.mock_addresses.require(MockTokenKey::NonFungibleA)?;
    let nft_b = env.mock_addresses.require(MockTokenKey::NonFungibleB)?;
    assert_eq!(erc721_owner(provider, nft_a, MOCK_ERC721_FIRST_ID).await?, alice);
    assert_eq!(erc721_owner(provider, nft_b, MOCK_ERC721_FIRST_ID).await?, bob);

    teardown_test_environment(&mut env);
    Ok(())
}

#[tokio::test]
#[ignore = "Requires Anvil binary and forge build artifacts"]
async fn attestation_registry_points_at_schema_registry() -> eyre::Result<()> {
    let mut env = setup().await?;

    let schema_registry = env.addresses.require(ContractKey::SchemaRegistry)?;
    let eas = env.addresses.require(ContractKey::AttestationRegistry)?;
    assert_ne!(schema_registry, eas);
    assert_eq!(schema_registry_of(&env.test_client, &env.addresses).await?, schema_registry);

    // Same scenario through the deployment engine directly.
    let config = env.config().clone();
    let artifacts = ArtifactStore::load(&config.artifacts_dir, ["SchemaRegistry", "EAS"])?;
    let engine = ChainDeployer::new(env.test_client.clone(), config.request_timeout());
    let fresh_registry = engine.deploy(artifacts.get("SchemaRegistry")?, &[]).await?;
    let fresh_eas = engine
        .deploy(artifacts.get("EAS")?, &[DynSolValue::Address(fresh_registry)])
        .await?;
    assert_ne!(fresh_registry, fresh_eas);
    assert_ne!(fresh_registry, schema_registry);
    assert_eq!(attestation_schema_registry(&env.test_client, fresh_eas).await?, fresh_registry);

    teardown_test_environment(&mut env);
    Ok(())
}

#[tokio::test]
#[ignore = "Requires Anvil binary and forge build artifacts"]
async fn reverting_constructor_is_a_deployment_error() -> eyre::Result<()> {
    let mut env = setup().await?;

    // EAS refuses a zero schema registry.
    let config = env.config().clone();
    let artifacts = ArtifactStore::load(&config.artifacts_dir, ["EAS"])?;
    let engine = ChainDeployer::new(env.test_client.clone(), config.request_timeout());
    let err = engine
        .deploy(artifacts.get("EAS")?, &[DynSolValue::Address(Address::ZERO)])
        .await
        .unwrap_err();
    assert!(
        matches!(&err, TestEnvError::Deployment { contract, .. } if contract == "EAS"),
        "{err}"
    );

    teardown_test_environment(&mut env);
    Ok(())
}

#[tokio::test]
#[ignore = "Requires Anvil binary and forge build artifacts"]
async fn overdrawn_transfer_is_a_distribution_error() -> eyre::Result<()> {
    let mut env = setup().await?;
    let config = env.config().clone();
    let bob = env.bob.address();
    let token = env.mock_addresses.require(MockTokenKey::FungibleA)?;

    let distributor = TokenDistributor::new(
        env.test_client.clone(),
        config.request_timeout(),
        SeedAmounts::from(&config),
    );
    let err = distributor
        .distribute(
            &Distribution {
                token: MockTokenKey::FungibleA,
                recipient: bob,
                action: DistributionAction::Transfer { amount: U256::MAX },
            },
            &env.mock_addresses,
        )
        .await
        .unwrap_err();
    assert!(
        matches!(
            &err,
            TestEnvError::Distribution { token, recipient, .. }
                if token == "fungible-a" && *recipient == bob
        ),
        "{err}"
    );
    assert_eq!(erc20_balance(&env.test_client, token, bob).await?, U256::ZERO);

    teardown_test_environment(&mut env);
    Ok(())
}

#[tokio::test]
#[ignore = "Requires Anvil binary and forge build artifacts"]
async fn funded_balance_is_exact() -> eyre::Result<()> {
    let mut env = setup().await?;
    let funding = env.config().funding_wei;

    // Neither party has sent a transaction.
    assert_eq!(native_balance(&env.test_client, env.alice.address()).await?, funding);
    assert_eq!(native_balance(&env.test_client, env.bob.address()).await?, funding);

    let provisioner =
        AccountProvisioner::new(env.test_client.clone(), env.config().request_timeout());
    let amount = U256::from(3 * ETHER);
    let carol = provisioner.create_funded_account(amount).await?;
    assert_eq!(provisioner.balance(carol.address()).await?, amount);

    // The deployer paid gas.
    assert!(native_balance(&env.test_client, env.deployer.address()).await? < funding);

    teardown_test_environment(&mut env);
    Ok(())
}

#[tokio::test]
#[ignore = "Requires Anvil binary and forge build artifacts"]
async fn no_op_factory_still_populates_registry() -> eyre::Result<()> {
    let mut env = setup().await?;

    assert!(env.alice_clients.is_empty());
    assert!(env.bob_clients.is_empty());
    assert!(env.addresses.is_complete());
    assert_ne!(env.alice.address(), Address::ZERO);
    assert_ne!(env.alice.address(), env.bob.address());

    teardown_test_environment(&mut env);
    Ok(())
}

#[tokio::test]
#[ignore = "Requires Anvil binary and forge build artifacts"]
async fn wallet_clients_sign_as_their_party() -> eyre::Result<()> {
    init_tracing();
    let mut env = setup_test_environment_with(TestEnvConfig::from_env(), &WalletClients).await?;

    for transport in [Transport::Http, Transport::Ws] {
        let client = env
            .alice_clients
            .get(transport)
            .ok_or_else(|| eyre::eyre!("no {transport} client"))?;
        assert_eq!(client.get_chain_id().await?, env.config().chain_id);

        let tx = TransactionRequest::default()
            .with_to(env.bob.address())
            .with_value(U256::from(1));
        let receipt = client.send_transaction(tx).await?.get_receipt().await?;
        assert_eq!(receipt.from, env.alice.address());
    }
    assert!(env.bob_clients.http.is_some() && env.bob_clients.ws.is_some());

    teardown_test_environment(&mut env);
    Ok(())
}

#[tokio::test]
#[ignore = "Requires Anvil binary and forge build artifacts"]
async fn teardown_twice_is_silent() -> eyre::Result<()> {
    let mut env = setup().await?;

    teardown_test_environment(&mut env);
    assert!(!env.chain.is_running());
    teardown_test_environment(&mut env);
    assert!(env.test_client.get_block_number().await.is_err());
    Ok(())
}

#[tokio::test]
#[ignore = "Requires Anvil binary and forge build artifacts"]
async fn reset_restores_initial_state() -> eyre::Result<()> {
    let mut env = setup().await?;
    let alice = env.alice.address();
    let funding = env.config().funding_wei;

    env.test_client.anvil_set_balance(alice, U256::from(1)).await?;
    assert_eq!(native_balance(&env.test_client, alice).await?, U256::from(1));

    env.reset().await?;
    assert_eq!(native_balance(&env.test_client, alice).await?, funding);

    teardown_test_environment(&mut env);
    Ok(())
}

#[tokio::test]
#[ignore = "Requires Anvil binary and forge build artifacts"]
async fn snapshot_is_bound_to_its_instance() -> eyre::Result<()> {
    let mut first = setup().await?;
    let mut second = setup().await?;
    assert_ne!(first.instance(), second.instance());

    let snapshot = first.init_state.clone().ok_or_else(|| eyre::eyre!("no snapshot"))?;
    let err = second.restore(&snapshot).await.unwrap_err();
    assert!(matches!(err, TestEnvError::Snapshot(_)));

    teardown_test_environment(&mut first);
    teardown_test_environment(&mut second);
    Ok(())
}
