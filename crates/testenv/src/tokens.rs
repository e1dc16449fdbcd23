//! Auxiliary mock tokens: deployment, seeding and balance reads.
//!
//! Seeding is deliberately asymmetric. Pool A goes to the first party only and
//! pool B to the second only, so the two parties always hold disjoint sets.

use alloy::{
    dyn_abi::DynSolValue,
    primitives::{Address, U256},
    providers::{DynProvider, Provider},
    sol,
};
use std::time::Duration;
use tracing::{debug, info};

use crate::{
    artifacts::ArtifactStore,
    config::TestEnvConfig,
    deploy::{Deployer, submit},
    error::{Result, TestEnvError},
    registry::{AddressRegistry, ContractKey, MockTokenKey, MockTokenRegistry, Pool, TokenKind},
};

sol! {
    #[sol(rpc)]
    interface MockERC20Permit {
        function transfer(address to, uint256 amount) external returns (bool);
        function balanceOf(address account) external view returns (uint256);
    }

    #[sol(rpc)]
    interface MockERC721 {
        function mint(address to) external;
        function ownerOf(uint256 tokenId) external view returns (address);
        function balanceOf(address owner) external view returns (uint256);
    }

    #[sol(rpc)]
    interface MockERC1155 {
        function mint(address to, uint256 id, uint256 amount) external;
        function balanceOf(address account, uint256 id) external view returns (uint256);
    }

    #[sol(rpc)]
    interface IEAS {
        function getSchemaRegistry() external view returns (address);
    }
}

pub const MOCK_ERC20_ARTIFACT: &str = "MockERC20Permit";
pub const MOCK_ERC721_ARTIFACT: &str = "MockERC721";
pub const MOCK_ERC1155_ARTIFACT: &str = "MockERC1155";

/// Id of the first token a fresh `MockERC721` mints.
pub const MOCK_ERC721_FIRST_ID: U256 = U256::from_limbs([1, 0, 0, 0]);

impl TokenKind {
    pub const fn artifact_name(self) -> &'static str {
        match self {
            Self::Fungible => MOCK_ERC20_ARTIFACT,
            Self::NonFungible => MOCK_ERC721_ARTIFACT,
            Self::SemiFungible => MOCK_ERC1155_ARTIFACT,
        }
    }
}

fn constructor_args(key: MockTokenKey) -> Vec<DynSolValue> {
    match key {
        MockTokenKey::FungibleA => vec![
            DynSolValue::String("Token A".into()),
            DynSolValue::String("TKA".into()),
        ],
        MockTokenKey::FungibleB => vec![
            DynSolValue::String("Token B".into()),
            DynSolValue::String("TKB".into()),
        ],
        _ => Vec::new(),
    }
}

/// Deploy one mock token per [`MockTokenKey`].
pub async fn deploy_mock_tokens<D: Deployer + ?Sized>(
    deployer: &D,
    artifacts: &ArtifactStore,
) -> Result<MockTokenRegistry> {
    let mut tokens = MockTokenRegistry::default();
    for key in MockTokenKey::ALL {
        let artifact = artifacts.get(key.kind().artifact_name())?;
        let address = deployer
            .deploy(artifact, &constructor_args(key))
            .await
            .map_err(|e| match e {
                TestEnvError::Deployment { reason, .. } => {
                    TestEnvError::deployment(key.as_str(), reason)
                }
                other => other,
            })?;
        tokens.insert(key, address)?;
        debug!(token = %key, %address, "mock token deployed");
    }
    Ok(tokens)
}

/// Amounts used when seeding the parties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedAmounts {
    pub erc20: U256,
    pub erc1155_id: U256,
    pub erc1155: U256,
}

impl From<&TestEnvConfig> for SeedAmounts {
    fn from(config: &TestEnvConfig) -> Self {
        Self {
            erc20: config.erc20_seed_amount,
            erc1155_id: config.erc1155_token_id,
            erc1155: config.erc1155_seed_amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionAction {
    /// ERC20 `transfer` from the deployer's initial supply.
    Transfer { amount: U256 },
    /// ERC721 `mint` of one fresh token.
    Mint,
    /// ERC1155 `mint` of `amount` under `id`.
    MintAmount { id: U256, amount: U256 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Distribution {
    pub token: MockTokenKey,
    pub recipient: Address,
    pub action: DistributionAction,
}

/// The single action per token kind that seeds `recipient` from `pool`.
pub fn seed_plan(recipient: Address, pool: Pool, amounts: &SeedAmounts) -> Vec<Distribution> {
    [
        TokenKind::Fungible,
        TokenKind::NonFungible,
        TokenKind::SemiFungible,
    ]
    .into_iter()
    .map(|kind| Distribution {
        token: MockTokenKey::new(kind, pool),
        recipient,
        action: match kind {
            TokenKind::Fungible => DistributionAction::Transfer {
                amount: amounts.erc20,
            },
            TokenKind::NonFungible => DistributionAction::Mint,
            TokenKind::SemiFungible => DistributionAction::MintAmount {
                id: amounts.erc1155_id,
                amount: amounts.erc1155,
            },
        },
    })
    .collect()
}

/// Executes distributions from the deployer account.
#[derive(Debug, Clone)]
pub struct TokenDistributor {
    provider: DynProvider,
    timeout: Duration,
    amounts: SeedAmounts,
}

impl TokenDistributor {
    pub fn new(provider: DynProvider, timeout: Duration, amounts: SeedAmounts) -> Self {
        Self {
            provider,
            timeout,
            amounts,
        }
    }

    /// Seed `account` with every token kind of `pool`.
    pub async fn seed(
        &self,
        account: Address,
        pool: Pool,
        tokens: &MockTokenRegistry,
    ) -> Result<()> {
        for distribution in seed_plan(account, pool, &self.amounts) {
            self.distribute(&distribution, tokens).await?;
        }
        Ok(())
    }

    /// Pool A to `first`, pool B to `second`.
    pub async fn seed_parties(
        &self,
        first: Address,
        second: Address,
        tokens: &MockTokenRegistry,
    ) -> Result<()> {
        self.seed(first, Pool::A, tokens).await?;
        self.seed(second, Pool::B, tokens).await?;
        info!(%first, %second, "mock tokens distributed");
        Ok(())
    }

    pub async fn distribute(
        &self,
        distribution: &Distribution,
        tokens: &MockTokenRegistry,
    ) -> Result<()> {
        let Distribution {
            token: key,
            recipient,
            action,
        } = *distribution;
        let distribution_error = |reason: String| TestEnvError::Distribution {
            token: key.to_string(),
            recipient,
            reason,
        };

        let token = tokens
            .get(key)
            .ok_or_else(|| distribution_error("mock token not deployed".into()))?;

        let tx = match action {
            DistributionAction::Transfer { amount } => MockERC20Permit::new(token, &self.provider)
                .transfer(recipient, amount)
                .into_transaction_request(),
            DistributionAction::Mint => MockERC721::new(token, &self.provider)
                .mint(recipient)
                .into_transaction_request(),
            DistributionAction::MintAmount { id, amount } => {
                MockERC1155::new(token, &self.provider)
                    .mint(recipient, id, amount)
                    .into_transaction_request()
            }
        };

        submit(&self.provider, tx, self.timeout)
            .await
            .map_err(distribution_error)?;

        debug!(token = %key, %recipient, ?action, "distributed");
        Ok(())
    }
}

// Read helpers. These are plain `eth_call`s and are bounded only by the
// provider's transport, not by `request_timeout_secs`.

fn rpc_error(e: impl ToString) -> TestEnvError {
    TestEnvError::Rpc(e.to_string())
}

pub async fn erc20_balance<P: Provider>(
    provider: &P,
    token: Address,
    owner: Address,
) -> Result<U256> {
    MockERC20Permit::new(token, provider)
        .balanceOf(owner)
        .call()
        .await
        .map_err(rpc_error)
}

pub async fn erc721_owner<P: Provider>(provider: &P, token: Address, id: U256) -> Result<Address> {
    MockERC721::new(token, provider)
        .ownerOf(id)
        .call()
        .await
        .map_err(rpc_error)
}

pub async fn erc721_balance<P: Provider>(
    provider: &P,
    token: Address,
    owner: Address,
) -> Result<U256> {
    MockERC721::new(token, provider)
        .balanceOf(owner)
        .call()
        .await
        .map_err(rpc_error)
}

pub async fn erc1155_balance<P: Provider>(
    provider: &P,
    token: Address,
    owner: Address,
    id: U256,
) -> Result<U256> {
    MockERC1155::new(token, provider)
        .balanceOf(owner, id)
        .call()
        .await
        .map_err(rpc_error)
}

pub async fn native_balance<P: Provider>(provider: &P, account: Address) -> Result<U256> {
    provider.get_balance(account).await.map_err(rpc_error)
}

/// Schema registry the attestation registry at `eas` was constructed with.
pub async fn attestation_schema_registry<P: Provider>(
    provider: &P,
    eas: Address,
) -> Result<Address> {
    IEAS::new(eas, provider)
        .getSchemaRegistry()
        .call()
        .await
        .map_err(rpc_error)
}

/// [`attestation_schema_registry`] of the environment's attestation registry.
pub async fn schema_registry_of<P: Provider>(
    provider: &P,
    registry: &AddressRegistry,
) -> Result<Address> {
    let eas = registry.require(ContractKey::AttestationRegistry)?;
    attestation_schema_registry(provider, eas).await
}
