//! Ephemeral anvil environments with the full Alkahest contract graph
//! deployed.
//!
//! [`setup_test_environment`] spawns a local chain, funds a deployer and two
//! parties, deploys every Alkahest contract in dependency order, seeds each
//! party with its own pool of mock tokens and captures a state snapshot. The
//! returned [`TestEnvironment`] owns the chain process; drop it or call
//! [`teardown_test_environment`] to stop it.
//!
//! ```no_run
//! # async fn run() -> alkahest_testenv::Result<()> {
//! use alkahest_testenv::{ContractKey, setup_test_environment, teardown_test_environment};
//!
//! let mut env = setup_test_environment().await?;
//! let eas = env.addresses.require(ContractKey::AttestationRegistry)?;
//! println!("EAS deployed at {eas}");
//! teardown_test_environment(&mut env);
//! # Ok(())
//! # }
//! ```

pub mod accounts;
pub mod artifacts;
pub mod clients;
pub mod config;
pub mod deploy;
pub mod env;
pub mod error;
pub mod graph;
pub mod node;
pub mod registry;
pub mod snapshot;
pub mod tokens;

pub use accounts::{Account, AccountProvisioner};
pub use clients::{
    AccountBinding, ClientFactory, Endpoint, NoClients, PartyClients, Transport, WalletClients,
};
pub use config::TestEnvConfig;
pub use deploy::{ChainDeployer, Deployer};
pub use env::{
    EnvironmentSummary, TestEnvironment, setup_test_environment, setup_test_environment_with,
    teardown_test_environment,
};
pub use error::{Result, TestEnvError};
pub use graph::{DeploymentPlan, GraphDriver, PlanError};
pub use node::{ChainProcess, InstanceId};
pub use registry::{AddressRegistry, ContractKey, MockTokenKey, MockTokenRegistry, Pool, TokenKind};
pub use snapshot::ChainSnapshot;
