//! The contract dependency graph and the driver that deploys it.
//!
//! An edge `A -> B` means A's constructor takes B's address. The plan lists
//! steps in a fixed topological order; [`DeploymentPlan::validate`] checks that
//! order against the edges before anything is sent to the chain.

use alloy::dyn_abi::DynSolValue;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    artifacts::ArtifactStore,
    deploy::Deployer,
    error::{Result, TestEnvError},
    registry::{AddressRegistry, ContractKey},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("{0} is deployed more than once")]
    Duplicate(ContractKey),

    #[error("{dependent} depends on {dependency}, which is never deployed")]
    UnknownDependency {
        dependent: ContractKey,
        dependency: ContractKey,
    },

    #[error("{dependent} is deployed before its dependency {dependency}")]
    ForwardReference {
        dependent: ContractKey,
        dependency: ContractKey,
    },

    #[error("dependency cycle through {0:?}")]
    Cycle(Vec<ContractKey>),

    #[error("no step deploys {0}")]
    Missing(ContractKey),
}

/// One deployment: the contract and, in constructor order, the contracts whose
/// addresses it receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentStep {
    pub key: ContractKey,
    pub dependencies: Vec<ContractKey>,
}

impl DeploymentStep {
    pub fn new(key: ContractKey, dependencies: impl Into<Vec<ContractKey>>) -> Self {
        Self {
            key,
            dependencies: dependencies.into(),
        }
    }

    pub fn independent(key: ContractKey) -> Self {
        Self::new(key, Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPlan {
    steps: Vec<DeploymentStep>,
}

impl DeploymentPlan {
    pub fn new(steps: Vec<DeploymentStep>) -> Self {
        Self { steps }
    }

    /// The full contract graph, in deployment order.
    pub fn alkahest() -> Self {
        use ContractKey::*;

        // Cross-token barter utilities take every escrow/payment pair so any
        // asset kind can be swapped for any other.
        const CROSS_TOKEN_BARTER: [ContractKey; 9] = [
            AttestationRegistry,
            FungibleEscrowObligation,
            FungiblePaymentObligation,
            NonFungibleEscrowObligation,
            NonFungiblePaymentObligation,
            SemiFungibleEscrowObligation,
            SemiFungiblePaymentObligation,
            BundledEscrowObligation,
            BundledPaymentObligation,
        ];
        let obligation = |key| DeploymentStep::new(key, [AttestationRegistry, SchemaRegistry]);

        Self::new(vec![
            DeploymentStep::independent(SchemaRegistry),
            DeploymentStep::new(AttestationRegistry, [SchemaRegistry]),
            // arbiters
            DeploymentStep::independent(TrivialArbiter),
            DeploymentStep::independent(TrustedPartyArbiter),
            DeploymentStep::new(TrustedOracleArbiter, [AttestationRegistry]),
            DeploymentStep::independent(SpecificAttestationArbiter),
            DeploymentStep::independent(IntrinsicsArbiter),
            DeploymentStep::independent(IntrinsicsArbiterV2),
            DeploymentStep::independent(AnyArbiter),
            DeploymentStep::independent(AllArbiter),
            // obligations
            obligation(FungibleEscrowObligation),
            obligation(FungiblePaymentObligation),
            obligation(NonFungibleEscrowObligation),
            obligation(NonFungiblePaymentObligation),
            obligation(SemiFungibleEscrowObligation),
            obligation(SemiFungiblePaymentObligation),
            obligation(BundledEscrowObligation),
            obligation(BundledPaymentObligation),
            obligation(AttestationEscrowObligation),
            obligation(AttestationEscrowObligationV2),
            obligation(StringObligation),
            // barter utilities
            DeploymentStep::new(FungibleBarterUtility, CROSS_TOKEN_BARTER),
            DeploymentStep::new(NonFungibleBarterUtility, CROSS_TOKEN_BARTER),
            DeploymentStep::new(SemiFungibleBarterUtility, CROSS_TOKEN_BARTER),
            DeploymentStep::new(
                BundledBarterUtility,
                [
                    AttestationRegistry,
                    BundledEscrowObligation,
                    BundledPaymentObligation,
                ],
            ),
            DeploymentStep::new(
                AttestationBarterUtility,
                [
                    AttestationRegistry,
                    SchemaRegistry,
                    AttestationEscrowObligationV2,
                ],
            ),
        ])
    }

    pub fn steps(&self) -> &[DeploymentStep] {
        &self.steps
    }

    /// `(dependent, dependency)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (ContractKey, ContractKey)> + '_ {
        self.steps
            .iter()
            .flat_map(|step| step.dependencies.iter().map(move |dep| (step.key, *dep)))
    }

    /// Check that the listed order never references a contract before it is
    /// deployed and that every registry key is produced exactly once.
    pub fn validate(&self) -> std::result::Result<(), PlanError> {
        let planned: HashSet<_> = self.steps.iter().map(|step| step.key).collect();
        let mut deployed = HashSet::new();

        for step in &self.steps {
            for dependency in &step.dependencies {
                if !planned.contains(dependency) {
                    return Err(PlanError::UnknownDependency {
                        dependent: step.key,
                        dependency: *dependency,
                    });
                }
                if !deployed.contains(dependency) {
                    return Err(PlanError::ForwardReference {
                        dependent: step.key,
                        dependency: *dependency,
                    });
                }
            }
            if !deployed.insert(step.key) {
                return Err(PlanError::Duplicate(step.key));
            }
        }

        if let Some(missing) = ContractKey::ALL
            .into_iter()
            .find(|key| !deployed.contains(key))
        {
            return Err(PlanError::Missing(missing));
        }

        Ok(())
    }

    /// Topological order computed from the edges alone (Kahn's algorithm).
    /// Ties are broken by position in the plan, so a valid plan yields its own
    /// order back.
    pub fn topological_order(&self) -> std::result::Result<Vec<ContractKey>, PlanError> {
        let position: HashMap<_, _> = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| (step.key, i))
            .collect();
        if position.len() != self.steps.len() {
            let mut seen = HashSet::new();
            let duplicate = self
                .steps
                .iter()
                .find(|step| !seen.insert(step.key))
                .map(|step| step.key);
            if let Some(key) = duplicate {
                return Err(PlanError::Duplicate(key));
            }
        }

        let mut indegree = vec![0usize; self.steps.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.steps.len()];
        for (i, step) in self.steps.iter().enumerate() {
            let unique: HashSet<_> = step.dependencies.iter().collect();
            for dependency in unique {
                let Some(&j) = position.get(dependency) else {
                    return Err(PlanError::UnknownDependency {
                        dependent: step.key,
                        dependency: *dependency,
                    });
                };
                indegree[i] += 1;
                dependents[j].push(i);
            }
        }

        let mut ready: Vec<usize> = (0..self.steps.len()).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(self.steps.len());

        while !ready.is_empty() {
            // smallest plan position first
            ready.sort_unstable_by(|a, b| b.cmp(a));
            let Some(next) = ready.pop() else { break };
            order.push(self.steps[next].key);
            for &dependent in &dependents[next] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    ready.push(dependent);
                }
            }
        }

        if order.len() != self.steps.len() {
            let stuck = self
                .steps
                .iter()
                .enumerate()
                .filter(|(i, _)| indegree[*i] > 0)
                .map(|(_, step)| step.key)
                .collect();
            return Err(PlanError::Cycle(stuck));
        }

        Ok(order)
    }
}

impl Default for DeploymentPlan {
    fn default() -> Self {
        Self::alkahest()
    }
}

/// Drives a [`Deployer`] through a [`DeploymentPlan`], threading the address
/// registry from one step to the next.
pub struct GraphDriver<'a, D: ?Sized> {
    plan: &'a DeploymentPlan,
    deployer: &'a D,
    artifacts: &'a ArtifactStore,
}

impl<'a, D: Deployer + ?Sized> GraphDriver<'a, D> {
    pub fn new(plan: &'a DeploymentPlan, deployer: &'a D, artifacts: &'a ArtifactStore) -> Self {
        Self {
            plan,
            deployer,
            artifacts,
        }
    }

    /// Deploy every step in order. The registry is only returned once the whole
    /// plan succeeded; the first failure aborts the run.
    pub async fn run(&self, mut registry: AddressRegistry) -> Result<AddressRegistry> {
        self.plan.validate()?;

        for step in self.plan.steps() {
            let args = step
                .dependencies
                .iter()
                .map(|dependency| {
                    registry
                        .get(*dependency)
                        .filter(|address| !address.is_zero())
                        .map(DynSolValue::Address)
                        .ok_or_else(|| {
                            TestEnvError::deployment(
                                step.key.as_str(),
                                format!("dependency {dependency} is unresolved"),
                            )
                        })
                })
                .collect::<Result<Vec<_>>>()?;

            let artifact = self.artifacts.get(step.key.artifact_name())?;
            let address = self
                .deployer
                .deploy(artifact, &args)
                .await
                .map_err(|e| match e {
                    TestEnvError::Deployment { reason, .. } => {
                        TestEnvError::deployment(step.key.as_str(), reason)
                    }
                    other => other,
                })?;

            registry.insert(step.key, address)?;
            debug!(contract = %step.key, %address, "registered");
        }

        info!(contracts = registry.len(), "contract graph deployed");
        Ok(registry)
    }
}
