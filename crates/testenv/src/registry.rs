//! Logical contract names and the address registries built during setup.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

use crate::error::{Result, TestEnvError};

/// Every contract the deployment graph produces. The serialized names are the
/// registry keys handed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContractKey {
    SchemaRegistry,
    AttestationRegistry,

    TrivialArbiter,
    TrustedPartyArbiter,
    TrustedOracleArbiter,
    SpecificAttestationArbiter,
    IntrinsicsArbiter,
    IntrinsicsArbiterV2,
    AnyArbiter,
    AllArbiter,

    FungibleEscrowObligation,
    FungiblePaymentObligation,
    NonFungibleEscrowObligation,
    NonFungiblePaymentObligation,
    SemiFungibleEscrowObligation,
    SemiFungiblePaymentObligation,
    BundledEscrowObligation,
    BundledPaymentObligation,
    AttestationEscrowObligation,
    AttestationEscrowObligationV2,
    StringObligation,

    FungibleBarterUtility,
    NonFungibleBarterUtility,
    SemiFungibleBarterUtility,
    BundledBarterUtility,
    AttestationBarterUtility,
}

impl ContractKey {
    pub const ALL: [Self; 26] = [
        Self::SchemaRegistry,
        Self::AttestationRegistry,
        Self::TrivialArbiter,
        Self::TrustedPartyArbiter,
        Self::TrustedOracleArbiter,
        Self::SpecificAttestationArbiter,
        Self::IntrinsicsArbiter,
        Self::IntrinsicsArbiterV2,
        Self::AnyArbiter,
        Self::AllArbiter,
        Self::FungibleEscrowObligation,
        Self::FungiblePaymentObligation,
        Self::NonFungibleEscrowObligation,
        Self::NonFungiblePaymentObligation,
        Self::SemiFungibleEscrowObligation,
        Self::SemiFungiblePaymentObligation,
        Self::BundledEscrowObligation,
        Self::BundledPaymentObligation,
        Self::AttestationEscrowObligation,
        Self::AttestationEscrowObligationV2,
        Self::StringObligation,
        Self::FungibleBarterUtility,
        Self::NonFungibleBarterUtility,
        Self::SemiFungibleBarterUtility,
        Self::BundledBarterUtility,
        Self::AttestationBarterUtility,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SchemaRegistry => "schema-registry",
            Self::AttestationRegistry => "attestation-registry",
            Self::TrivialArbiter => "trivial-arbiter",
            Self::TrustedPartyArbiter => "trusted-party-arbiter",
            Self::TrustedOracleArbiter => "trusted-oracle-arbiter",
            Self::SpecificAttestationArbiter => "specific-attestation-arbiter",
            Self::IntrinsicsArbiter => "intrinsics-arbiter",
            Self::IntrinsicsArbiterV2 => "intrinsics-arbiter-v2",
            Self::AnyArbiter => "any-arbiter",
            Self::AllArbiter => "all-arbiter",
            Self::FungibleEscrowObligation => "fungible-escrow-obligation",
            Self::FungiblePaymentObligation => "fungible-payment-obligation",
            Self::NonFungibleEscrowObligation => "non-fungible-escrow-obligation",
            Self::NonFungiblePaymentObligation => "non-fungible-payment-obligation",
            Self::SemiFungibleEscrowObligation => "semi-fungible-escrow-obligation",
            Self::SemiFungiblePaymentObligation => "semi-fungible-payment-obligation",
            Self::BundledEscrowObligation => "bundled-escrow-obligation",
            Self::BundledPaymentObligation => "bundled-payment-obligation",
            Self::AttestationEscrowObligation => "attestation-escrow-obligation",
            Self::AttestationEscrowObligationV2 => "attestation-escrow-obligation-v2",
            Self::StringObligation => "string-obligation",
            Self::FungibleBarterUtility => "fungible-barter-utility",
            Self::NonFungibleBarterUtility => "non-fungible-barter-utility",
            Self::SemiFungibleBarterUtility => "semi-fungible-barter-utility",
            Self::BundledBarterUtility => "bundled-barter-utility",
            Self::AttestationBarterUtility => "attestation-barter-utility",
        }
    }

    /// Name of the compiled artifact deployed under this key.
    pub const fn artifact_name(self) -> &'static str {
        match self {
            Self::SchemaRegistry => "SchemaRegistry",
            Self::AttestationRegistry => "EAS",
            Self::TrivialArbiter => "TrivialArbiter",
            Self::TrustedPartyArbiter => "TrustedPartyArbiter",
            Self::TrustedOracleArbiter => "TrustedOracleArbiter",
            Self::SpecificAttestationArbiter => "SpecificAttestationArbiter",
            Self::IntrinsicsArbiter => "IntrinsicsArbiter",
            Self::IntrinsicsArbiterV2 => "IntrinsicsArbiter2",
            Self::AnyArbiter => "AnyArbiter",
            Self::AllArbiter => "AllArbiter",
            Self::FungibleEscrowObligation => "ERC20EscrowObligation",
            Self::FungiblePaymentObligation => "ERC20PaymentObligation",
            Self::NonFungibleEscrowObligation => "ERC721EscrowObligation",
            Self::NonFungiblePaymentObligation => "ERC721PaymentObligation",
            Self::SemiFungibleEscrowObligation => "ERC1155EscrowObligation",
            Self::SemiFungiblePaymentObligation => "ERC1155PaymentObligation",
            Self::BundledEscrowObligation => "TokenBundleEscrowObligation",
            Self::BundledPaymentObligation => "TokenBundlePaymentObligation",
            Self::AttestationEscrowObligation => "AttestationEscrowObligation",
            Self::AttestationEscrowObligationV2 => "AttestationEscrowObligation2",
            Self::StringObligation => "StringObligation",
            Self::FungibleBarterUtility => "ERC20BarterCrossToken",
            Self::NonFungibleBarterUtility => "ERC721BarterCrossToken",
            Self::SemiFungibleBarterUtility => "ERC1155BarterCrossToken",
            Self::BundledBarterUtility => "TokenBundleBarterUtils",
            Self::AttestationBarterUtility => "AttestationBarterUtils",
        }
    }
}

impl fmt::Display for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Resolved contract addresses keyed by [`ContractKey`].
///
/// Append-only while the graph is deployed: an entry is written once and never
/// replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressRegistry {
    entries: BTreeMap<ContractKey, Address>,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: ContractKey) -> Option<Address> {
        self.entries.get(&key).copied()
    }

    pub fn require(&self, key: ContractKey) -> Result<Address> {
        self.get(key)
            .ok_or_else(|| TestEnvError::deployment(key.as_str(), "address not resolved"))
    }

    pub(crate) fn insert(&mut self, key: ContractKey, address: Address) -> Result<()> {
        if address.is_zero() {
            return Err(TestEnvError::deployment(key.as_str(), "resolved to the zero address"));
        }
        if let Some(existing) = self.entries.get(&key) {
            return Err(TestEnvError::deployment(
                key.as_str(),
                format!("already deployed at {existing}"),
            ));
        }
        self.entries.insert(key, address);
        Ok(())
    }

    pub fn contains(&self, key: ContractKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys of [`ContractKey::ALL`] with no address yet.
    pub fn missing(&self) -> Vec<ContractKey> {
        ContractKey::ALL
            .into_iter()
            .filter(|key| !self.contains(*key))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.len() == ContractKey::ALL.len() && self.missing().is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContractKey, Address)> + '_ {
        self.entries.iter().map(|(key, address)| (*key, *address))
    }
}

/// Kind of auxiliary test token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Fungible,
    NonFungible,
    SemiFungible,
}

/// Auxiliary pool. Pool A is seeded to the first party, pool B to the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pool {
    A,
    B,
}

/// One mock token instance per (kind, pool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MockTokenKey {
    FungibleA,
    FungibleB,
    NonFungibleA,
    NonFungibleB,
    SemiFungibleA,
    SemiFungibleB,
}

impl MockTokenKey {
    pub const ALL: [Self; 6] = [
        Self::FungibleA,
        Self::FungibleB,
        Self::NonFungibleA,
        Self::NonFungibleB,
        Self::SemiFungibleA,
        Self::SemiFungibleB,
    ];

    pub const fn new(kind: TokenKind, pool: Pool) -> Self {
        match (kind, pool) {
            (TokenKind::Fungible, Pool::A) => Self::FungibleA,
            (TokenKind::Fungible, Pool::B) => Self::FungibleB,
            (TokenKind::NonFungible, Pool::A) => Self::NonFungibleA,
            (TokenKind::NonFungible, Pool::B) => Self::NonFungibleB,
            (TokenKind::SemiFungible, Pool::A) => Self::SemiFungibleA,
            (TokenKind::SemiFungible, Pool::B) => Self::SemiFungibleB,
        }
    }

    pub const fn kind(self) -> TokenKind {
        match self {
            Self::FungibleA | Self::FungibleB => TokenKind::Fungible,
            Self::NonFungibleA | Self::NonFungibleB => TokenKind::NonFungible,
            Self::SemiFungibleA | Self::SemiFungibleB => TokenKind::SemiFungible,
        }
    }

    pub const fn pool(self) -> Pool {
        match self {
            Self::FungibleA | Self::NonFungibleA | Self::SemiFungibleA => Pool::A,
            Self::FungibleB | Self::NonFungibleB | Self::SemiFungibleB => Pool::B,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FungibleA => "fungible-a",
            Self::FungibleB => "fungible-b",
            Self::NonFungibleA => "non-fungible-a",
            Self::NonFungibleB => "non-fungible-b",
            Self::SemiFungibleA => "semi-fungible-a",
            Self::SemiFungibleB => "semi-fungible-b",
        }
    }
}

impl fmt::Display for MockTokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Addresses of the auxiliary mock tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MockTokenRegistry {
    entries: BTreeMap<MockTokenKey, Address>,
}

impl MockTokenRegistry {
    pub fn get(&self, key: MockTokenKey) -> Option<Address> {
        self.entries.get(&key).copied()
    }

    pub fn require(&self, key: MockTokenKey) -> Result<Address> {
        self.get(key)
            .ok_or_else(|| TestEnvError::deployment(key.as_str(), "mock token not deployed"))
    }

    pub(crate) fn insert(&mut self, key: MockTokenKey, address: Address) -> Result<()> {
        if self.entries.contains_key(&key) {
            return Err(TestEnvError::deployment(key.as_str(), "already deployed"));
        }
        self.entries.insert(key, address);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MockTokenKey, Address)> + '_ {
        self.entries.iter().map(|(key, address)| (*key, *address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn serialized_keys_match_as_str() {
        for key in ContractKey::ALL {
            let json = serde_json::to_value(key).unwrap();
            assert_eq!(json, serde_json::Value::String(key.as_str().to_string()));
        }
        for key in MockTokenKey::ALL {
            let json = serde_json::to_value(key).unwrap();
            assert_eq!(json, serde_json::Value::String(key.as_str().to_string()));
        }
    }

    #[test]
    fn keys_and_artifacts_are_unique() {
        let names: HashSet<_> = ContractKey::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names.len(), ContractKey::ALL.len());

        // Both intrinsics arbiters must come from different artifacts.
        let artifacts: HashSet<_> = ContractKey::ALL.iter().map(|k| k.artifact_name()).collect();
        assert_eq!(artifacts.len(), ContractKey::ALL.len());
    }

    #[test]
    fn insert_is_append_only() {
        let mut registry = AddressRegistry::new();
        registry
            .insert(ContractKey::SchemaRegistry, Address::repeat_byte(1))
            .unwrap();

        let err = registry
            .insert(ContractKey::SchemaRegistry, Address::repeat_byte(2))
            .unwrap_err();
        assert!(matches!(err, TestEnvError::Deployment { .. }));
        assert_eq!(registry.get(ContractKey::SchemaRegistry), Some(Address::repeat_byte(1)));

        assert!(registry.insert(ContractKey::AttestationRegistry, Address::ZERO).is_err());
    }

    #[test]
    fn completeness_tracks_missing_keys() {
        let mut registry = AddressRegistry::new();
        assert_eq!(registry.missing().len(), ContractKey::ALL.len());

        for (i, key) in ContractKey::ALL.into_iter().enumerate() {
            registry.insert(key, Address::with_last_byte(i as u8 + 1)).unwrap();
        }
        assert!(registry.is_complete());
        assert!(registry.missing().is_empty());
    }

    #[test]
    fn registry_serializes_as_flat_map() {
        let mut registry = AddressRegistry::new();
        registry
            .insert(ContractKey::IntrinsicsArbiterV2, Address::repeat_byte(0xaa))
            .unwrap();

        let json = serde_json::to_value(&registry).unwrap();
        assert!(json.get("intrinsics-arbiter-v2").is_some());

        let back: AddressRegistry = serde_json::from_value(json).unwrap();
        assert_eq!(back, registry);
    }

    #[test]
    fn mock_key_kind_and_pool() {
        for key in MockTokenKey::ALL {
            assert_eq!(MockTokenKey::new(key.kind(), key.pool()), key);
        }
    }
}
