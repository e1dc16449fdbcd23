//! Prebuilt contract artifacts in forge's JSON output format.
//!
//! An artifact is the contract ABI plus its creation bytecode. Artifacts are
//! static inputs: they are read once at the start of a run and never mutated.

use alloy::{
    dyn_abi::{DynSolValue, JsonAbiExt},
    json_abi::JsonAbi,
    primitives::Bytes,
};
use serde::Deserialize;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::error::{Result, TestEnvError};

#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub name: String,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

#[derive(Deserialize)]
struct ForgeArtifact {
    abi: JsonAbi,
    bytecode: ForgeBytecode,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ForgeBytecode {
    Object { object: String },
    Raw(String),
}

impl ContractArtifact {
    pub fn new(name: impl Into<String>, abi: JsonAbi, bytecode: Bytes) -> Self {
        Self {
            name: name.into(),
            abi,
            bytecode,
        }
    }

    /// Parse a forge artifact (`{"abi": [...], "bytecode": {"object": "0x.."}}`).
    pub fn from_json(name: &str, json: &str) -> Result<Self> {
        let artifact: ForgeArtifact =
            serde_json::from_str(json).map_err(|e| TestEnvError::artifact(name, e))?;

        let object = match artifact.bytecode {
            ForgeBytecode::Object { object } => object,
            ForgeBytecode::Raw(raw) => raw,
        };
        let bytecode: Bytes = object
            .parse()
            .map_err(|e| TestEnvError::artifact(name, format!("invalid bytecode: {e}")))?;

        if bytecode.is_empty() {
            return Err(TestEnvError::artifact(
                name,
                "empty bytecode, abstract contract or interface?",
            ));
        }

        Ok(Self::new(name, artifact.abi, bytecode))
    }

    /// Creation code followed by the ABI-encoded constructor arguments.
    ///
    /// Arguments are checked against the artifact's constructor, so a count or
    /// type mismatch fails here rather than reverting on-chain.
    pub fn deployment_code(&self, args: &[DynSolValue]) -> Result<Bytes> {
        let mut code = self.bytecode.to_vec();

        match self.abi.constructor() {
            Some(constructor) => {
                let encoded = constructor
                    .abi_encode_input(args)
                    .map_err(|e| TestEnvError::deployment(&self.name, e))?;
                code.extend_from_slice(&encoded);
            }
            None if args.is_empty() => {}
            None => {
                return Err(TestEnvError::deployment(
                    &self.name,
                    format!("no constructor, but {} arguments were supplied", args.len()),
                ));
            }
        }

        Ok(code.into())
    }
}

/// Artifacts loaded up front, keyed by contract name.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    artifacts: HashMap<String, ContractArtifact>,
}

impl ArtifactStore {
    /// Load every named artifact from `dir`. Fails on the first missing one.
    pub fn load<'a>(dir: &Path, names: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut artifacts = HashMap::new();
        for name in names {
            let path = find_artifact(dir, name)?;
            let content = std::fs::read_to_string(&path)
                .map_err(|e| TestEnvError::artifact(name, format!("{}: {e}", path.display())))?;
            let artifact = ContractArtifact::from_json(name, &content)?;
            debug!(name, path = %path.display(), "artifact loaded");
            artifacts.insert(name.to_string(), artifact);
        }
        Ok(Self { artifacts })
    }

    pub fn insert(&mut self, artifact: ContractArtifact) {
        self.artifacts.insert(artifact.name.clone(), artifact);
    }

    pub fn get(&self, name: &str) -> Result<&ContractArtifact> {
        self.artifacts
            .get(name)
            .ok_or_else(|| TestEnvError::artifact(name, "not loaded"))
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl FromIterator<ContractArtifact> for ArtifactStore {
    fn from_iter<I: IntoIterator<Item = ContractArtifact>>(iter: I) -> Self {
        let mut store = Self::default();
        for artifact in iter {
            store.insert(artifact);
        }
        store
    }
}

/// `<dir>/<Name>.json`, falling back to forge's `<dir>/<Name>.sol/<Name>.json`.
fn find_artifact(dir: &Path, name: &str) -> Result<PathBuf> {
    let flat = dir.join(format!("{name}.json"));
    if flat.is_file() {
        return Ok(flat);
    }

    let forge = dir.join(format!("{name}.sol")).join(format!("{name}.json"));
    if forge.is_file() {
        return Ok(forge);
    }

    Err(TestEnvError::artifact(
        name,
        format!(
            "not found in {}. Run `forge build` or point artifacts_dir at the compiled contracts",
            dir.display()
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;

    const CTOR_ADDRESS: &str = r#"{
        "abi": [
            {"type": "constructor", "inputs": [{"name": "_eas", "type": "address", "internalType": "contract IEAS"}], "stateMutability": "nonpayable"}
        ],
        "bytecode": {"object": "0x60806040"}
    }"#;

    const NO_CTOR: &str = r#"{"abi": [], "bytecode": {"object": "0x6080"}}"#;

    #[test]
    fn parse_forge_artifact() {
        let artifact = ContractArtifact::from_json("TrustedOracleArbiter", CTOR_ADDRESS).unwrap();
        assert_eq!(artifact.bytecode, Bytes::from_static(&[0x60, 0x80, 0x60, 0x40]));
        assert_eq!(artifact.abi.constructor().unwrap().inputs.len(), 1);
    }

    #[test]
    fn parse_raw_bytecode_string() {
        let json = r#"{"abi": [], "bytecode": "0x6001"}"#;
        let artifact = ContractArtifact::from_json("Raw", json).unwrap();
        assert_eq!(artifact.bytecode.len(), 2);
    }

    #[test]
    fn empty_bytecode_is_rejected() {
        let json = r#"{"abi": [], "bytecode": {"object": "0x"}}"#;
        let err = ContractArtifact::from_json("IEAS", json).unwrap_err();
        assert!(matches!(err, TestEnvError::Artifact { .. }));
    }

    #[test]
    fn deployment_code_appends_encoded_args() {
        let artifact = ContractArtifact::from_json("TrustedOracleArbiter", CTOR_ADDRESS).unwrap();
        let eas = Address::repeat_byte(0x11);

        let code = artifact
            .deployment_code(&[DynSolValue::Address(eas)])
            .unwrap();

        assert_eq!(code.len(), 4 + 32);
        assert_eq!(&code[..4], &[0x60, 0x80, 0x60, 0x40]);
        assert_eq!(&code[4 + 12..], eas.as_slice());
    }

    #[test]
    fn deployment_code_rejects_wrong_arity() {
        let artifact = ContractArtifact::from_json("TrustedOracleArbiter", CTOR_ADDRESS).unwrap();
        let err = artifact.deployment_code(&[]).unwrap_err();
        assert!(matches!(err, TestEnvError::Deployment { .. }));

        let no_ctor = ContractArtifact::from_json("TrivialArbiter", NO_CTOR).unwrap();
        assert_eq!(no_ctor.deployment_code(&[]).unwrap().len(), 2);
        let err = no_ctor
            .deployment_code(&[DynSolValue::Address(Address::ZERO)])
            .unwrap_err();
        assert!(matches!(err, TestEnvError::Deployment { .. }));
    }

    #[test]
    fn load_finds_flat_and_forge_layouts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("TrivialArbiter.json"), NO_CTOR).unwrap();
        let nested = dir.path().join("TrustedOracleArbiter.sol");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("TrustedOracleArbiter.json"), CTOR_ADDRESS).unwrap();

        let store =
            ArtifactStore::load(dir.path(), ["TrivialArbiter", "TrustedOracleArbiter"]).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.get("TrustedOracleArbiter").is_ok());
        assert!(store.get("AnyArbiter").is_err());
    }

    #[test]
    fn load_fails_on_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArtifactStore::load(dir.path(), ["EAS"]).unwrap_err();
        match err {
            TestEnvError::Artifact { name, reason } => {
                assert_eq!(name, "EAS");
                assert!(reason.contains("forge build"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
