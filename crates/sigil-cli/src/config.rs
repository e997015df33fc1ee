//! Workflow configuration: `sigil.toml`, `.env` overrides and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use sigil_core::hash::ZERO_HASH;
use sigil_core::{Blockchain, CredentialStatusType, Did, DidMethod, NetworkId};
use sigil_identity::{check_schema_url, parse_http_url};
use sigil_storage::DEFAULT_MAX_DEPTH;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SigilConfig {
    #[serde(default)]
    pub chain: ChainConfig,

    #[serde(default)]
    pub rhs: RhsConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub credential: CredentialConfig,

    #[serde(default)]
    pub workflow: WorkflowConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainBackend {
    /// Read identity states from the state contract over JSON-RPC.
    Ethereum,
    /// Keep identity states in process memory.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_chain_backend")]
    pub backend: ChainBackend,
    /// Overridden by `RPC_URL`.
    #[serde(default)]
    pub rpc_url: String,
    /// Overridden by `CONTRACT_ADDRESS`.
    #[serde(default)]
    pub contract_address: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RhsConfig {
    /// Overridden by `RHS_URL`.
    #[serde(default = "default_rhs_url")]
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Rocksdb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,
    /// RocksDB directory, unused for the memory backend.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_merkle_tree_depth")]
    pub merkle_tree_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_method")]
    pub method: DidMethod,
    #[serde(default = "default_blockchain")]
    pub blockchain: Blockchain,
    #[serde(default = "default_network")]
    pub network: NetworkId,
    /// Seeds make the issuer and receiver DIDs reproducible.
    #[serde(default)]
    pub issuer_seed: Option<String>,
    #[serde(default)]
    pub receiver_seed: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_credential_type")]
    pub credential_type: String,
    /// Subject attributes; the receiver DID is added as `id`.
    #[serde(default = "default_subject")]
    pub subject: serde_json::Map<String, serde_json::Value>,
    /// Unix seconds.
    #[serde(default = "default_expiration")]
    pub expiration: Option<i64>,
    #[serde(default = "default_revocation_type")]
    pub revocation_type: CredentialStatusType,
    #[serde(default = "default_timeout_ms")]
    pub schema_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkflowConfig {
    /// Verify the issued credential from the receiver's wallet.
    #[serde(default)]
    pub verify: bool,
    /// Publish the issuer state and push it to the reverse hash service.
    /// Needs the memory chain backend.
    #[serde(default)]
    pub publish_state: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// Directory for the DID and credential documents. Nothing is written
    /// when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_chain_backend() -> ChainBackend {
    ChainBackend::Ethereum
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_rhs_url() -> String {
    "https://rhs-staging.polygonid.me".into()
}
fn default_storage_backend() -> StorageBackend {
    StorageBackend::Memory
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_merkle_tree_depth() -> usize {
    DEFAULT_MAX_DEPTH
}
fn default_method() -> DidMethod {
    DidMethod::Iden3
}
fn default_blockchain() -> Blockchain {
    Blockchain::Polygon
}
fn default_network() -> NetworkId {
    NetworkId::Mumbai
}
fn default_schema() -> String {
    "https://raw.githubusercontent.com/iden3/claim-schema-vocab/main/schemas/json/KYCAgeCredential-v3.json".into()
}
fn default_credential_type() -> String {
    "KYCAgeCredential".into()
}
fn default_subject() -> serde_json::Map<String, serde_json::Value> {
    let mut subject = serde_json::Map::new();
    subject.insert("birthday".into(), serde_json::json!(19960424));
    subject.insert("documentType".into(), serde_json::json!(99));
    subject
}
fn default_expiration() -> Option<i64> {
    Some(12_345_678_888)
}
fn default_revocation_type() -> CredentialStatusType {
    CredentialStatusType::Iden3ReverseSparseMerkleTreeProof
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            backend: default_chain_backend(),
            rpc_url: String::new(),
            contract_address: String::new(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for RhsConfig {
    fn default() -> Self {
        Self {
            url: default_rhs_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            data_dir: default_data_dir(),
            merkle_tree_depth: default_merkle_tree_depth(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            method: default_method(),
            blockchain: default_blockchain(),
            network: default_network(),
            issuer_seed: None,
            receiver_seed: None,
        }
    }
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            credential_type: default_credential_type(),
            subject: default_subject(),
            expiration: default_expiration(),
            revocation_type: default_revocation_type(),
            schema_timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl SigilConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: SigilConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `RPC_URL`, `CONTRACT_ADDRESS` and `RHS_URL` from the environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(url) = get("RPC_URL") {
            self.chain.rpc_url = url;
        }
        if let Some(address) = get("CONTRACT_ADDRESS") {
            self.chain.contract_address = address;
        }
        if let Some(url) = get("RHS_URL") {
            self.rhs.url = url;
        }
    }

    pub fn chain_timeout(&self) -> Duration {
        Duration::from_millis(self.chain.timeout_ms)
    }

    pub fn rhs_timeout(&self) -> Duration {
        Duration::from_millis(self.rhs.timeout_ms)
    }

    pub fn schema_timeout(&self) -> Duration {
        Duration::from_millis(self.credential.schema_timeout_ms)
    }

    /// Reject configurations the workflow cannot run with. Runs before any
    /// identity is created.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chain.backend == ChainBackend::Ethereum {
            if !is_http_url(&self.chain.rpc_url) {
                anyhow::bail!(
                    "chain.rpc_url must be an http(s) URL (set RPC_URL), got {:?}",
                    self.chain.rpc_url
                );
            }
            if !is_eth_address(&self.chain.contract_address) {
                anyhow::bail!(
                    "chain.contract_address must be a 0x-prefixed 20-byte address (set CONTRACT_ADDRESS), got {:?}",
                    self.chain.contract_address
                );
            }
            if self.workflow.publish_state {
                anyhow::bail!("workflow.publish_state needs chain.backend = \"memory\"");
            }
        }

        if self.credential.revocation_type == CredentialStatusType::Iden3ReverseSparseMerkleTreeProof
            && !is_http_url(&self.rhs.url)
        {
            anyhow::bail!(
                "rhs.url must be an http(s) URL (set RHS_URL), got {:?}",
                self.rhs.url
            );
        }
        if self.credential.revocation_type == CredentialStatusType::Iden3commRevocationStatusV1 {
            anyhow::bail!("credential.revocation_type Iden3commRevocationStatusV1.0 has no resolver");
        }

        let depth = self.storage.merkle_tree_depth;
        if !(2..=256).contains(&depth) {
            anyhow::bail!("storage.merkle_tree_depth must be within 2..=256, got {}", depth);
        }

        let i = &self.identity;
        Did::from_genesis_state(i.method, i.blockchain, i.network, &ZERO_HASH).map_err(|e| {
            anyhow::anyhow!("identity network {}:{}: {}", i.blockchain, i.network, e)
        })?;

        check_schema_url(&self.credential.schema)
            .map_err(|e| anyhow::anyhow!("credential.schema: {}", e))?;
        if self.credential.credential_type.is_empty() {
            anyhow::bail!("credential.credential_type must not be empty");
        }
        if self.credential.subject.contains_key("id") {
            anyhow::bail!("credential.subject must not set id; the receiver DID is used");
        }
        if let Some(exp) = self.credential.expiration {
            if exp <= chrono::Utc::now().timestamp() {
                anyhow::bail!("credential.expiration {} is in the past", exp);
            }
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("logging.format must be text or json, got {:?}", self.logging.format);
        }
        Ok(())
    }
}

fn is_http_url(s: &str) -> bool {
    parse_http_url(s).is_ok()
}

fn is_eth_address(s: &str) -> bool {
    s.strip_prefix("0x")
        .map(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> SigilConfig {
        let mut config = SigilConfig::default();
        config.chain.backend = ChainBackend::Memory;
        config
    }

    #[test]
    fn test_default_config() {
        let config = SigilConfig::default();
        assert_eq!(config.chain.backend, ChainBackend::Ethereum);
        assert_eq!(config.storage.merkle_tree_depth, 40);
        assert_eq!(config.identity.method, DidMethod::Iden3);
        assert_eq!(config.credential.credential_type, "KYCAgeCredential");
        assert_eq!(config.credential.subject["documentType"], 99);
        assert!(config.output.dir.is_none());
    }

    #[test]
    fn test_default_requires_rpc_config() {
        let err = SigilConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("RPC_URL"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SigilConfig::default();
        config.apply_overrides(|key| match key {
            "RPC_URL" => Some("https://rpc-amoy.polygon.technology".into()),
            "CONTRACT_ADDRESS" => Some("0x1a4cC30f2aA0377b0c3bc9848766D90cb4404124".into()),
            "RHS_URL" => Some("https://rhs.example.com".into()),
            _ => None,
        });
        assert_eq!(config.rhs.url, "https://rhs.example.com");
        config.validate().unwrap();
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = SigilConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let decoded: SigilConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(decoded.credential.schema, config.credential.schema);
        assert_eq!(decoded.credential.subject, config.credential.subject);
        assert_eq!(decoded.identity.network, config.identity.network);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let config = SigilConfig::load(Path::new("/nonexistent/sigil.toml")).unwrap();
        assert_eq!(config.rhs.url, "https://rhs-staging.polygonid.me");
    }

    #[test]
    fn test_config_from_toml_partial() {
        let toml_str = r#"
[chain]
backend = "memory"

[identity]
network = "amoy"
issuer_seed = "S1"

[credential]
revocation_type = "SparseMerkleTreeProof"

[credential.subject]
birthday = 20000101
documentType = 1
"#;
        let config: SigilConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.chain.backend, ChainBackend::Memory);
        assert_eq!(config.identity.network, NetworkId::Amoy);
        assert_eq!(config.identity.issuer_seed.as_deref(), Some("S1"));
        assert_eq!(
            config.credential.revocation_type,
            CredentialStatusType::SparseMerkleTreeProof
        );
        assert_eq!(config.credential.subject["birthday"], 20000101);
        assert_eq!(config.storage.merkle_tree_depth, 40);
        config.validate().unwrap();
    }

    #[test]
    fn test_validation_failures() {
        let mut bad_schema = memory_config();
        bad_schema.credential.schema = "ipfs://Qm".into();
        assert!(bad_schema.validate().is_err());

        let mut unparsable_schema = memory_config();
        unparsable_schema.credential.schema = "https://schemas example.com/kyc.json".into();
        assert!(unparsable_schema.validate().is_err());

        let mut bad_rhs = memory_config();
        bad_rhs.rhs.url = "https://rhs example.com".into();
        assert!(bad_rhs.validate().is_err());

        let mut bad_network = memory_config();
        bad_network.identity.blockchain = Blockchain::Ethereum;
        bad_network.identity.network = NetworkId::Amoy;
        assert!(bad_network.validate().is_err());

        let mut expired = memory_config();
        expired.credential.expiration = Some(1);
        assert!(expired.validate().is_err());

        let mut depth = memory_config();
        depth.storage.merkle_tree_depth = 300;
        assert!(depth.validate().is_err());

        let mut subject_id = memory_config();
        subject_id
            .credential
            .subject
            .insert("id".into(), serde_json::json!("did:x"));
        assert!(subject_id.validate().is_err());

        let mut publish_on_chain = SigilConfig::default();
        publish_on_chain.chain.rpc_url = "https://rpc.example.com".into();
        publish_on_chain.chain.contract_address =
            "0x1a4cC30f2aA0377b0c3bc9848766D90cb4404124".into();
        publish_on_chain.workflow.publish_state = true;
        assert!(publish_on_chain.validate().is_err());

        assert!(memory_config().validate().is_ok());
    }

    #[test]
    fn test_url_and_address_checks() {
        assert!(is_http_url("https://rhs.example.com"));
        assert!(is_http_url("http://127.0.0.1:8080"));
        assert!(!is_http_url("https://"));
        assert!(!is_http_url("ftp://x"));
        assert!(!is_http_url("https://host name"));
        assert!(is_eth_address("0x1a4cC30f2aA0377b0c3bc9848766D90cb4404124"));
        assert!(!is_eth_address("1a4cC30f2aA0377b0c3bc9848766D90cb4404124"));
        assert!(!is_eth_address("0x1234"));
    }
}
