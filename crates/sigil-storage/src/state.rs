//! Published identity state: in-memory ledger and Ethereum state contract reader.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use sigil_core::hash::{serde_hash, Hash};
use sigil_core::Did;

use crate::error::StorageError;

/// Latest published state of an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateInfo {
    pub id: Did,
    #[serde(with = "serde_hash")]
    pub state: Hash,
}

/// A request to move an identity from `old_state` to `new_state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTransition {
    pub id: Did,
    #[serde(with = "serde_hash")]
    pub old_state: Hash,
    #[serde(with = "serde_hash")]
    pub new_state: Hash,
    pub is_old_state_genesis: bool,
}

/// Reader (and optionally writer) of published identity states.
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// Fails with [`StorageError::StateNotFound`] when nothing was published.
    async fn get_latest_state_by_id(&self, id: &Did) -> Result<StateInfo, StorageError>;

    async fn publish_state(&self, transition: &StateTransition) -> Result<(), StorageError>;
}

/// Local ledger for tests and offline runs.
#[derive(Default)]
pub struct InMemoryStateStorage {
    states: DashMap<String, StateInfo>,
}

impl InMemoryStateStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStorage for InMemoryStateStorage {
    async fn get_latest_state_by_id(&self, id: &Did) -> Result<StateInfo, StorageError> {
        self.states
            .get(&id.to_string())
            .map(|s| s.value().clone())
            .ok_or_else(|| StorageError::StateNotFound(id.to_string()))
    }

    async fn publish_state(&self, transition: &StateTransition) -> Result<(), StorageError> {
        let key = transition.id.to_string();
        match self.states.get(&key).map(|s| s.state) {
            Some(current) if current != transition.old_state => {
                return Err(StorageError::StateMismatch(format!(
                    "{} is at {}, transition starts from {}",
                    key,
                    hex::encode(current),
                    hex::encode(transition.old_state)
                )));
            }
            None if !transition.is_old_state_genesis => {
                return Err(StorageError::StateMismatch(format!(
                    "{} has no published state and the transition is not from genesis",
                    key
                )));
            }
            None if !transition.id.is_genesis_state(&transition.old_state) => {
                return Err(StorageError::StateMismatch(format!(
                    "{} was not derived from {}",
                    key,
                    hex::encode(transition.old_state)
                )));
            }
            _ => {}
        }
        self.states.insert(
            key,
            StateInfo {
                id: transition.id,
                state: transition.new_state,
            },
        );
        tracing::info!(did = %transition.id, "state published");
        Ok(())
    }
}

/// `getStateInfoById(uint256)`.
const GET_STATE_INFO_BY_ID_SELECTOR: &str = "b4bdea55";

/// Ethereum state contract connection settings.
#[derive(Debug, Clone)]
pub struct EthConnectionConfig {
    pub rpc_url: String,
    pub contract_address: String,
    pub timeout: Duration,
}

/// Read-only reader of the on-chain state contract over JSON-RPC.
pub struct EthStateStorage {
    config: EthConnectionConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    message: String,
}

impl EthStateStorage {
    pub fn new(config: EthConnectionConfig) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::Rpc(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// The identity id as a big-endian uint256 ABI word.
    fn id_word(id: &Did) -> String {
        let mut word = id.id.to_hash();
        word.reverse();
        hex::encode(word)
    }

    fn call_data(id: &Did) -> String {
        format!("0x{}{}", GET_STATE_INFO_BY_ID_SELECTOR, Self::id_word(id))
    }

    fn decode_state(id: &Did, result: &str) -> Result<Hash, StorageError> {
        let raw = hex::decode(result.trim_start_matches("0x"))
            .map_err(|e| StorageError::Rpc(format!("malformed eth_call result: {}", e)))?;
        if raw.len() < 64 {
            return Err(StorageError::Rpc(format!(
                "eth_call result too short: {} bytes",
                raw.len()
            )));
        }
        if raw[..32].iter().all(|b| *b == 0) {
            return Err(StorageError::StateNotFound(id.to_string()));
        }
        let mut state = [0u8; 32];
        state.copy_from_slice(&raw[32..64]);
        state.reverse();
        Ok(state)
    }
}

#[async_trait]
impl StateStorage for EthStateStorage {
    async fn get_latest_state_by_id(&self, id: &Did) -> Result<StateInfo, StorageError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [
                { "to": self.config.contract_address, "data": Self::call_data(id) },
                "latest"
            ]
        });

        tracing::debug!(did = %id, url = %self.config.rpc_url, "querying state contract");
        let response = self
            .client
            .post(&self.config.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StorageError::Timeout
                } else {
                    StorageError::Rpc(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(StorageError::Rpc(format!(
                "RPC endpoint returned {}",
                response.status()
            )));
        }

        let rpc: RpcResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Rpc(e.to_string()))?;

        if let Some(err) = rpc.error {
            if err.message.contains("does not exist") {
                return Err(StorageError::StateNotFound(id.to_string()));
            }
            return Err(StorageError::Rpc(err.message));
        }

        let result = rpc
            .result
            .ok_or_else(|| StorageError::Rpc("eth_call returned no result".into()))?;
        Ok(StateInfo {
            id: *id,
            state: Self::decode_state(id, &result)?,
        })
    }

    async fn publish_state(&self, _transition: &StateTransition) -> Result<(), StorageError> {
        Err(StorageError::ReadOnly)
    }
}
