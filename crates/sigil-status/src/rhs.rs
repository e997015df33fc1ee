//! Reverse hash service: a public store of tree nodes keyed by their hash.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use sigil_core::hash::{hash_elems, serde_hash, serde_hashes, to_hex, Hash, LEAF_MARKER, ZERO_HASH};
use sigil_core::merkle::{key_bit, NodeAux};
use sigil_core::Proof;

use crate::error::StatusError;

/// A node as stored by a reverse hash service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RhsNode {
    #[serde(with = "serde_hash")]
    pub hash: Hash,
    #[serde(with = "serde_hashes")]
    pub children: Vec<Hash>,
}

impl RhsNode {
    pub fn new(children: Vec<Hash>) -> Self {
        Self {
            hash: hash_elems(&children),
            children,
        }
    }

    /// Whether `hash` is the hash of `children`.
    pub fn is_consistent(&self) -> bool {
        hash_elems(&self.children) == self.hash
    }

    fn is_leaf(&self) -> bool {
        self.children.len() == 3 && self.children[2] == LEAF_MARKER
    }
}

#[async_trait]
pub trait ReverseHashService: Send + Sync {
    async fn get_node(&self, hash: &Hash) -> Result<Option<RhsNode>, StatusError>;
    async fn save_nodes(&self, nodes: &[RhsNode]) -> Result<(), StatusError>;
}

#[derive(Default)]
pub struct InMemoryReverseHashService {
    nodes: DashMap<Hash, RhsNode>,
}

impl InMemoryReverseHashService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[async_trait]
impl ReverseHashService for InMemoryReverseHashService {
    async fn get_node(&self, hash: &Hash) -> Result<Option<RhsNode>, StatusError> {
        Ok(self.nodes.get(hash).map(|n| n.value().clone()))
    }

    async fn save_nodes(&self, nodes: &[RhsNode]) -> Result<(), StatusError> {
        for node in nodes {
            if !node.is_consistent() {
                return Err(StatusError::CorruptNode(to_hex(&node.hash)));
            }
            self.nodes.insert(node.hash, node.clone());
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct NodeResponse {
    node: RhsNode,
    status: String,
}

/// HTTP client for a reverse hash service at `base_url`.
///
/// `GET {base_url}/node/{hash}` fetches one node, `POST {base_url}/node`
/// stores a batch.
pub struct HttpReverseHashService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpReverseHashService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StatusError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StatusError::RevocationProofUnavailable(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn unavailable(e: reqwest::Error) -> StatusError {
    if e.is_timeout() {
        StatusError::RevocationProofUnavailable("reverse hash service timed out".into())
    } else {
        StatusError::RevocationProofUnavailable(e.to_string())
    }
}

#[async_trait]
impl ReverseHashService for HttpReverseHashService {
    async fn get_node(&self, hash: &Hash) -> Result<Option<RhsNode>, StatusError> {
        let url = format!("{}/node/{}", self.base_url, to_hex(hash));
        let response = self.client.get(&url).send().await.map_err(unavailable)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StatusError::RevocationProofUnavailable(format!(
                "GET {} returned {}",
                url,
                response.status()
            )));
        }

        let body: NodeResponse = response.json().await.map_err(unavailable)?;
        if body.status != "OK" {
            return Err(StatusError::RevocationProofUnavailable(format!(
                "GET {} returned status {}",
                url, body.status
            )));
        }
        if body.node.hash != *hash || !body.node.is_consistent() {
            return Err(StatusError::CorruptNode(to_hex(hash)));
        }
        Ok(Some(body.node))
    }

    async fn save_nodes(&self, nodes: &[RhsNode]) -> Result<(), StatusError> {
        let url = format!("{}/node", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(nodes)
            .send()
            .await
            .map_err(unavailable)?;
        if !response.status().is_success() {
            return Err(StatusError::RevocationProofUnavailable(format!(
                "POST {} returned {}",
                url,
                response.status()
            )));
        }
        tracing::debug!(count = nodes.len(), url = %url, "nodes published");
        Ok(())
    }
}

/// Fetch one node, bounded by `timeout`.
pub async fn fetch_node(
    rhs: &dyn ReverseHashService,
    hash: &Hash,
    timeout: Duration,
) -> Result<Option<RhsNode>, StatusError> {
    tokio::time::timeout(timeout, rhs.get_node(hash))
        .await
        .map_err(|_| {
            StatusError::RevocationProofUnavailable(format!(
                "node {} not returned within {:?}",
                to_hex(hash),
                timeout
            ))
        })?
}

/// Build a proof for `key` by walking the tree under `root` node by node.
pub async fn generate_proof(
    rhs: &dyn ReverseHashService,
    root: &Hash,
    key: &Hash,
    max_depth: usize,
    timeout: Duration,
) -> Result<Proof, StatusError> {
    let mut siblings = Vec::new();
    let mut at = *root;

    for depth in 0..max_depth {
        if at == ZERO_HASH {
            return Ok(Proof {
                existence: false,
                siblings,
                node_aux: None,
            });
        }
        let node = fetch_node(rhs, &at, timeout).await?.ok_or_else(|| {
            StatusError::RevocationProofUnavailable(format!("node {} not found", to_hex(&at)))
        })?;

        if node.is_leaf() {
            if node.children[0] == *key {
                return Ok(Proof {
                    existence: true,
                    siblings,
                    node_aux: None,
                });
            }
            return Ok(Proof {
                existence: false,
                siblings,
                node_aux: Some(NodeAux {
                    key: node.children[0],
                    value: node.children[1],
                }),
            });
        }

        if node.children.len() != 2 {
            return Err(StatusError::CorruptNode(format!(
                "node {} has {} children",
                to_hex(&at),
                node.children.len()
            )));
        }
        if key_bit(key, depth) {
            siblings.push(node.children[0]);
            at = node.children[1];
        } else {
            siblings.push(node.children[1]);
            at = node.children[0];
        }
    }

    Err(StatusError::RevocationProofUnavailable(format!(
        "path deeper than {} levels",
        max_depth
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_core::hash::{hash, key_from_u64};
    use sigil_storage::MerkleTreeStorage;
    use sigil_storage::MerkleTreeType;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn publish(rhs: &dyn ReverseHashService, keys: &[u64]) -> Hash {
        let mts = MerkleTreeStorage::in_memory(40).unwrap();
        mts.create_identity_trees("t").unwrap();
        let tree = mts.tree("t", MerkleTreeType::Revocations).unwrap();
        for k in keys {
            tree.add(&key_from_u64(*k), &ZERO_HASH).unwrap();
        }
        let nodes: Vec<RhsNode> = tree
            .nodes()
            .unwrap()
            .into_iter()
            .map(|(_, children)| RhsNode::new(children))
            .collect();
        rhs.save_nodes(&nodes).await.unwrap();
        tree.root().unwrap()
    }

    #[tokio::test]
    async fn test_walk_finds_revoked_nonce() {
        let rhs = InMemoryReverseHashService::new();
        let root = publish(&rhs, &[3, 10, 17]).await;

        let key = key_from_u64(10);
        let proof = generate_proof(&rhs, &root, &key, 40, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(proof.existence);
        assert!(proof.verify(&root, &key, &ZERO_HASH));
    }

    #[tokio::test]
    async fn test_walk_absent_nonce() {
        let rhs = InMemoryReverseHashService::new();
        let root = publish(&rhs, &[3, 10, 17]).await;

        for nonce in [0u64, 4, 11, 99] {
            let key = key_from_u64(nonce);
            let proof = generate_proof(&rhs, &root, &key, 40, Duration::from_secs(1))
                .await
                .unwrap();
            assert!(!proof.existence);
            assert!(proof.verify(&root, &key, &ZERO_HASH));
        }
    }

    #[tokio::test]
    async fn test_walk_empty_tree() {
        let rhs = InMemoryReverseHashService::new();
        let proof = generate_proof(&rhs, &ZERO_HASH, &key_from_u64(1), 40, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!proof.existence);
        assert!(proof.siblings.is_empty());
    }

    #[tokio::test]
    async fn test_walk_missing_node() {
        let rhs = InMemoryReverseHashService::new();
        let result =
            generate_proof(&rhs, &hash(b"unknown"), &key_from_u64(1), 40, Duration::from_secs(1))
                .await;
        assert!(matches!(result, Err(StatusError::RevocationProofUnavailable(_))));
    }

    #[tokio::test]
    async fn test_in_memory_rejects_inconsistent_node() {
        let rhs = InMemoryReverseHashService::new();
        let bad = RhsNode {
            hash: hash(b"x"),
            children: vec![ZERO_HASH, ZERO_HASH],
        };
        assert!(matches!(
            rhs.save_nodes(&[bad]).await,
            Err(StatusError::CorruptNode(_))
        ));
    }

    #[tokio::test]
    async fn test_http_get_node() {
        let server = MockServer::start().await;
        let node = RhsNode::new(vec![hash(b"l"), hash(b"r")]);
        Mock::given(method("GET"))
            .and(path(format!("/node/{}", to_hex(&node.hash))))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "node": node,
                "status": "OK"
            })))
            .mount(&server)
            .await;

        let rhs = HttpReverseHashService::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let fetched = rhs.get_node(&node.hash).await.unwrap();
        assert_eq!(fetched, Some(node));
    }

    #[tokio::test]
    async fn test_http_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let rhs = HttpReverseHashService::new(&server.uri(), Duration::from_secs(2)).unwrap();
        assert_eq!(rhs.get_node(&hash(b"n")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_http_rejects_forged_node() {
        let server = MockServer::start().await;
        let requested = hash(b"requested");
        let forged = RhsNode::new(vec![hash(b"l"), hash(b"r")]);
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "node": { "hash": to_hex(&requested), "children": forged.children.iter().map(to_hex).collect::<Vec<_>>() },
                "status": "OK"
            })))
            .mount(&server)
            .await;

        let rhs = HttpReverseHashService::new(&server.uri(), Duration::from_secs(2)).unwrap();
        assert!(matches!(
            rhs.get_node(&requested).await,
            Err(StatusError::CorruptNode(_))
        ));
    }

    #[tokio::test]
    async fn test_http_server_error_is_recoverable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let rhs = HttpReverseHashService::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let err = rhs.get_node(&hash(b"n")).await.unwrap_err();
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_http_save_nodes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/node"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let rhs = HttpReverseHashService::new(&format!("{}/", server.uri()), Duration::from_secs(2))
            .unwrap();
        rhs.save_nodes(&[RhsNode::new(vec![hash(b"a"), hash(b"b")])])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        // nothing listens on port 9 of localhost
        let rhs = HttpReverseHashService::new("http://127.0.0.1:9", Duration::from_millis(500))
            .unwrap();
        let err = rhs.get_node(&hash(b"n")).await.unwrap_err();
        assert!(matches!(err, StatusError::RevocationProofUnavailable(_)));
    }
}
