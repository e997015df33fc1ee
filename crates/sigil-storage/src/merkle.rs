//! Sparse Merkle trees with content-addressed nodes.
//!
//! Leaves sit at the shallowest level where their key path is unique; two
//! keys sharing every bit up to the maximum depth cannot coexist.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use sigil_core::hash::{serde_hash, Hash, LEAF_MARKER, ZERO_HASH};
use sigil_core::merkle::{key_bit, leaf_hash, middle_hash, NodeAux, Proof};

use crate::error::StorageError;

/// Depth used by Sigil identities.
pub const DEFAULT_MAX_DEPTH: usize = 40;
const MAX_SUPPORTED_DEPTH: usize = 256;

/// A stored tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Middle {
        #[serde(with = "serde_hash")]
        left: Hash,
        #[serde(with = "serde_hash")]
        right: Hash,
    },
    Leaf {
        #[serde(with = "serde_hash")]
        key: Hash,
        #[serde(with = "serde_hash")]
        value: Hash,
    },
}

impl Node {
    pub fn hash(&self) -> Hash {
        match self {
            Self::Middle { left, right } => middle_hash(left, right),
            Self::Leaf { key, value } => leaf_hash(key, value),
        }
    }

    /// Children as published to a reverse hash service.
    pub fn children(&self) -> Vec<Hash> {
        match self {
            Self::Middle { left, right } => vec![*left, *right],
            Self::Leaf { key, value } => vec![*key, *value, LEAF_MARKER],
        }
    }
}

/// Backing store for tree nodes and named roots.
pub trait MerkleNodeStore: Send + Sync {
    fn get_node(&self, hash: &Hash) -> Result<Option<Node>, StorageError>;
    fn put_node(&self, node: &Node) -> Result<Hash, StorageError>;
    fn get_root(&self, tree: &str) -> Result<Option<Hash>, StorageError>;
    fn set_root(&self, tree: &str, root: Hash) -> Result<(), StorageError>;
    fn delete_root(&self, tree: &str) -> Result<(), StorageError>;
}

#[derive(Default)]
pub struct InMemoryNodeStore {
    nodes: DashMap<Hash, Node>,
    roots: DashMap<String, Hash>,
}

impl InMemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MerkleNodeStore for InMemoryNodeStore {
    fn get_node(&self, hash: &Hash) -> Result<Option<Node>, StorageError> {
        Ok(self.nodes.get(hash).map(|n| n.value().clone()))
    }

    fn put_node(&self, node: &Node) -> Result<Hash, StorageError> {
        let hash = node.hash();
        self.nodes.insert(hash, node.clone());
        Ok(hash)
    }

    fn get_root(&self, tree: &str) -> Result<Option<Hash>, StorageError> {
        Ok(self.roots.get(tree).map(|r| *r.value()))
    }

    fn set_root(&self, tree: &str, root: Hash) -> Result<(), StorageError> {
        self.roots.insert(tree.to_string(), root);
        Ok(())
    }

    fn delete_root(&self, tree: &str) -> Result<(), StorageError> {
        self.roots.remove(tree);
        Ok(())
    }
}

/// Handle on one named tree. Mutations are not synchronized here; callers
/// serialize writers per identity.
#[derive(Clone)]
pub struct SparseMerkleTree {
    store: Arc<dyn MerkleNodeStore>,
    name: String,
    max_depth: usize,
}

impl SparseMerkleTree {
    pub fn new(
        store: Arc<dyn MerkleNodeStore>,
        name: impl Into<String>,
        max_depth: usize,
    ) -> Result<Self, StorageError> {
        if max_depth < 2 || max_depth > MAX_SUPPORTED_DEPTH {
            return Err(StorageError::InvalidDepth(max_depth));
        }
        Ok(Self {
            store,
            name: name.into(),
            max_depth,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn root(&self) -> Result<Hash, StorageError> {
        Ok(self.store.get_root(&self.name)?.unwrap_or(ZERO_HASH))
    }

    fn node(&self, hash: &Hash) -> Result<Node, StorageError> {
        self.store
            .get_node(hash)?
            .ok_or_else(|| StorageError::NotFound(format!("tree node {}", hex::encode(hash))))
    }

    /// Insert `(key, value)` and return the new root.
    pub fn add(&self, key: &Hash, value: &Hash) -> Result<Hash, StorageError> {
        let root = self.root()?;
        let new_root = self.add_at(key, value, root, 0)?;
        self.store.set_root(&self.name, new_root)?;
        tracing::debug!(
            tree = %self.name,
            root = %hex::encode(new_root),
            "leaf added"
        );
        Ok(new_root)
    }

    fn add_at(
        &self,
        key: &Hash,
        value: &Hash,
        at: Hash,
        depth: usize,
    ) -> Result<Hash, StorageError> {
        if depth >= self.max_depth {
            return Err(StorageError::ReachedMaxLevel);
        }
        if at == ZERO_HASH {
            return self.store.put_node(&Node::Leaf {
                key: *key,
                value: *value,
            });
        }
        match self.node(&at)? {
            Node::Leaf {
                key: old_key,
                value: old_value,
            } => {
                if old_key == *key {
                    return Err(StorageError::EntryIndexAlreadyExists);
                }
                self.push_leaf(key, value, &old_key, &old_value, depth)
            }
            Node::Middle { left, right } => {
                let node = if key_bit(key, depth) {
                    Node::Middle {
                        left,
                        right: self.add_at(key, value, right, depth + 1)?,
                    }
                } else {
                    Node::Middle {
                        left: self.add_at(key, value, left, depth + 1)?,
                        right,
                    }
                };
                self.store.put_node(&node)
            }
        }
    }

    fn push_leaf(
        &self,
        key: &Hash,
        value: &Hash,
        old_key: &Hash,
        old_value: &Hash,
        depth: usize,
    ) -> Result<Hash, StorageError> {
        if depth + 1 >= self.max_depth {
            return Err(StorageError::ReachedMaxLevel);
        }
        let new_bit = key_bit(key, depth);
        let node = if new_bit == key_bit(old_key, depth) {
            let child = self.push_leaf(key, value, old_key, old_value, depth + 1)?;
            if new_bit {
                Node::Middle {
                    left: ZERO_HASH,
                    right: child,
                }
            } else {
                Node::Middle {
                    left: child,
                    right: ZERO_HASH,
                }
            }
        } else {
            let new_leaf = self.store.put_node(&Node::Leaf {
                key: *key,
                value: *value,
            })?;
            let old_leaf = leaf_hash(old_key, old_value);
            if new_bit {
                Node::Middle {
                    left: old_leaf,
                    right: new_leaf,
                }
            } else {
                Node::Middle {
                    left: new_leaf,
                    right: old_leaf,
                }
            }
        };
        self.store.put_node(&node)
    }

    /// Value stored under `key`, if any.
    pub fn get(&self, key: &Hash) -> Result<Option<Hash>, StorageError> {
        let (_, value) = self.generate_proof(key)?;
        Ok(value)
    }

    /// Inclusion or exclusion proof for `key` against the current root.
    pub fn generate_proof(&self, key: &Hash) -> Result<(Proof, Option<Hash>), StorageError> {
        self.generate_proof_at(key, &self.root()?)
    }

    /// Proof for `key` against an earlier `root` of this tree.
    pub fn generate_proof_at(
        &self,
        key: &Hash,
        root: &Hash,
    ) -> Result<(Proof, Option<Hash>), StorageError> {
        let mut siblings = Vec::new();
        let mut at = *root;
        for depth in 0..self.max_depth {
            if at == ZERO_HASH {
                break;
            }
            match self.node(&at)? {
                Node::Leaf { key: k, value: v } => {
                    if k == *key {
                        let proof = Proof {
                            existence: true,
                            siblings,
                            node_aux: None,
                        };
                        return Ok((proof, Some(v)));
                    }
                    let proof = Proof {
                        existence: false,
                        siblings,
                        node_aux: Some(NodeAux { key: k, value: v }),
                    };
                    return Ok((proof, None));
                }
                Node::Middle { left, right } => {
                    if key_bit(key, depth) {
                        siblings.push(left);
                        at = right;
                    } else {
                        siblings.push(right);
                        at = left;
                    }
                }
            }
        }
        Ok((
            Proof {
                existence: false,
                siblings,
                node_aux: None,
            },
            None,
        ))
    }

    /// Remove `key`, restoring the shape the tree had without it.
    pub fn delete(&self, key: &Hash) -> Result<Hash, StorageError> {
        let root = self.root()?;
        let new_root = self.delete_at(key, root, 0)?;
        self.store.set_root(&self.name, new_root)?;
        tracing::debug!(tree = %self.name, "leaf deleted");
        Ok(new_root)
    }

    fn delete_at(&self, key: &Hash, at: Hash, depth: usize) -> Result<Hash, StorageError> {
        if at == ZERO_HASH {
            return Err(StorageError::KeyNotFound);
        }
        match self.node(&at)? {
            Node::Leaf { key: k, .. } => {
                if k == *key {
                    Ok(ZERO_HASH)
                } else {
                    Err(StorageError::KeyNotFound)
                }
            }
            Node::Middle { left, right } => {
                let (left, right) = if key_bit(key, depth) {
                    (left, self.delete_at(key, right, depth + 1)?)
                } else {
                    (self.delete_at(key, left, depth + 1)?, right)
                };
                // a lone leaf moves up to its parent's level
                let lone = match (left == ZERO_HASH, right == ZERO_HASH) {
                    (true, true) => return Ok(ZERO_HASH),
                    (true, false) => Some(right),
                    (false, true) => Some(left),
                    (false, false) => None,
                };
                if let Some(child) = lone {
                    if matches!(self.node(&child)?, Node::Leaf { .. }) {
                        return Ok(child);
                    }
                }
                self.store.put_node(&Node::Middle { left, right })
            }
        }
    }

    /// Every node reachable from the current root, as `(hash, children)`.
    pub fn nodes(&self) -> Result<Vec<(Hash, Vec<Hash>)>, StorageError> {
        let mut out = Vec::new();
        let mut pending = vec![self.root()?];
        while let Some(hash) = pending.pop() {
            if hash == ZERO_HASH {
                continue;
            }
            let node = self.node(&hash)?;
            if let Node::Middle { left, right } = &node {
                pending.push(*left);
                pending.push(*right);
            }
            out.push((hash, node.children()));
        }
        Ok(out)
    }
}

impl fmt::Debug for SparseMerkleTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseMerkleTree")
            .field("name", &self.name)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

/// The three trees every identity owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MerkleTreeType {
    Claims,
    Revocations,
    Roots,
}

impl MerkleTreeType {
    pub const ALL: [MerkleTreeType; 3] = [Self::Claims, Self::Revocations, Self::Roots];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claims => "claims",
            Self::Revocations => "revocations",
            Self::Roots => "roots",
        }
    }
}

/// Per-identity tree trio over a shared node store.
pub struct MerkleTreeStorage {
    store: Arc<dyn MerkleNodeStore>,
    max_depth: usize,
}

impl MerkleTreeStorage {
    pub fn new(store: Arc<dyn MerkleNodeStore>, max_depth: usize) -> Result<Self, StorageError> {
        if max_depth < 2 || max_depth > MAX_SUPPORTED_DEPTH {
            return Err(StorageError::InvalidDepth(max_depth));
        }
        Ok(Self { store, max_depth })
    }

    pub fn in_memory(max_depth: usize) -> Result<Self, StorageError> {
        Self::new(Arc::new(InMemoryNodeStore::new()), max_depth)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn tree_name(identifier: &str, tree_type: MerkleTreeType) -> String {
        format!("{}/{}", identifier, tree_type.as_str())
    }

    /// Create empty claims, revocation and roots trees for `identifier`.
    pub fn create_identity_trees(&self, identifier: &str) -> Result<(), StorageError> {
        if self
            .store
            .get_root(&Self::tree_name(identifier, MerkleTreeType::Claims))?
            .is_some()
        {
            return Err(StorageError::AlreadyExists(format!("trees for {}", identifier)));
        }
        for tree_type in MerkleTreeType::ALL {
            self.store
                .set_root(&Self::tree_name(identifier, tree_type), ZERO_HASH)?;
        }
        Ok(())
    }

    /// Move the trees of a temporary identifier to their final one.
    pub fn bind_identifier(&self, old: &str, new: &str) -> Result<(), StorageError> {
        if self
            .store
            .get_root(&Self::tree_name(new, MerkleTreeType::Claims))?
            .is_some()
        {
            return Err(StorageError::AlreadyExists(format!("trees for {}", new)));
        }
        for tree_type in MerkleTreeType::ALL {
            let old_name = Self::tree_name(old, tree_type);
            let root = self
                .store
                .get_root(&old_name)?
                .ok_or_else(|| StorageError::NotFound(format!("trees for {}", old)))?;
            self.store.set_root(&Self::tree_name(new, tree_type), root)?;
            self.store.delete_root(&old_name)?;
        }
        tracing::debug!(from = old, to = new, "identity trees bound");
        Ok(())
    }

    /// Drop the tree roots of `identifier`. Nodes stay in the store.
    pub fn remove_identity_trees(&self, identifier: &str) -> Result<(), StorageError> {
        for tree_type in MerkleTreeType::ALL {
            self.store
                .delete_root(&Self::tree_name(identifier, tree_type))?;
        }
        Ok(())
    }

    pub fn tree(
        &self,
        identifier: &str,
        tree_type: MerkleTreeType,
    ) -> Result<SparseMerkleTree, StorageError> {
        let name = Self::tree_name(identifier, tree_type);
        if self.store.get_root(&name)?.is_none() {
            return Err(StorageError::NotFound(format!(
                "{} tree for {}",
                tree_type.as_str(),
                identifier
            )));
        }
        SparseMerkleTree::new(Arc::clone(&self.store), name, self.max_depth)
    }

    /// Look up any node by hash, regardless of which tree owns it.
    pub fn node(&self, hash: &Hash) -> Result<Option<Node>, StorageError> {
        self.store.get_node(hash)
    }
}
