use serde::{Deserialize, Serialize};

use crate::hash::{hash_elems, serde_hash, serde_hashes, Hash, LEAF_MARKER, ZERO_HASH};

/// Bit of `key` selecting the child at `depth` (least significant bit first).
pub fn key_bit(key: &Hash, depth: usize) -> bool {
    (key[depth / 8] >> (depth % 8)) & 1 == 1
}

/// Hash of a middle node. Two empty children collapse to the empty hash.
pub fn middle_hash(left: &Hash, right: &Hash) -> Hash {
    if *left == ZERO_HASH && *right == ZERO_HASH {
        return ZERO_HASH;
    }
    hash_elems(&[*left, *right])
}

/// Hash of a leaf node holding `(key, value)`.
pub fn leaf_hash(key: &Hash, value: &Hash) -> Hash {
    hash_elems(&[*key, *value, LEAF_MARKER])
}

/// Leaf found at the end of a non-existence path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAux {
    #[serde(with = "serde_hash")]
    pub key: Hash,
    #[serde(with = "serde_hash")]
    pub value: Hash,
}

/// Inclusion or exclusion proof in a sparse Merkle tree.
///
/// `siblings` are ordered from the root downwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    pub existence: bool,
    #[serde(with = "serde_hashes")]
    pub siblings: Vec<Hash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_aux: Option<NodeAux>,
}

impl Proof {
    /// Proof of absence in an empty tree.
    pub fn empty() -> Self {
        Self {
            existence: false,
            siblings: Vec::new(),
            node_aux: None,
        }
    }

    /// Check the proof for `(key, value)` against `root`.
    ///
    /// For exclusion proofs `value` is ignored.
    pub fn verify(&self, root: &Hash, key: &Hash, value: &Hash) -> bool {
        let mut node = if self.existence {
            leaf_hash(key, value)
        } else {
            match &self.node_aux {
                Some(aux) => {
                    if aux.key == *key {
                        return false;
                    }
                    let diverges = (0..self.siblings.len())
                        .any(|d| key_bit(&aux.key, d) != key_bit(key, d));
                    if diverges {
                        return false;
                    }
                    leaf_hash(&aux.key, &aux.value)
                }
                None => ZERO_HASH,
            }
        };

        for (depth, sibling) in self.siblings.iter().enumerate().rev() {
            node = if key_bit(key, depth) {
                middle_hash(sibling, &node)
            } else {
                middle_hash(&node, sibling)
            };
        }

        node == *root
    }

    /// Depth at which the path ends.
    pub fn depth(&self) -> usize {
        self.siblings.len()
    }
}

/// Identity state: the three tree roots and their combined hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerState {
    #[serde(with = "serde_hash")]
    pub value: Hash,
    #[serde(with = "serde_hash")]
    pub claims_tree_root: Hash,
    #[serde(with = "serde_hash")]
    pub revocation_tree_root: Hash,
    #[serde(with = "serde_hash")]
    pub root_of_roots: Hash,
}

impl IssuerState {
    pub fn new(claims_tree_root: Hash, revocation_tree_root: Hash, root_of_roots: Hash) -> Self {
        Self {
            value: state_hash(&claims_tree_root, &revocation_tree_root, &root_of_roots),
            claims_tree_root,
            revocation_tree_root,
            root_of_roots,
        }
    }

    /// Whether `value` is consistent with the three roots.
    pub fn is_consistent(&self) -> bool {
        self.value
            == state_hash(
                &self.claims_tree_root,
                &self.revocation_tree_root,
                &self.root_of_roots,
            )
    }

    /// Children of the state node as published to a reverse hash service.
    pub fn children(&self) -> [Hash; 3] {
        [
            self.claims_tree_root,
            self.revocation_tree_root,
            self.root_of_roots,
        ]
    }
}

/// Combine the three tree roots into an identity state.
pub fn state_hash(claims: &Hash, revocation: &Hash, roots: &Hash) -> Hash {
    hash_elems(&[*claims, *revocation, *roots])
}
