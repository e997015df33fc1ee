//! Sigil Core: DIDs, hashing, Merkle proofs, claims and the credential
//! data model shared by every Sigil crate.

pub mod claim;
pub mod credential;
pub mod credential_state;
pub mod did;
pub mod error;
pub mod hash;
pub mod merkle;

pub use claim::Claim;
pub use credential::{
    BjjSignatureProof, CredentialProof, CredentialSchema, CredentialStatus, CredentialStatusType,
    IssuerData, RevocationOptions, SparseMerkleTreeProof, W3CCredential,
};
pub use credential_state::{CredentialEvent, CredentialState};
pub use did::{Blockchain, Did, DidMethod, IdentityId, NetworkId};
pub use error::CoreError;
pub use hash::{Hash, ZERO_HASH};
pub use merkle::{IssuerState, NodeAux, Proof};
