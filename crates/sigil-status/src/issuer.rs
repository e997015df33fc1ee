use async_trait::async_trait;
use std::sync::Arc;

use sigil_core::hash::key_from_u64;
use sigil_core::{CredentialStatus, IssuerState};
use sigil_storage::{DataStorage, MerkleTreeType};

use crate::error::StatusError;
use crate::resolver::{CredentialStatusResolver, ResolveOptions, RevocationStatus};

/// Answers from the issuer's own revocation tree in local storage.
pub struct IssuerResolver {
    storage: Arc<DataStorage>,
}

impl IssuerResolver {
    pub fn new(storage: Arc<DataStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl CredentialStatusResolver for IssuerResolver {
    async fn resolve(
        &self,
        status: &CredentialStatus,
        opts: &ResolveOptions,
    ) -> Result<RevocationStatus, StatusError> {
        let issuer = opts.issuer.to_string();
        if self.storage.identity.get_identity(&opts.issuer)?.is_none() {
            return Err(StatusError::IssuerNotFound(issuer));
        }

        let mt = &self.storage.mt;
        let claims = mt.tree(&issuer, MerkleTreeType::Claims)?;
        let revocations = mt.tree(&issuer, MerkleTreeType::Revocations)?;
        let roots = mt.tree(&issuer, MerkleTreeType::Roots)?;

        let (mtp, _) = revocations.generate_proof(&key_from_u64(status.revocation_nonce))?;
        let state = IssuerState::new(claims.root()?, revocations.root()?, roots.root()?);

        tracing::debug!(
            issuer = %issuer,
            nonce = status.revocation_nonce,
            revoked = mtp.existence,
            "issuer revocation status"
        );
        Ok(RevocationStatus { issuer: state, mtp })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_core::hash::{hash, ZERO_HASH};
    use sigil_core::{Blockchain, CredentialStatusType, Did, DidMethod, NetworkId};
    use sigil_crypto::{KeyId, KmsKeyType};
    use sigil_storage::{Identity, InMemoryStateStorage};

    fn setup() -> (Arc<DataStorage>, Did) {
        let storage = Arc::new(
            DataStorage::in_memory(40, Arc::new(InMemoryStateStorage::new())).unwrap(),
        );
        let state = IssuerState::new(hash(b"claims"), ZERO_HASH, ZERO_HASH);
        let did = Did::from_genesis_state(
            DidMethod::Iden3,
            Blockchain::Polygon,
            NetworkId::Mumbai,
            &state.value,
        )
        .unwrap();
        storage.mt.create_identity_trees(&did.to_string()).unwrap();
        storage
            .identity
            .save_identity(&Identity {
                did,
                state,
                is_state_genesis: true,
                is_state_published: false,
                auth_key: KeyId::new(KmsKeyType::BabyJubJub, &[1u8; 32]),
            })
            .unwrap();
        (storage, did)
    }

    fn status(nonce: u64) -> CredentialStatus {
        CredentialStatus {
            id: "https://issuer.example.com/status".into(),
            status_type: CredentialStatusType::SparseMerkleTreeProof,
            revocation_nonce: nonce,
        }
    }

    #[tokio::test]
    async fn test_not_revoked_then_revoked() {
        let (storage, did) = setup();
        let resolver = IssuerResolver::new(storage.clone());
        let opts = ResolveOptions {
            issuer: did,
            issuer_data: None,
        };

        let before = resolver.resolve(&status(5), &opts).await.unwrap();
        assert!(!before.is_revoked());

        storage
            .mt
            .tree(&did.to_string(), MerkleTreeType::Revocations)
            .unwrap()
            .add(&key_from_u64(5), &ZERO_HASH)
            .unwrap();

        let after = resolver.resolve(&status(5), &opts).await.unwrap();
        assert!(after.is_revoked());
        assert!(after.mtp.verify(
            &after.issuer.revocation_tree_root,
            &key_from_u64(5),
            &ZERO_HASH
        ));
        assert!(after.issuer.is_consistent());
    }

    #[tokio::test]
    async fn test_unknown_issuer() {
        let (storage, _) = setup();
        let resolver = IssuerResolver::new(storage);
        let stranger = Did::from_genesis_state(
            DidMethod::Iden3,
            Blockchain::Polygon,
            NetworkId::Mumbai,
            &hash(b"stranger"),
        )
        .unwrap();
        let result = resolver
            .resolve(
                &status(1),
                &ResolveOptions {
                    issuer: stranger,
                    issuer_data: None,
                },
            )
            .await;
        assert!(matches!(result, Err(StatusError::IssuerNotFound(_))));
    }
}
