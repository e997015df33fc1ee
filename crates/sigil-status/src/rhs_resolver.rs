use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use sigil_core::hash::{key_from_u64, to_hex};
use sigil_core::{CredentialStatus, IssuerState, Proof};
use sigil_storage::{StateStorage, StorageError, DEFAULT_MAX_DEPTH};

use crate::error::StatusError;
use crate::resolver::{CredentialStatusResolver, ResolveOptions, RevocationStatus};
use crate::rhs::{fetch_node, generate_proof, HttpReverseHashService, ReverseHashService};

/// Answers from a reverse hash service, anchored on the issuer's published
/// state.
///
/// The service location comes from the credential status `id` unless a
/// service was injected with [`RhsResolver::with_service`].
pub struct RhsResolver {
    states: Arc<dyn StateStorage>,
    service: Option<Arc<dyn ReverseHashService>>,
    timeout: Duration,
    max_depth: usize,
}

impl RhsResolver {
    pub fn new(states: Arc<dyn StateStorage>, timeout: Duration) -> Self {
        Self {
            states,
            service: None,
            timeout,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_service(mut self, service: Arc<dyn ReverseHashService>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn service_for(
        &self,
        status: &CredentialStatus,
    ) -> Result<Arc<dyn ReverseHashService>, StatusError> {
        match &self.service {
            Some(service) => Ok(Arc::clone(service)),
            None => Ok(Arc::new(HttpReverseHashService::new(
                &status.id,
                self.timeout,
            )?)),
        }
    }

    async fn published_state(
        &self,
        opts: &ResolveOptions,
    ) -> Result<Option<sigil_core::Hash>, StatusError> {
        let lookup = tokio::time::timeout(
            self.timeout,
            self.states.get_latest_state_by_id(&opts.issuer),
        )
        .await
        .map_err(|_| {
            StatusError::RevocationProofUnavailable(format!(
                "state of {} not returned within {:?}",
                opts.issuer, self.timeout
            ))
        })?;

        match lookup {
            Ok(info) => Ok(Some(info.state)),
            Err(StorageError::StateNotFound(_)) => Ok(None),
            Err(e) if e.is_recoverable() => {
                Err(StatusError::RevocationProofUnavailable(e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CredentialStatusResolver for RhsResolver {
    async fn resolve(
        &self,
        status: &CredentialStatus,
        opts: &ResolveOptions,
    ) -> Result<RevocationStatus, StatusError> {
        let state = match self.published_state(opts).await? {
            Some(state) => state,
            None => {
                // an unpublished identity still at genesis has an empty revocation tree
                if let Some(data) = &opts.issuer_data {
                    if data.id == opts.issuer && opts.issuer.is_genesis_state(&data.state.value) {
                        tracing::debug!(issuer = %opts.issuer, "issuer at genesis state");
                        return Ok(RevocationStatus {
                            issuer: data.state,
                            mtp: Proof::empty(),
                        });
                    }
                }
                return Err(StatusError::StateNotFound(opts.issuer.to_string()));
            }
        };

        let service = self.service_for(status)?;
        let state_node = fetch_node(service.as_ref(), &state, self.timeout)
            .await?
            .ok_or_else(|| {
                StatusError::RevocationProofUnavailable(format!(
                    "state {} not published to the reverse hash service",
                    to_hex(&state)
                ))
            })?;
        if state_node.children.len() != 3 {
            return Err(StatusError::CorruptNode(format!(
                "state node {} has {} children",
                to_hex(&state),
                state_node.children.len()
            )));
        }
        let issuer = IssuerState {
            value: state,
            claims_tree_root: state_node.children[0],
            revocation_tree_root: state_node.children[1],
            root_of_roots: state_node.children[2],
        };

        let mtp = generate_proof(
            service.as_ref(),
            &issuer.revocation_tree_root,
            &key_from_u64(status.revocation_nonce),
            self.max_depth,
            self.timeout,
        )
        .await?;

        tracing::debug!(
            issuer = %opts.issuer,
            nonce = status.revocation_nonce,
            revoked = mtp.existence,
            "reverse hash service revocation status"
        );
        Ok(RevocationStatus { issuer, mtp })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhs::{InMemoryReverseHashService, RhsNode};
    use sigil_core::hash::{hash, ZERO_HASH};
    use sigil_core::{
        Blockchain, CredentialStatusType, Did, DidMethod, IssuerData, NetworkId,
    };
    use sigil_storage::{InMemoryStateStorage, StateInfo, StateTransition};

    fn status(nonce: u64, id: &str) -> CredentialStatus {
        CredentialStatus {
            id: id.into(),
            status_type: CredentialStatusType::Iden3ReverseSparseMerkleTreeProof,
            revocation_nonce: nonce,
        }
    }

    fn genesis() -> (IssuerState, Did) {
        let state = IssuerState::new(hash(b"claims"), ZERO_HASH, ZERO_HASH);
        let did = Did::from_genesis_state(
            DidMethod::Iden3,
            Blockchain::Polygon,
            NetworkId::Amoy,
            &state.value,
        )
        .unwrap();
        (state, did)
    }

    fn issuer_data(did: Did, state: IssuerState) -> IssuerData {
        IssuerData {
            id: did,
            state,
            public_key: String::new(),
            key_type: "BJJ".into(),
        }
    }

    #[tokio::test]
    async fn test_genesis_issuer_without_rhs_call() {
        let (state, did) = genesis();
        let resolver = RhsResolver::new(
            Arc::new(InMemoryStateStorage::new()),
            Duration::from_secs(1),
        );
        // unreachable service: genesis shortcut must not touch it
        let result = resolver
            .resolve(
                &status(3, "http://127.0.0.1:9"),
                &ResolveOptions {
                    issuer: did,
                    issuer_data: Some(issuer_data(did, state)),
                },
            )
            .await
            .unwrap();
        assert!(!result.is_revoked());
        assert_eq!(result.issuer, state);
    }

    #[tokio::test]
    async fn test_unpublished_without_hint() {
        let (_, did) = genesis();
        let resolver = RhsResolver::new(
            Arc::new(InMemoryStateStorage::new()),
            Duration::from_secs(1),
        );
        let err = resolver
            .resolve(
                &status(3, "http://127.0.0.1:9"),
                &ResolveOptions {
                    issuer: did,
                    issuer_data: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StatusError::StateNotFound(_)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_published_state_missing_on_rhs() {
        let (genesis_state, did) = genesis();
        let states = Arc::new(InMemoryStateStorage::new());
        states
            .publish_state(&StateTransition {
                id: did,
                old_state: genesis_state.value,
                new_state: hash(b"s1"),
                is_old_state_genesis: true,
            })
            .await
            .unwrap();

        let resolver = RhsResolver::new(states, Duration::from_secs(1))
            .with_service(Arc::new(InMemoryReverseHashService::new()));
        let err = resolver
            .resolve(
                &status(3, "unused"),
                &ResolveOptions {
                    issuer: did,
                    issuer_data: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StatusError::RevocationProofUnavailable(_)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_published_revocation_observed() {
        let (genesis_state, did) = genesis();
        let rhs = Arc::new(InMemoryReverseHashService::new());

        // revocation tree containing nonce 3 as a single leaf
        let leaf = RhsNode::new(vec![
            key_from_u64(3),
            ZERO_HASH,
            sigil_core::hash::LEAF_MARKER,
        ]);
        let published = IssuerState::new(hash(b"claims"), leaf.hash, ZERO_HASH);
        let state_node = RhsNode::new(published.children().to_vec());
        assert_eq!(state_node.hash, published.value);
        rhs.save_nodes(&[leaf, state_node]).await.unwrap();

        let states = Arc::new(InMemoryStateStorage::new());
        states
            .publish_state(&StateTransition {
                id: did,
                old_state: genesis_state.value,
                new_state: published.value,
                is_old_state_genesis: true,
            })
            .await
            .unwrap();
        assert_eq!(
            states.get_latest_state_by_id(&did).await.unwrap(),
            StateInfo {
                id: did,
                state: published.value
            }
        );

        let resolver = RhsResolver::new(states, Duration::from_secs(1)).with_service(rhs);
        let opts = ResolveOptions {
            issuer: did,
            issuer_data: None,
        };
        let revoked = resolver.resolve(&status(3, "unused"), &opts).await.unwrap();
        assert!(revoked.is_revoked());
        assert_eq!(revoked.issuer, published);

        let fine = resolver.resolve(&status(4, "unused"), &opts).await.unwrap();
        assert!(!fine.is_revoked());
    }
}
