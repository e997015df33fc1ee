use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

use sigil_core::claim::{auth_schema_hash, credential_schema_hash, subject_data_hash};
use sigil_core::credential::{
    IDEN3_PROOFS_CONTEXT, JSON_SCHEMA_TYPE, VERIFIABLE_CREDENTIAL_TYPE, W3C_CONTEXT,
};
use sigil_core::hash::{key_from_u64, Hash, ZERO_HASH};
use sigil_core::{
    BjjSignatureProof, Claim, CredentialProof, CredentialSchema, CredentialStatus, Did,
    IssuerData, IssuerState, SparseMerkleTreeProof, W3CCredential,
};
use sigil_credentials::{validate_subject, CredentialError, SchemaLoader};
use sigil_crypto::{KeyId, Kms, KmsKeyType};
use sigil_status::{ReverseHashService, RhsNode, StatusError};
use sigil_storage::{DataStorage, Identity, MerkleTreeType, Profile, StateTransition, StorageError};

use crate::error::IdentityError;
use crate::request::{CreateIdentityOptions, CreatedIdentity, CredentialRequest};

pub const AUTH_SCHEMA_URL: &str = "https://schema.iden3.io/core/json/auth.json";
pub const AUTH_BJJ_CREDENTIAL_TYPE: &str = "AuthBJJCredential";

/// Issuer-side wallet over a shared KMS and storage bundle.
pub struct IdentityWallet {
    kms: Arc<Kms>,
    storage: Arc<DataStorage>,
    schemas: Arc<dyn SchemaLoader>,
    /// One entry per DID this wallet has touched, kept for the wallet's
    /// lifetime. Entries of DIDs whose creation failed are dropped.
    locks: DashMap<Did, Arc<Mutex<()>>>,
    /// Serializes identity creation so an auth key is bound at most once.
    creating: Mutex<()>,
}

impl IdentityWallet {
    pub fn new(kms: Arc<Kms>, storage: Arc<DataStorage>, schemas: Arc<dyn SchemaLoader>) -> Self {
        Self {
            kms,
            storage,
            schemas,
            locks: DashMap::new(),
            creating: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &Arc<DataStorage> {
        &self.storage
    }

    /// Tree mutations for one identity are serialized through this lock.
    fn lock_for(&self, did: &Did) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(*did).or_default().value())
    }

    fn identity(&self, did: &Did) -> Result<Identity, IdentityError> {
        self.storage
            .identity
            .get_identity(did)?
            .ok_or_else(|| IdentityError::UnknownIssuer(did.to_string()))
    }

    /// Create an identity: auth key, genesis claims tree and DID.
    ///
    /// The same seed under the same method and network always yields the same
    /// DID; without a seed every call yields a new one.
    pub async fn create_identity(
        &self,
        opts: CreateIdentityOptions,
    ) -> Result<CreatedIdentity, IdentityError> {
        let key = match &opts.seed {
            Some(seed) => self.kms.create_key_from_seed(KmsKeyType::BabyJubJub, seed)?,
            None => self.kms.generate_key(KmsKeyType::BabyJubJub)?,
        };
        let public_key = self.kms.public_key(&key)?;
        let key_slot: Hash = public_key.as_slice().try_into().map_err(|_| {
            IdentityError::Configuration(format!(
                "auth key must be 32 bytes, got {}",
                public_key.len()
            ))
        })?;
        let auth_claim = Claim::new(auth_schema_hash()).with_index_data(key_slot, ZERO_HASH);

        // trees live under a temporary name until the DID is known
        let tmp = format!("tmp-{}", uuid::Uuid::now_v7());
        self.storage.mt.create_identity_trees(&tmp)?;
        let (did, state) = match self.genesis(&tmp, &auth_claim, &opts) {
            Ok(genesis) => genesis,
            Err(e) => {
                self.storage.mt.remove_identity_trees(&tmp)?;
                return Err(e);
            }
        };

        let _creating = self.creating.lock().await;
        let lock = self.lock_for(&did);
        let _guard = lock.lock().await;

        if self.storage.identity.get_identity(&did)?.is_some() {
            self.storage.mt.remove_identity_trees(&tmp)?;
            return Err(IdentityError::IdentityAlreadyExists(did.to_string()));
        }
        if let Some(owner) = self.storage.identity.find_by_auth_key(&key)? {
            self.storage.mt.remove_identity_trees(&tmp)?;
            self.locks.remove(&did);
            return Err(IdentityError::KeyAlreadyBound {
                key: key.to_string(),
                owner: owner.did.to_string(),
            });
        }

        let name = did.to_string();
        if let Err(e) = self.storage.mt.bind_identifier(&tmp, &name) {
            self.storage.mt.remove_identity_trees(&tmp)?;
            self.locks.remove(&did);
            return Err(e.into());
        }
        let persisted =
            self.persist_genesis(did, state, &key, &public_key, &auth_claim, &opts);
        let credential = match persisted {
            Ok(credential) => credential,
            Err(e) => {
                tracing::warn!(did = %did, error = %e, "identity not persisted, rolling back");
                self.storage.identity.delete_identity(&did)?;
                self.storage.mt.remove_identity_trees(&name)?;
                self.locks.remove(&did);
                return Err(e);
            }
        };

        tracing::info!(
            did = %did,
            key = %key,
            seeded = opts.seed.is_some(),
            "identity created"
        );
        Ok(CreatedIdentity { did, credential })
    }

    /// Save the identity record and its auth credential.
    fn persist_genesis(
        &self,
        did: Did,
        state: IssuerState,
        key: &KeyId,
        public_key: &[u8],
        auth_claim: &Claim,
        opts: &CreateIdentityOptions,
    ) -> Result<W3CCredential, IdentityError> {
        self.storage.identity.save_identity(&Identity {
            did,
            state,
            is_state_genesis: true,
            is_state_published: false,
            auth_key: key.clone(),
        })?;

        let (mtp, _) = self
            .storage
            .mt
            .tree(&did.to_string(), MerkleTreeType::Claims)?
            .generate_proof(&auth_claim.hi())?;

        let mut subject = Map::new();
        subject.insert("id".into(), json!(did.to_string()));
        subject.insert("type".into(), json!(AUTH_BJJ_CREDENTIAL_TYPE));
        subject.insert("publicKey".into(), json!(hex::encode(public_key)));

        let credential = W3CCredential {
            context: vec![W3C_CONTEXT.into(), IDEN3_PROOFS_CONTEXT.into()],
            id: W3CCredential::new_id(),
            credential_type: vec![
                VERIFIABLE_CREDENTIAL_TYPE.into(),
                AUTH_BJJ_CREDENTIAL_TYPE.into(),
            ],
            issuance_date: Utc::now(),
            expiration_date: None,
            issuer: did,
            credential_subject: subject,
            credential_schema: CredentialSchema {
                id: AUTH_SCHEMA_URL.into(),
                schema_type: JSON_SCHEMA_TYPE.into(),
            },
            credential_status: CredentialStatus {
                id: opts.revocation_opts.id.clone(),
                status_type: opts.revocation_opts.status_type,
                revocation_nonce: auth_claim.revocation_nonce,
            },
            proof: vec![CredentialProof::SparseMerkleTree(SparseMerkleTreeProof {
                issuer_data: issuer_data(did, state, key)?,
                core_claim: auth_claim.to_hex(),
                mtp,
            })],
        };
        self.storage.credential.save_credential(&credential)?;
        Ok(credential)
    }

    fn genesis(
        &self,
        identifier: &str,
        auth_claim: &Claim,
        opts: &CreateIdentityOptions,
    ) -> Result<(Did, IssuerState), IdentityError> {
        let mt = &self.storage.mt;
        let claims = mt.tree(identifier, MerkleTreeType::Claims)?;
        claims.add(&auth_claim.hi(), &auth_claim.hv())?;
        let state = IssuerState::new(
            claims.root()?,
            mt.tree(identifier, MerkleTreeType::Revocations)?.root()?,
            mt.tree(identifier, MerkleTreeType::Roots)?.root()?,
        );
        let did = Did::from_genesis_state(opts.method, opts.blockchain, opts.network, &state.value)?;
        Ok((did, state))
    }

    /// Issue a signed credential and commit its claim to the issuer's
    /// claims tree. Either both happen or neither does.
    pub async fn issue_credential(
        &self,
        issuer: &Did,
        request: CredentialRequest,
    ) -> Result<W3CCredential, IdentityError> {
        check_schema_url(&request.credential_schema)?;
        if request.credential_type.is_empty() {
            return Err(IdentityError::InvalidRequest("credential type is empty".into()));
        }
        let subject_id = request
            .credential_subject
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| IdentityError::InvalidRequest("credential subject has no id".into()))?;
        let subject = Did::parse(subject_id).map_err(|e| {
            IdentityError::InvalidRequest(format!("credential subject id: {}", e))
        })?;

        // whole seconds, as committed in the claim
        let expiration = match request.expiration {
            Some(exp) => {
                let exp = DateTime::from_timestamp(exp.timestamp(), 0).ok_or_else(|| {
                    IdentityError::InvalidRequest(format!("expiration out of range: {}", exp))
                })?;
                if exp <= Utc::now() {
                    return Err(IdentityError::ExpiredCredentialRequest(exp));
                }
                Some(exp)
            }
            None => None,
        };

        self.identity(issuer)?;

        let schema = self
            .schemas
            .load(&request.credential_schema)
            .await
            .map_err(schema_error)?;
        validate_subject(
            &request.credential_schema,
            &schema,
            &request.credential_subject,
        )
        .map_err(schema_error)?;

        let mut claim = Claim::new(credential_schema_hash(
            &request.credential_schema,
            &request.credential_type,
        ))
        .with_subject(subject.id)
        .with_revocation_nonce(revocation_nonce())
        .with_index_data(subject_data_hash(&request.credential_subject)?, ZERO_HASH);
        if let Some(exp) = expiration {
            claim = claim.with_expiration(exp.timestamp());
        }

        let lock = self.lock_for(issuer);
        let _guard = lock.lock().await;

        // read under the lock so the embedded state is the current one
        let identity = self.identity(issuer)?;
        let signature = self.kms.sign(&identity.auth_key, &claim.hash())?;

        let credential = W3CCredential {
            context: vec![W3C_CONTEXT.into(), IDEN3_PROOFS_CONTEXT.into()],
            id: W3CCredential::new_id(),
            credential_type: vec![
                VERIFIABLE_CREDENTIAL_TYPE.into(),
                request.credential_type.clone(),
            ],
            issuance_date: Utc::now(),
            expiration_date: expiration,
            issuer: *issuer,
            credential_subject: request.credential_subject,
            credential_schema: CredentialSchema {
                id: request.credential_schema,
                schema_type: JSON_SCHEMA_TYPE.into(),
            },
            credential_status: CredentialStatus {
                id: request.revocation_opts.id,
                status_type: request.revocation_opts.status_type,
                revocation_nonce: claim.revocation_nonce,
            },
            proof: vec![CredentialProof::BjjSignature(BjjSignatureProof {
                issuer_data: issuer_data(*issuer, identity.state, &identity.auth_key)?,
                core_claim: claim.to_hex(),
                signature: hex::encode(signature),
            })],
        };

        let claims = self
            .storage
            .mt
            .tree(&issuer.to_string(), MerkleTreeType::Claims)?;
        match claims.add(&claim.hi(), &claim.hv()) {
            Ok(_) => {}
            Err(StorageError::EntryIndexAlreadyExists) => {
                return Err(IdentityError::InvalidRequest(
                    "a claim with the same subject and data was already issued".into(),
                ));
            }
            Err(e) => return Err(e.into()),
        }
        if let Err(e) = self.storage.credential.save_credential(&credential) {
            tracing::warn!(issuer = %issuer, error = %e, "credential not persisted, rolling back claim");
            claims.delete(&claim.hi())?;
            return Err(e.into());
        }

        tracing::info!(
            issuer = %issuer,
            subject = %subject,
            id = %credential.id,
            credential_type = %request.credential_type,
            nonce = claim.revocation_nonce,
            "credential issued"
        );
        Ok(credential)
    }

    /// Add `nonce` to the issuer's revocation tree. Returns false if it was
    /// already revoked.
    pub async fn revoke(&self, issuer: &Did, nonce: u64) -> Result<bool, IdentityError> {
        self.identity(issuer)?;

        let lock = self.lock_for(issuer);
        let _guard = lock.lock().await;

        let revocations = self
            .storage
            .mt
            .tree(&issuer.to_string(), MerkleTreeType::Revocations)?;
        match revocations.add(&key_from_u64(nonce), &ZERO_HASH) {
            Ok(_) => {
                tracing::info!(issuer = %issuer, nonce, "revocation nonce added");
                Ok(true)
            }
            Err(StorageError::EntryIndexAlreadyExists) => {
                tracing::debug!(issuer = %issuer, nonce, "nonce already revoked");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn revoke_credential(
        &self,
        issuer: &Did,
        credential: &W3CCredential,
    ) -> Result<bool, IdentityError> {
        if credential.issuer != *issuer {
            return Err(IdentityError::InvalidRequest(format!(
                "credential {} was issued by {}",
                credential.id, credential.issuer
            )));
        }
        self.revoke(issuer, credential.credential_status.revocation_nonce)
            .await
    }

    /// Commit the current tree roots as the identity's new state.
    pub async fn publish_state(&self, issuer: &Did) -> Result<IssuerState, IdentityError> {
        let lock = self.lock_for(issuer);
        let _guard = lock.lock().await;

        let mut identity = self.identity(issuer)?;
        let mt = &self.storage.mt;
        let name = issuer.to_string();
        let claims_root = mt.tree(&name, MerkleTreeType::Claims)?.root()?;
        let roots = mt.tree(&name, MerkleTreeType::Roots)?;
        match roots.add(&claims_root, &ZERO_HASH) {
            Ok(_) | Err(StorageError::EntryIndexAlreadyExists) => {}
            Err(e) => return Err(e.into()),
        }
        let state = IssuerState::new(
            claims_root,
            mt.tree(&name, MerkleTreeType::Revocations)?.root()?,
            roots.root()?,
        );

        if identity.is_state_published && state == identity.state {
            tracing::debug!(issuer = %issuer, "state unchanged");
            return Ok(state);
        }

        self.storage
            .states
            .publish_state(&StateTransition {
                id: *issuer,
                old_state: identity.state.value,
                new_state: state.value,
                is_old_state_genesis: identity.is_state_genesis,
            })
            .await?;

        identity.state = state;
        identity.is_state_genesis = false;
        identity.is_state_published = true;
        self.storage.identity.save_identity(&identity)?;

        tracing::info!(
            issuer = %issuer,
            state = %sigil_core::hash::to_hex(&state.value),
            "state published"
        );
        Ok(state)
    }

    /// Push the identity's state node and its revocation and roots tree
    /// nodes to a reverse hash service. Returns the number of nodes sent.
    pub async fn publish_state_to_rhs(
        &self,
        issuer: &Did,
        rhs: &dyn ReverseHashService,
    ) -> Result<usize, IdentityError> {
        let lock = self.lock_for(issuer);
        let _guard = lock.lock().await;

        let identity = self.identity(issuer)?;
        let name = issuer.to_string();
        let mut nodes = vec![RhsNode::new(identity.state.children().to_vec())];
        for tree_type in [MerkleTreeType::Revocations, MerkleTreeType::Roots] {
            for (hash, children) in self.storage.mt.tree(&name, tree_type)?.nodes()? {
                let node = RhsNode { hash, children };
                if !node.is_consistent() {
                    return Err(StatusError::CorruptNode(sigil_core::hash::to_hex(&hash)).into());
                }
                nodes.push(node);
            }
        }

        rhs.save_nodes(&nodes).await?;
        tracing::info!(issuer = %issuer, nodes = nodes.len(), "state pushed to reverse hash service");
        Ok(nodes.len())
    }

    /// Derive and record a profile of `did` for `verifier`.
    pub async fn create_profile(
        &self,
        did: &Did,
        nonce: u64,
        verifier: &str,
    ) -> Result<Did, IdentityError> {
        if nonce == 0 {
            return Err(IdentityError::InvalidRequest(
                "profile nonce 0 is the genesis identity".into(),
            ));
        }
        self.identity(did)?;

        let id = did.profile(nonce);
        let profile = Profile {
            id,
            nonce,
            genesis_identifier: *did,
            verifier: verifier.to_string(),
        };
        match self.storage.identity.save_profile(&profile) {
            Ok(()) => {}
            Err(StorageError::AlreadyExists(_)) => {
                return Err(IdentityError::ProfileAlreadyExists(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(genesis = %did, profile = %id, nonce, verifier, "profile created");
        Ok(id)
    }
}

fn issuer_data(did: Did, state: IssuerState, key: &KeyId) -> Result<IssuerData, IdentityError> {
    Ok(IssuerData {
        id: did,
        state,
        public_key: hex::encode(key.public_key_bytes()?),
        key_type: key.key_type.to_string(),
    })
}

/// Parse `url` as an absolute http(s) URL with a host.
pub fn parse_http_url(url: &str) -> Result<reqwest::Url, String> {
    let parsed = reqwest::Url::parse(url).map_err(|e| e.to_string())?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err("not an absolute http(s) URL".into());
    }
    Ok(parsed)
}

/// The schema URL check applied on issuance.
pub fn check_schema_url(url: &str) -> Result<(), IdentityError> {
    parse_http_url(url)
        .map(|_| ())
        .map_err(|e| IdentityError::Configuration(format!("schema URL {}: {}", url, e)))
}

/// Schema problems other than a subject mismatch are configuration errors.
fn schema_error(e: CredentialError) -> IdentityError {
    match e {
        CredentialError::SchemaViolation { .. } => IdentityError::InvalidRequest(e.to_string()),
        CredentialError::SchemaUnavailable { .. } | CredentialError::InvalidSchema { .. } => {
            IdentityError::Configuration(e.to_string())
        }
        other => other.into(),
    }
}

fn revocation_nonce() -> u64 {
    loop {
        let nonce = rand::random::<u64>();
        if nonce != 0 {
            return nonce;
        }
    }
}
