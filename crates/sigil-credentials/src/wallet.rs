use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

use sigil_core::claim::{auth_schema_hash, credential_schema_hash, subject_data_hash};
use sigil_core::{
    Claim, CredentialEvent, CredentialProof, CredentialState, Did, W3CCredential,
};
use sigil_crypto::{verify_signature, KmsKeyType};
use sigil_status::{CredentialStatusResolverRegistry, ResolveOptions, RevocationStatus};
use sigil_storage::DataStorage;

use crate::error::CredentialError;

/// Why a credential failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationFailure {
    InvalidProof,
    Expired,
    Revoked,
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidProof => write!(f, "invalid proof"),
            Self::Expired => write!(f, "expired"),
            Self::Revoked => write!(f, "revoked"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub valid: bool,
    pub reason: Option<VerificationFailure>,
    pub detail: Option<String>,
}

impl VerificationOutcome {
    fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
            detail: None,
        }
    }

    fn failed(reason: VerificationFailure, detail: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
            detail: Some(detail.into()),
        }
    }
}

/// Holder-side credential store.
///
/// Stored credentials move through the lifecycle
/// `Issued -> Active -> {Revoked, Expired}` as verification observes them.
pub struct CredentialWallet {
    storage: Arc<DataStorage>,
    resolvers: Arc<CredentialStatusResolverRegistry>,
    states: DashMap<String, CredentialState>,
}

impl CredentialWallet {
    pub fn new(
        storage: Arc<DataStorage>,
        resolvers: Arc<CredentialStatusResolverRegistry>,
    ) -> Self {
        Self {
            storage,
            resolvers,
            states: DashMap::new(),
        }
    }

    /// Store a credential. Storing the same credential again is a no-op.
    pub fn store(&self, credential: &W3CCredential) -> Result<(), CredentialError> {
        let inserted = self.storage.credential.save_credential(credential)?;

        self.states.entry(credential.id.clone()).or_insert_with(|| {
            CredentialState::Issued
                .apply(CredentialEvent::Activate)
                .unwrap_or(CredentialState::Issued)
        });

        if inserted {
            tracing::info!(
                id = %credential.id,
                issuer = %credential.issuer,
                "credential stored"
            );
        } else {
            tracing::debug!(id = %credential.id, "credential already stored");
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<W3CCredential, CredentialError> {
        self.storage
            .credential
            .get_credential_by_id(id)?
            .ok_or_else(|| CredentialError::NotFound(id.to_string()))
    }

    pub fn list(&self) -> Result<Vec<W3CCredential>, CredentialError> {
        Ok(self.storage.credential.list_credentials()?)
    }

    pub fn find_by_subject(&self, subject: &Did) -> Result<Vec<W3CCredential>, CredentialError> {
        Ok(self.storage.credential.find_by_subject(subject)?)
    }

    /// Lifecycle state of a stored credential.
    pub fn state(&self, id: &str) -> Option<CredentialState> {
        self.states.get(id).map(|s| *s.value())
    }

    /// Ask the resolver registered for the credential's status type.
    pub async fn get_revocation_status(
        &self,
        credential: &W3CCredential,
    ) -> Result<RevocationStatus, CredentialError> {
        let opts = ResolveOptions {
            issuer: credential.issuer,
            issuer_data: credential.proof.first().map(|p| p.issuer_data().clone()),
        };
        Ok(self
            .resolvers
            .resolve(&credential.credential_status, &opts)
            .await?)
    }

    pub async fn verify(
        &self,
        credential: &W3CCredential,
    ) -> Result<VerificationOutcome, CredentialError> {
        self.verify_at(credential, Utc::now()).await
    }

    /// Verify proofs, then expiration, then revocation status.
    ///
    /// An expired credential is reported without contacting any resolver.
    pub async fn verify_at(
        &self,
        credential: &W3CCredential,
        now: DateTime<Utc>,
    ) -> Result<VerificationOutcome, CredentialError> {
        if let Err(detail) = check_proofs(credential) {
            tracing::warn!(id = %credential.id, %detail, "credential proof rejected");
            return Ok(VerificationOutcome::failed(
                VerificationFailure::InvalidProof,
                detail,
            ));
        }

        if credential.is_expired_at(now) {
            self.advance(&credential.id, CredentialEvent::Expire);
            return Ok(VerificationOutcome::failed(
                VerificationFailure::Expired,
                format!(
                    "expired at {}",
                    credential
                        .expiration_date
                        .map(|d| d.to_rfc3339())
                        .unwrap_or_default()
                ),
            ));
        }

        let status = self.get_revocation_status(credential).await?;
        if status.is_revoked() {
            self.advance(&credential.id, CredentialEvent::Revoke);
            return Ok(VerificationOutcome::failed(
                VerificationFailure::Revoked,
                format!(
                    "revocation nonce {} is revoked",
                    credential.credential_status.revocation_nonce
                ),
            ));
        }

        tracing::debug!(id = %credential.id, "credential verified");
        Ok(VerificationOutcome::valid())
    }

    fn advance(&self, id: &str, event: CredentialEvent) {
        let Some(mut state) = self.states.get_mut(id) else {
            return;
        };
        let current = *state;
        if !current.accepts(event) {
            tracing::debug!(id, state = %current, ?event, "credential state unchanged");
            return;
        }
        if let Ok(next) = current.apply(event) {
            *state = next;
            if next.is_final() {
                tracing::info!(id, from = %current, to = %next, "credential retired");
            } else {
                tracing::info!(id, from = %current, to = %next, "credential state changed");
            }
        }
    }
}

fn check_proofs(credential: &W3CCredential) -> Result<(), String> {
    if credential.proof.is_empty() {
        return Err("credential carries no proof".into());
    }
    for proof in &credential.proof {
        let claim = proof.core_claim().map_err(|e| e.to_string())?;
        check_claim_binding(credential, &claim)?;

        let data = proof.issuer_data();
        if data.id != credential.issuer {
            return Err(format!("proof issued by {}, not {}", data.id, credential.issuer));
        }
        if !data.state.is_consistent() {
            return Err("issuer state does not hash to its roots".into());
        }

        match proof {
            CredentialProof::BjjSignature(p) => {
                let key_type: KmsKeyType = data.key_type.parse().map_err(|e| format!("{}", e))?;
                let public_key = hex::decode(&data.public_key).map_err(|e| e.to_string())?;
                let signature = hex::decode(&p.signature).map_err(|e| e.to_string())?;
                let ok = verify_signature(key_type, &public_key, &claim.hash(), &signature)
                    .map_err(|e| e.to_string())?;
                if !ok {
                    return Err("signature does not match the core claim".into());
                }
            }
            CredentialProof::SparseMerkleTree(p) => {
                if !p.mtp.existence
                    || !p.mtp.verify(&data.state.claims_tree_root, &claim.hi(), &claim.hv())
                {
                    return Err("claim is not in the issuer's claims tree".into());
                }
            }
        }
    }
    Ok(())
}

/// The core claim must commit to what the credential document says.
fn check_claim_binding(credential: &W3CCredential, claim: &Claim) -> Result<(), String> {
    if claim.revocation_nonce != credential.credential_status.revocation_nonce {
        return Err("revocation nonce differs from the core claim".into());
    }
    if claim.expiration != credential.expiration_date.map(|d| d.timestamp()) {
        return Err("expiration differs from the core claim".into());
    }

    match (claim.subject, credential.subject_did()) {
        (Some(id), Some(did)) if id == did.id => {}
        (None, None) => {}
        (None, Some(did)) if did == credential.issuer => {}
        _ => return Err("subject differs from the core claim".into()),
    }

    if claim.schema_hash == auth_schema_hash() {
        let bound = hex::encode(claim.index_data[0]);
        return match credential.credential_subject.get("publicKey").and_then(|v| v.as_str()) {
            Some(pk) if pk == bound => Ok(()),
            _ => Err("auth credential key differs from the core claim".into()),
        };
    }

    let credential_type = credential
        .primary_type()
        .ok_or_else(|| "credential has no type".to_string())?;
    if claim.schema_hash != credential_schema_hash(&credential.credential_schema.id, credential_type)
    {
        return Err("schema differs from the core claim".into());
    }
    let data = subject_data_hash(&credential.credential_subject).map_err(|e| e.to_string())?;
    if claim.index_data[0] != data {
        return Err("subject attributes differ from the core claim".into());
    }
    Ok(())
}
