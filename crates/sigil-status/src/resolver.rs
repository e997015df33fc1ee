use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sigil_core::{CredentialStatus, Did, IssuerData, IssuerState, Proof};

use crate::error::StatusError;

/// Non-revocation answer: the issuer state the proof was built against and
/// the revocation tree proof for the credential's nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationStatus {
    pub issuer: IssuerState,
    pub mtp: Proof,
}

impl RevocationStatus {
    /// The nonce is present in the revocation tree.
    pub fn is_revoked(&self) -> bool {
        self.mtp.existence
    }
}

/// What a resolver knows about the credential besides its status descriptor.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub issuer: Did,
    /// Issuer data from the credential proof, used as a genesis hint.
    pub issuer_data: Option<IssuerData>,
}

#[async_trait]
pub trait CredentialStatusResolver: Send + Sync {
    async fn resolve(
        &self,
        status: &CredentialStatus,
        opts: &ResolveOptions,
    ) -> Result<RevocationStatus, StatusError>;
}
