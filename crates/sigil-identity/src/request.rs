use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sigil_core::{Blockchain, Did, DidMethod, NetworkId, RevocationOptions, W3CCredential};

/// Parameters of a new identity.
#[derive(Debug, Clone)]
pub struct CreateIdentityOptions {
    pub method: DidMethod,
    pub blockchain: Blockchain,
    pub network: NetworkId,
    /// Status descriptor placed in the identity's own auth credential.
    pub revocation_opts: RevocationOptions,
    /// Makes key generation, and therefore the DID, reproducible.
    pub seed: Option<Vec<u8>>,
}

/// A freshly created identity and its authentication credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedIdentity {
    pub did: Did,
    pub credential: W3CCredential,
}

/// What an issuer is asked to attest.
#[derive(Debug, Clone)]
pub struct CredentialRequest {
    /// Absolute http(s) URL of the JSON schema.
    pub credential_schema: String,
    pub credential_type: String,
    /// Subject attributes. `id` holds the subject DID.
    pub credential_subject: serde_json::Map<String, serde_json::Value>,
    pub expiration: Option<DateTime<Utc>>,
    pub revocation_opts: RevocationOptions,
}
