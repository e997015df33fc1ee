//! Fixtures shared by the integration scenarios: a fully wired in-memory
//! issuer/holder setup with a local reverse hash service.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use sigil_core::{
    Blockchain, CredentialStatusType, Did, DidMethod, NetworkId, RevocationOptions,
};
use sigil_credentials::{CredentialWallet, StaticSchemaLoader};
use sigil_crypto::{BjjProvider, InMemoryPrivateKeyStore, Kms, KmsKeyType};
use sigil_identity::{CreateIdentityOptions, CredentialRequest, IdentityWallet};
use sigil_status::{
    CredentialStatusResolverRegistry, InMemoryReverseHashService, IssuerResolver, RhsResolver,
};
use sigil_storage::{DataStorage, InMemoryStateStorage, StateStorage, StorageError};

pub const KYC_SCHEMA_URL: &str =
    "https://raw.githubusercontent.com/iden3/claim-schema-vocab/main/schemas/json/KYCAgeCredential-v3.json";
pub const RHS_URL: &str = "https://rhs.example.com";

pub fn kyc_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "required": ["credentialSubject"],
        "properties": {
            "credentialSubject": {
                "type": "object",
                "required": ["id", "birthday", "documentType"],
                "properties": {
                    "id": {"type": "string"},
                    "birthday": {"type": "integer"},
                    "documentType": {"type": "integer"}
                }
            }
        }
    })
}

/// Everything a scenario needs, sharing one storage bundle.
pub struct Setup {
    pub storage: Arc<DataStorage>,
    pub states: Arc<InMemoryStateStorage>,
    pub rhs: Arc<InMemoryReverseHashService>,
    pub identity_wallet: IdentityWallet,
    pub credential_wallet: CredentialWallet,
}

impl Setup {
    pub fn new() -> Result<Self, StorageError> {
        let kms = Arc::new(Kms::new());
        kms.register_key_provider(
            KmsKeyType::BabyJubJub,
            Arc::new(BjjProvider::new(Arc::new(InMemoryPrivateKeyStore::new()))),
        );

        let states = Arc::new(InMemoryStateStorage::new());
        let dyn_states: Arc<dyn StateStorage> = states.clone();
        let storage = Arc::new(DataStorage::in_memory(40, dyn_states.clone())?);

        let rhs = Arc::new(InMemoryReverseHashService::new());
        let registry = Arc::new(CredentialStatusResolverRegistry::new());
        registry.register(
            CredentialStatusType::SparseMerkleTreeProof,
            Arc::new(IssuerResolver::new(storage.clone())),
        );
        registry.register(
            CredentialStatusType::Iden3ReverseSparseMerkleTreeProof,
            Arc::new(
                RhsResolver::new(dyn_states, std::time::Duration::from_secs(2))
                    .with_service(rhs.clone()),
            ),
        );

        let schemas = StaticSchemaLoader::new();
        schemas.insert(KYC_SCHEMA_URL, kyc_schema());

        Ok(Self {
            identity_wallet: IdentityWallet::new(kms, storage.clone(), Arc::new(schemas)),
            credential_wallet: CredentialWallet::new(storage.clone(), registry),
            storage,
            states,
            rhs,
        })
    }
}

pub fn revocation_opts(status_type: CredentialStatusType) -> RevocationOptions {
    RevocationOptions {
        status_type,
        id: RHS_URL.into(),
    }
}

pub fn identity_options(seed: Option<&str>) -> CreateIdentityOptions {
    CreateIdentityOptions {
        method: DidMethod::Iden3,
        blockchain: Blockchain::Polygon,
        network: NetworkId::Mumbai,
        revocation_opts: revocation_opts(CredentialStatusType::Iden3ReverseSparseMerkleTreeProof),
        seed: seed.map(|s| s.as_bytes().to_vec()),
    }
}

pub fn kyc_request(subject: &Did, status_type: CredentialStatusType) -> CredentialRequest {
    let mut s = Map::new();
    s.insert("id".into(), json!(subject.to_string()));
    s.insert("birthday".into(), json!(19960424));
    s.insert("documentType".into(), json!(99));
    CredentialRequest {
        credential_schema: KYC_SCHEMA_URL.into(),
        credential_type: "KYCAgeCredential".into(),
        credential_subject: s,
        expiration: Some(Utc::now() + Duration::days(365)),
        revocation_opts: revocation_opts(status_type),
    }
}
