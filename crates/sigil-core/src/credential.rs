use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::claim::Claim;
use crate::did::Did;
use crate::error::CoreError;
use crate::merkle::{IssuerState, Proof};

pub const W3C_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
pub const IDEN3_PROOFS_CONTEXT: &str =
    "https://schema.iden3.io/core/jsonld/iden3proofs.jsonld";
pub const VERIFIABLE_CREDENTIAL_TYPE: &str = "VerifiableCredential";
pub const JSON_SCHEMA_TYPE: &str = "JsonSchema2023";

/// Revocation status mechanisms a credential may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialStatusType {
    /// Status answered from the issuer's own revocation tree.
    SparseMerkleTreeProof,
    /// Status answered by a reverse hash service.
    Iden3ReverseSparseMerkleTreeProof,
    #[serde(rename = "Iden3commRevocationStatusV1.0")]
    Iden3commRevocationStatusV1,
}

impl CredentialStatusType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SparseMerkleTreeProof => "SparseMerkleTreeProof",
            Self::Iden3ReverseSparseMerkleTreeProof => "Iden3ReverseSparseMerkleTreeProof",
            Self::Iden3commRevocationStatusV1 => "Iden3commRevocationStatusV1.0",
        }
    }
}

impl fmt::Display for CredentialStatusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CredentialStatusType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SparseMerkleTreeProof" => Ok(Self::SparseMerkleTreeProof),
            "Iden3ReverseSparseMerkleTreeProof" => Ok(Self::Iden3ReverseSparseMerkleTreeProof),
            "Iden3commRevocationStatusV1.0" => Ok(Self::Iden3commRevocationStatusV1),
            other => Err(CoreError::ValidationError(format!(
                "unknown credential status type: {}",
                other
            ))),
        }
    }
}

/// Where and how a credential's revocation status is answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationOptions {
    #[serde(rename = "type")]
    pub status_type: CredentialStatusType,
    /// Resolver location, e.g. the RHS base URL.
    pub id: String,
}

/// Revocation status descriptor embedded in a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    pub id: String,
    #[serde(rename = "type")]
    pub status_type: CredentialStatusType,
    pub revocation_nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSchema {
    pub id: String,
    #[serde(rename = "type")]
    pub schema_type: String,
}

/// Issuer information attached to a proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerData {
    pub id: Did,
    pub state: IssuerState,
    /// Hex-encoded public key of the signing key.
    pub public_key: String,
    pub key_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BjjSignatureProof {
    pub issuer_data: IssuerData,
    /// Hex-encoded core claim.
    pub core_claim: String,
    /// Hex-encoded signature over the core claim hash.
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseMerkleTreeProof {
    pub issuer_data: IssuerData,
    pub core_claim: String,
    /// Inclusion of the core claim in `issuer_data.state.claims_tree_root`.
    pub mtp: Proof,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CredentialProof {
    #[serde(rename = "BJJSignature2021")]
    BjjSignature(BjjSignatureProof),
    #[serde(rename = "Iden3SparseMerkleTreeProof")]
    SparseMerkleTree(SparseMerkleTreeProof),
}

impl CredentialProof {
    pub fn issuer_data(&self) -> &IssuerData {
        match self {
            Self::BjjSignature(p) => &p.issuer_data,
            Self::SparseMerkleTree(p) => &p.issuer_data,
        }
    }

    pub fn core_claim(&self) -> Result<Claim, CoreError> {
        match self {
            Self::BjjSignature(p) => Claim::from_hex(&p.core_claim),
            Self::SparseMerkleTree(p) => Claim::from_hex(&p.core_claim),
        }
    }
}

/// A W3C verifiable credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct W3CCredential {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub id: String,
    #[serde(rename = "type")]
    pub credential_type: Vec<String>,
    pub issuance_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
    pub issuer: Did,
    pub credential_subject: serde_json::Map<String, serde_json::Value>,
    pub credential_schema: CredentialSchema,
    pub credential_status: CredentialStatus,
    #[serde(default)]
    pub proof: Vec<CredentialProof>,
}

impl W3CCredential {
    /// Generate a fresh `urn:uuid:` credential id.
    pub fn new_id() -> String {
        format!("urn:uuid:{}", uuid::Uuid::now_v7())
    }

    /// Whether the credential has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date.map_or(false, |exp| now > exp)
    }

    /// The credential subject's DID, if it carries one.
    pub fn subject_did(&self) -> Option<Did> {
        self.credential_subject
            .get("id")
            .and_then(|v| v.as_str())
            .and_then(|s| Did::parse(s).ok())
    }

    /// The most specific credential type (the last entry).
    pub fn primary_type(&self) -> Option<&str> {
        self.credential_type.last().map(String::as_str)
    }

    pub fn has_type(&self, t: &str) -> bool {
        self.credential_type.iter().any(|ct| ct == t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::{Blockchain, DidMethod, NetworkId};
    use crate::hash::{hash, ZERO_HASH};
    use chrono::Duration;

    fn did(seed: &[u8]) -> Did {
        Did::from_genesis_state(
            DidMethod::Iden3,
            Blockchain::Polygon,
            NetworkId::Mumbai,
            &hash(seed),
        )
        .unwrap()
    }

    fn sample(expiration: Option<DateTime<Utc>>) -> W3CCredential {
        let mut subject = serde_json::Map::new();
        subject.insert("id".into(), serde_json::Value::String(did(b"holder").to_string()));
        subject.insert("birthday".into(), serde_json::json!(19960424));
        W3CCredential {
            context: vec![W3C_CONTEXT.into(), IDEN3_PROOFS_CONTEXT.into()],
            id: W3CCredential::new_id(),
            credential_type: vec![VERIFIABLE_CREDENTIAL_TYPE.into(), "KYCAgeCredential".into()],
            issuance_date: Utc::now(),
            expiration_date: expiration,
            issuer: did(b"issuer"),
            credential_subject: subject,
            credential_schema: CredentialSchema {
                id: "https://example.com/kyc.json".into(),
                schema_type: JSON_SCHEMA_TYPE.into(),
            },
            credential_status: CredentialStatus {
                id: "https://rhs.example.com".into(),
                status_type: CredentialStatusType::Iden3ReverseSparseMerkleTreeProof,
                revocation_nonce: 7,
            },
            proof: vec![CredentialProof::BjjSignature(BjjSignatureProof {
                issuer_data: IssuerData {
                    id: did(b"issuer"),
                    state: IssuerState::new(hash(b"c"), ZERO_HASH, ZERO_HASH),
                    public_key: "00".into(),
                    key_type: "BJJ".into(),
                },
                core_claim: String::new(),
                signature: String::new(),
            })],
        }
    }

    #[test]
    fn test_new_id_is_urn_uuid() {
        let id = W3CCredential::new_id();
        assert!(id.starts_with("urn:uuid:"));
        assert_ne!(id, W3CCredential::new_id());
    }

    #[test]
    fn test_expiration() {
        let exp = Utc::now();
        let cred = sample(Some(exp));
        assert!(!cred.is_expired_at(exp - Duration::seconds(1)));
        assert!(!cred.is_expired_at(exp));
        assert!(cred.is_expired_at(exp + Duration::seconds(1)));
        assert!(!sample(None).is_expired_at(exp + Duration::days(10_000)));
    }

    #[test]
    fn test_subject_did() {
        let cred = sample(None);
        assert_eq!(cred.subject_did(), Some(did(b"holder")));
        assert_eq!(cred.primary_type(), Some("KYCAgeCredential"));
    }

    #[test]
    fn test_json_shape() {
        let cred = sample(None);
        let json = serde_json::to_value(&cred).unwrap();
        assert!(json.get("@context").is_some());
        assert!(json.get("expirationDate").is_none());
        assert_eq!(
            json["credentialStatus"]["type"],
            "Iden3ReverseSparseMerkleTreeProof"
        );
        assert_eq!(json["credentialStatus"]["revocationNonce"], 7);
        assert_eq!(json["proof"][0]["type"], "BJJSignature2021");
        assert!(json["proof"][0]["issuerData"]["state"]["claimsTreeRoot"].is_string());

        let back: W3CCredential = serde_json::from_value(json).unwrap();
        assert_eq!(back, cred);
    }

    #[test]
    fn test_status_type_names() {
        let json = serde_json::to_string(&CredentialStatusType::Iden3commRevocationStatusV1).unwrap();
        assert_eq!(json, "\"Iden3commRevocationStatusV1.0\"");
        for t in [
            CredentialStatusType::SparseMerkleTreeProof,
            CredentialStatusType::Iden3ReverseSparseMerkleTreeProof,
            CredentialStatusType::Iden3commRevocationStatusV1,
        ] {
            assert_eq!(t.as_str().parse::<CredentialStatusType>().unwrap(), t);
        }
    }
}
