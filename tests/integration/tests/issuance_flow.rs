//! Integration test: identity creation and credential issuance end to end.
//!
//! Exercises the identity wallet, the storage trees and the credential wallet
//! together: genesis, issuance, holder storage and verification.

use chrono::{Duration, Utc};
use serde_json::json;

use sigil_core::{CredentialProof, CredentialState, CredentialStatusType};
use sigil_credentials::VerificationFailure;
use sigil_identity::{IdentityError, AUTH_BJJ_CREDENTIAL_TYPE};
use sigil_integration_tests::{identity_options, kyc_request, Setup};
use sigil_storage::MerkleTreeType;

// ============================================================================
// Genesis
// ============================================================================

#[tokio::test]
async fn test_genesis_auth_claim_is_in_claims_tree() {
    let setup = Setup::new().unwrap();
    let created = setup
        .identity_wallet
        .create_identity(identity_options(None))
        .await
        .unwrap();

    assert!(created.credential.has_type(AUTH_BJJ_CREDENTIAL_TYPE));
    let proof = &created.credential.proof[0];
    assert!(matches!(proof, CredentialProof::SparseMerkleTree(_)));

    let claim = proof.core_claim().unwrap();
    let claims = setup
        .storage
        .mt
        .tree(&created.did.to_string(), MerkleTreeType::Claims)
        .unwrap();
    assert_eq!(claims.get(&claim.hi()).unwrap(), Some(claim.hv()));
    assert_eq!(claims.root().unwrap(), proof.issuer_data().state.claims_tree_root);

    let identity = setup
        .storage
        .identity
        .get_identity(&created.did)
        .unwrap()
        .unwrap();
    assert!(identity.is_state_genesis);
    assert!(!identity.is_state_published);
    assert!(created.did.is_genesis_state(&identity.state.value));
}

#[tokio::test]
async fn test_seeded_identities_are_deterministic() {
    let a = Setup::new().unwrap();
    let b = Setup::new().unwrap();

    let first = a
        .identity_wallet
        .create_identity(identity_options(Some("seed-one")))
        .await
        .unwrap();
    let again = b
        .identity_wallet
        .create_identity(identity_options(Some("seed-one")))
        .await
        .unwrap();
    assert_eq!(first.did, again.did);

    // same seed in the same storage is a duplicate
    let dup = a
        .identity_wallet
        .create_identity(identity_options(Some("seed-one")))
        .await;
    assert!(matches!(dup, Err(IdentityError::IdentityAlreadyExists(_))));

    let x = a
        .identity_wallet
        .create_identity(identity_options(None))
        .await
        .unwrap();
    let y = a
        .identity_wallet
        .create_identity(identity_options(None))
        .await
        .unwrap();
    assert_ne!(x.did, y.did);
    assert_ne!(x.did, first.did);
}

// ============================================================================
// Issuance
// ============================================================================

#[tokio::test]
async fn test_issue_store_and_verify() {
    let setup = Setup::new().unwrap();
    let issuer = setup
        .identity_wallet
        .create_identity(identity_options(Some("issuer")))
        .await
        .unwrap();
    let holder = setup
        .identity_wallet
        .create_identity(identity_options(None))
        .await
        .unwrap();

    let credential = setup
        .identity_wallet
        .issue_credential(
            &issuer.did,
            kyc_request(&holder.did, CredentialStatusType::SparseMerkleTreeProof),
        )
        .await
        .unwrap();
    assert_eq!(credential.issuer, issuer.did);
    assert_eq!(credential.subject_did(), Some(holder.did));
    assert_eq!(credential.credential_subject["birthday"], json!(19960424));
    assert_ne!(credential.credential_status.revocation_nonce, 0);

    // the claim is committed to the issuer's claims tree
    let claim = credential.proof[0].core_claim().unwrap();
    let claims = setup
        .storage
        .mt
        .tree(&issuer.did.to_string(), MerkleTreeType::Claims)
        .unwrap();
    assert_eq!(claims.get(&claim.hi()).unwrap(), Some(claim.hv()));

    setup.credential_wallet.store(&credential).unwrap();
    setup.credential_wallet.store(&credential).unwrap();
    assert_eq!(
        setup.credential_wallet.find_by_subject(&holder.did).unwrap().len(),
        1
    );
    assert_eq!(
        setup.credential_wallet.state(&credential.id),
        Some(CredentialState::Active)
    );

    let outcome = setup.credential_wallet.verify(&credential).await.unwrap();
    assert!(outcome.valid, "{:?}", outcome.detail);
}

#[tokio::test]
async fn test_unknown_issuer_leaves_no_trace() {
    let setup = Setup::new().unwrap();
    let holder = setup
        .identity_wallet
        .create_identity(identity_options(None))
        .await
        .unwrap();
    let stranger = setup
        .identity_wallet
        .create_identity(identity_options(None))
        .await
        .unwrap()
        .did
        .profile(7);

    let before = setup.credential_wallet.list().unwrap().len();
    let result = setup
        .identity_wallet
        .issue_credential(
            &stranger,
            kyc_request(&holder.did, CredentialStatusType::SparseMerkleTreeProof),
        )
        .await;
    assert!(matches!(result, Err(IdentityError::UnknownIssuer(_))));
    assert_eq!(setup.credential_wallet.list().unwrap().len(), before);
}

#[tokio::test]
async fn test_expiration_boundary() {
    let setup = Setup::new().unwrap();
    let issuer = setup
        .identity_wallet
        .create_identity(identity_options(None))
        .await
        .unwrap();
    let holder = setup
        .identity_wallet
        .create_identity(identity_options(None))
        .await
        .unwrap();

    let mut request = kyc_request(&holder.did, CredentialStatusType::SparseMerkleTreeProof);
    request.expiration = Some(Utc::now() + Duration::hours(1));
    let credential = setup
        .identity_wallet
        .issue_credential(&issuer.did, request)
        .await
        .unwrap();
    setup.credential_wallet.store(&credential).unwrap();

    let expires = credential.expiration_date.unwrap();
    let early = setup
        .credential_wallet
        .verify_at(&credential, expires - Duration::minutes(5))
        .await
        .unwrap();
    assert!(early.valid);

    let late = setup
        .credential_wallet
        .verify_at(&credential, expires + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(late.reason, Some(VerificationFailure::Expired));
    assert_eq!(
        setup.credential_wallet.state(&credential.id),
        Some(CredentialState::Expired)
    );

    // a request that is already past its expiration is refused
    let mut stale = kyc_request(&holder.did, CredentialStatusType::SparseMerkleTreeProof);
    stale.expiration = Some(Utc::now() - Duration::seconds(1));
    let result = setup.identity_wallet.issue_credential(&issuer.did, stale).await;
    assert!(matches!(result, Err(IdentityError::ExpiredCredentialRequest(_))));
}

#[tokio::test]
async fn test_tampered_subject_fails_verification() {
    let setup = Setup::new().unwrap();
    let issuer = setup
        .identity_wallet
        .create_identity(identity_options(None))
        .await
        .unwrap();
    let holder = setup
        .identity_wallet
        .create_identity(identity_options(None))
        .await
        .unwrap();

    let mut credential = setup
        .identity_wallet
        .issue_credential(
            &issuer.did,
            kyc_request(&holder.did, CredentialStatusType::SparseMerkleTreeProof),
        )
        .await
        .unwrap();
    credential
        .credential_subject
        .insert("birthday".into(), json!(20100101));

    let outcome = setup.credential_wallet.verify(&credential).await.unwrap();
    assert_eq!(outcome.reason, Some(VerificationFailure::InvalidProof));
}
