//! Integration test: revocation through the issuer's own tree and through a
//! reverse hash service, including state publishing.

use sigil_core::{CredentialState, CredentialStatusType, W3CCredential};
use sigil_credentials::VerificationFailure;
use sigil_integration_tests::{identity_options, kyc_request, Setup};
use sigil_storage::StateStorage;

async fn issue(setup: &Setup, status_type: CredentialStatusType) -> (sigil_core::Did, W3CCredential) {
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
    let credential = setup
        .identity_wallet
        .issue_credential(&issuer.did, kyc_request(&holder.did, status_type))
        .await
        .unwrap();
    setup.credential_wallet.store(&credential).unwrap();
    (issuer.did, credential)
}

// ============================================================================
// Issuer-hosted status
// ============================================================================

#[tokio::test]
async fn test_issuer_tree_revocation() {
    let setup = Setup::new().unwrap();
    let (issuer, credential) = issue(&setup, CredentialStatusType::SparseMerkleTreeProof).await;

    let status = setup
        .credential_wallet
        .get_revocation_status(&credential)
        .await
        .unwrap();
    assert!(!status.is_revoked());

    assert!(setup
        .identity_wallet
        .revoke_credential(&issuer, &credential)
        .await
        .unwrap());
    // revoking twice is a no-op
    assert!(!setup
        .identity_wallet
        .revoke_credential(&issuer, &credential)
        .await
        .unwrap());

    let outcome = setup.credential_wallet.verify(&credential).await.unwrap();
    assert_eq!(outcome.reason, Some(VerificationFailure::Revoked));
    assert_eq!(
        setup.credential_wallet.state(&credential.id),
        Some(CredentialState::Revoked)
    );
}

// ============================================================================
// Reverse hash service
// ============================================================================

#[tokio::test]
async fn test_rhs_status_at_genesis() {
    let setup = Setup::new().unwrap();
    let (_, credential) =
        issue(&setup, CredentialStatusType::Iden3ReverseSparseMerkleTreeProof).await;

    // nothing published yet: the genesis state answers without the service
    let outcome = setup.credential_wallet.verify(&credential).await.unwrap();
    assert!(outcome.valid, "{:?}", outcome.detail);
    assert!(setup.rhs.is_empty());
}

#[tokio::test]
async fn test_rhs_revocation_round_trip() {
    let setup = Setup::new().unwrap();
    let (issuer, credential) =
        issue(&setup, CredentialStatusType::Iden3ReverseSparseMerkleTreeProof).await;

    let published = setup.identity_wallet.publish_state(&issuer).await.unwrap();
    let sent = setup
        .identity_wallet
        .publish_state_to_rhs(&issuer, setup.rhs.as_ref())
        .await
        .unwrap();
    assert!(sent >= 1);
    assert_eq!(
        setup.states.get_latest_state_by_id(&issuer).await.unwrap().state,
        published.value
    );

    let status = setup
        .credential_wallet
        .get_revocation_status(&credential)
        .await
        .unwrap();
    assert!(!status.is_revoked());
    assert_eq!(status.issuer, published);

    setup
        .identity_wallet
        .revoke_credential(&issuer, &credential)
        .await
        .unwrap();

    // revocation is invisible until the new state is published and pushed
    let stale = setup
        .credential_wallet
        .get_revocation_status(&credential)
        .await
        .unwrap();
    assert!(!stale.is_revoked());

    let revoked_state = setup.identity_wallet.publish_state(&issuer).await.unwrap();
    assert_ne!(revoked_state, published);
    setup
        .identity_wallet
        .publish_state_to_rhs(&issuer, setup.rhs.as_ref())
        .await
        .unwrap();

    let outcome = setup.credential_wallet.verify(&credential).await.unwrap();
    assert_eq!(outcome.reason, Some(VerificationFailure::Revoked));
}

#[tokio::test]
async fn test_republishing_unchanged_state_is_noop() {
    let setup = Setup::new().unwrap();
    let (issuer, _) = issue(&setup, CredentialStatusType::SparseMerkleTreeProof).await;

    let first = setup.identity_wallet.publish_state(&issuer).await.unwrap();
    let second = setup.identity_wallet.publish_state(&issuer).await.unwrap();
    assert_eq!(first, second);

    let identity = setup
        .storage
        .identity
        .get_identity(&issuer)
        .unwrap()
        .unwrap();
    assert!(identity.is_state_published);
    assert!(!identity.is_state_genesis);
}
