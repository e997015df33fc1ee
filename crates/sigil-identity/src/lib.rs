//! Sigil Identity: identities with their claims, revocation and roots trees,
//! credential issuance and state publishing.

pub mod error;
pub mod request;
pub mod wallet;

pub use error::IdentityError;
pub use request::{CreateIdentityOptions, CreatedIdentity, CredentialRequest};
pub use wallet::{
    check_schema_url, parse_http_url, IdentityWallet, AUTH_BJJ_CREDENTIAL_TYPE, AUTH_SCHEMA_URL,
};
