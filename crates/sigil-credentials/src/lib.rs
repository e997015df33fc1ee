//! Credential side of Sigil: holding, checking and validating credentials.

pub mod error;
pub mod schema;
pub mod wallet;

pub use error::CredentialError;
pub use schema::{validate_subject, HttpSchemaLoader, SchemaLoader, StaticSchemaLoader};
pub use wallet::{CredentialWallet, VerificationFailure, VerificationOutcome};
